use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use quire_core::store::{DocumentStore, SqliteStore};
use quire_core::{Document, DocumentId, IdentityConfig, UserProfile};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct DocumentListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub owner: String,
    pub updated_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
    pub tags: Vec<String>,
}

pub fn open_store(path: &Path) -> Result<SqliteStore, CliError> {
    Ok(SqliteStore::open(path)?)
}

pub async fn list_all_documents(store: &SqliteStore) -> Result<Vec<Document>, CliError> {
    const PAGE_SIZE: usize = 500;

    let mut documents = Vec::new();
    let mut offset = 0usize;

    loop {
        let batch = store.list(PAGE_SIZE, offset).await?;
        let count = batch.len();
        documents.extend(batch);

        if count < PAGE_SIZE {
            break;
        }
        offset += count;
    }

    Ok(documents)
}

/// Accepts a full id or a unique prefix of one
pub async fn resolve_document(query: &str, store: &SqliteStore) -> Result<Document, CliError> {
    let query = normalize_note_identifier(query)?;
    if let Ok(id) = query.parse::<DocumentId>() {
        if let Some(document) = store.select(id).await? {
            return Ok(document);
        }
    }

    let documents = list_all_documents(store).await?;
    let matching = documents
        .into_iter()
        .filter(|document| document.id.as_str().starts_with(&query))
        .take(3)
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::NoteNotFound(query)),
        1 => matching
            .into_iter()
            .next()
            .ok_or(CliError::NoteNotFound(query)),
        _ => {
            let options = matching
                .iter()
                .map(|document| short_id(document.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Identity from `--user`, falling back to the environment
pub fn resolve_identity(cli_user: Option<&str>) -> Result<UserProfile, CliError> {
    let lookup = |name: &str| match name {
        "QUIRE_USER_ID" => cli_user
            .map(str::to_string)
            .or_else(|| env::var(name).ok()),
        _ => env::var(name).ok(),
    };

    match IdentityConfig::from_lookup(lookup) {
        Ok(identity) => Ok(identity.profile()),
        Err(quire_core::Error::Config(message)) if message.contains("QUIRE_USER_ID") => {
            Err(CliError::MissingIdentity)
        }
        Err(error) => Err(error.into()),
    }
}

pub fn short_id(id: DocumentId) -> String {
    id.as_str().chars().take(13).collect()
}

pub fn format_document_lines(documents: &[Document]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    documents
        .iter()
        .map(|document| {
            let title = document.title_preview(30);
            let relative_time = format_relative_time(document.updated_at, now_ms);
            let tags = render_tags(document);

            if tags.is_empty() {
                format!("{:<13}  {title:<30}  {relative_time}", short_id(document.id))
            } else {
                format!(
                    "{:<13}  {title:<30}  {relative_time:<10}  {tags}",
                    short_id(document.id)
                )
            }
        })
        .collect()
}

pub fn document_to_list_item(document: &Document) -> DocumentListItem {
    let now_ms = Utc::now().timestamp_millis();

    DocumentListItem {
        id: document.id.to_string(),
        title: document.title.clone(),
        preview: content_preview(&document.content, 80),
        owner: document.owner.to_string(),
        updated_by: document.updated_by.as_ref().map(ToString::to_string),
        created_at: document.created_at,
        updated_at: document.updated_at,
        relative_time: format_relative_time(document.updated_at, now_ms),
        tags: document.tags.clone(),
    }
}

pub fn content_preview(content: &str, max_chars: usize) -> String {
    let first_line = content.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn render_tags(document: &Document) -> String {
    document
        .tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// "Saved 2m ago", or "Not saved yet" before the first write
pub fn format_saved_label(last_saved: Option<i64>, now_ms: i64) -> String {
    last_saved.map_or_else(
        || "Not saved yet".to_string(),
        |saved_at| format!("Saved {}", format_relative_time(saved_at, now_ms)),
    )
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_title(title: &str) -> Result<String, CliError> {
    normalize_content(title).ok_or(CliError::EmptyTitle)
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(CliError::EditorFailed("empty EDITOR command".into()));
    };

    let status = Command::new(program).args(parts).arg(file_path).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("quire-note-{}-{now}.md", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("QUIRE_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("quire")
        .join("quire.db")
}
