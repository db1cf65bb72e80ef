use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use quire_core::channel::InMemoryHub;
use quire_core::{AppContext, CollabConfig, CollabSession, Document, SaveStatus};

use crate::commands::common::{
    capture_editor_input_with_initial, format_saved_label, normalize_content, normalize_title,
    open_store, read_piped_stdin, resolve_document, resolve_identity,
};
use crate::error::CliError;

/// Fields to write, `None` when unchanged
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EditPlan {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl EditPlan {
    pub fn new(document: &Document, title: Option<String>, content: Option<String>) -> Self {
        Self {
            title: title.filter(|title| *title != document.title),
            content: content.filter(|content| *content != document.content),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

pub async fn run_edit(
    id: &str,
    title: Option<&str>,
    content_parts: &[String],
    user: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let identity = resolve_identity(user)?;
    let config = CollabConfig::from_env()?;
    let store = Arc::new(open_store(db_path)?);
    let document = resolve_document(id, &store).await?;

    let title = title.map(normalize_title).transpose()?;
    let mut content = normalize_content(&content_parts.join(" "));
    if title.is_none() && content.is_none() {
        content = match read_piped_stdin()? {
            Some(piped) => Some(piped),
            None => capture_editor_input_with_initial(&document.content)?,
        };
    }

    let plan = EditPlan::new(&document, title, content);
    if plan.is_empty() {
        println!("{}", document.id);
        return Ok(());
    }

    // No peers outside this process, so signals go to a local hub.
    let context = AppContext::new(identity, store, Arc::new(InMemoryHub::new()), config)?;
    let session = CollabSession::open(&context, document.id).await?;
    if let Some(title) = plan.title {
        session.save_note_title(title)?;
    }
    if let Some(content) = plan.content {
        session.save_note_content(content)?;
    }
    session.close().await?;

    if session.save_status() == SaveStatus::Failed {
        return Err(CliError::SaveFailed(session.document_id().to_string()));
    }

    println!("{}", session.document_id());
    tracing::info!(
        "{} as {}",
        format_saved_label(session.last_saved(), Utc::now().timestamp_millis()),
        session.identity().display_name()
    );
    Ok(())
}
