use std::path::Path;

use chrono::Utc;
use quire_core::Document;

use crate::commands::common::{format_relative_time, open_store, render_tags, resolve_document};
use crate::error::CliError;

pub async fn run_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let document = resolve_document(id, &store).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        for line in format_document_detail(&document, Utc::now().timestamp_millis()) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn format_document_detail(document: &Document, now_ms: i64) -> Vec<String> {
    let editor = document.updated_by.as_ref().unwrap_or(&document.owner);
    let mut lines = vec![
        document.title.clone(),
        format!("id: {}", document.id),
        format!(
            "updated {} by {editor}",
            format_relative_time(document.updated_at, now_ms)
        ),
    ];

    let tags = render_tags(document);
    if !tags.is_empty() {
        lines.push(format!("tags: {tags}"));
    }
    if !document.content.is_empty() {
        lines.push(String::new());
        lines.extend(document.content.lines().map(str::to_string));
    }
    lines
}
