use std::path::Path;

use quire_core::store::DocumentStore;
use quire_core::Document;

use crate::commands::common::{
    normalize_content, normalize_title, open_store, read_piped_stdin, resolve_identity,
};
use crate::error::CliError;

pub async fn run_create(
    title: &str,
    content_parts: &[String],
    tags: &[String],
    user: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let title = normalize_title(title)?;
    let identity = resolve_identity(user)?;
    let content = match normalize_content(&content_parts.join(" ")) {
        Some(content) => content,
        None => read_piped_stdin()?.unwrap_or_default(),
    };

    let store = open_store(db_path)?;
    let document = Document::new(identity.id, title, content).with_tags(tags);
    store.insert(&document).await?;

    println!("{}", document.id);
    Ok(())
}
