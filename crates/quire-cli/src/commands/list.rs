use std::path::Path;

use crate::commands::common::{
    document_to_list_item, format_document_lines, open_store, DocumentListItem,
};
use crate::error::CliError;

pub async fn run_list(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let documents = store.list(limit, 0).await?;

    if as_json {
        let json_items = documents
            .iter()
            .map(document_to_list_item)
            .collect::<Vec<DocumentListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if documents.is_empty() {
        println!("No notes yet");
    } else {
        for line in format_document_lines(&documents) {
            println!("{line}");
        }
    }

    Ok(())
}
