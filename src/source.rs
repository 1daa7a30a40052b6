//! Grounding document loading.
//!
//! Plain text and Markdown files are read as UTF-8; PDFs go through
//! `pdf-extract`. The document's `source_id` defaults to the file name.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::SourceConfig;
use crate::models::Document;

/// Load the grounding document named by `[source]` in the config.
pub fn load_configured(config: &SourceConfig) -> Result<Document> {
    let source_id = match &config.source_id {
        Some(id) => id.clone(),
        None => default_source_id(&config.path),
    };
    load_document(&config.path, &source_id)
}

/// Read `path` into a [`Document`] tagged with `source_id`.
pub fn load_document(path: &Path, source_id: &str) -> Result<Document> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    let text = if is_pdf {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read source document: {}", path.display()))?;
        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| anyhow::anyhow!("PDF extraction failed for {}: {}", path.display(), e))?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read source document: {}", path.display()))?
    };

    Ok(Document::new(source_id, text))
}

fn default_source_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
