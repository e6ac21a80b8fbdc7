use std::io::Write;
use std::path::Path;

use axum::extract::Multipart;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};
use triage_flow::Graph;

use crate::models::{DEFAULT_TOPIC, FileReport, PaperDocument};
use crate::workflow::run_document;

pub const UNSUPPORTED_FILE_TYPE: &str = "Unsupported file type";

/// An uploaded file with its original name.
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Parsed form fields from the multipart upload.
pub struct UploadForm {
    pub files: Vec<UploadedFile>,
    pub topic: String,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No files uploaded")]
    NoFiles,

    #[error("No files selected")]
    NothingSelected,

    #[error("Malformed upload: {0}")]
    Malformed(String),
}

/// Parse a multipart upload into the `pdfs` files and the topic.
pub async fn parse_multipart(mut multipart: Multipart) -> Result<UploadForm, UploadError> {
    let mut files = Vec::new();
    let mut saw_pdfs = false;
    let mut topic: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Malformed(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "pdfs" => {
                saw_pdfs = true;
                let filename = field.file_name().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| UploadError::Malformed(e.to_string()))?
                    .to_vec();

                // Browsers send an empty part when nothing was picked.
                if filename.is_empty() && data.is_empty() {
                    continue;
                }
                files.push(UploadedFile { filename, data });
            }
            "topic" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| UploadError::Malformed(e.to_string()))?;
                if !value.trim().is_empty() {
                    topic = Some(value.trim().to_string());
                }
            }
            _ => {
                field
                    .bytes()
                    .await
                    .map_err(|e| UploadError::Malformed(e.to_string()))?;
            }
        }
    }

    if !saw_pdfs {
        return Err(UploadError::NoFiles);
    }
    if files.is_empty() {
        return Err(UploadError::NothingSelected);
    }

    Ok(UploadForm {
        files,
        topic: topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
    })
}

pub fn is_pdf_filename(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Writes `data` to a scratch `.pdf` file, removed when the guard drops.
pub async fn write_scratch(data: Vec<u8>) -> anyhow::Result<NamedTempFile> {
    let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("triage-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(&data)?;
        file.flush()?;
        Ok(file)
    })
    .await??;
    Ok(file)
}

/// Runs one uploaded file through the workflow and reports on it.
pub async fn process_file(workflow: &Graph, topic: &str, file: UploadedFile) -> FileReport {
    if !is_pdf_filename(&file.filename) {
        warn!(filename = %file.filename, "Rejected non-PDF upload");
        return FileReport::failed(file.filename, topic, UNSUPPORTED_FILE_TYPE);
    }

    let scratch = match write_scratch(file.data).await {
        Ok(scratch) => scratch,
        Err(e) => {
            warn!(filename = %file.filename, error = %e, "Failed to write scratch file");
            return FileReport::failed(
                file.filename,
                topic,
                format!("Failed to store upload: {}", e),
            );
        }
    };

    let document = PaperDocument::new(
        file.filename,
        topic,
        scratch.path().to_string_lossy(),
    );
    info!(document_id = %document.id, filename = %document.filename, "Processing PDF");
    let document = run_document(workflow, document).await;

    // Keep the scratch file alive until the workflow is done with it.
    drop(scratch);
    FileReport::from(document)
}
