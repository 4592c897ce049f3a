//! Buffered multipart forms.

use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;
use lexi_core::extract_text_blocking;
use tracing::debug;

use crate::error::ServerError;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// A multipart form read into memory: at most one `file` part plus text
/// fields. Request size is capped by the router's body limit.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read multipart field: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            if name == "file" {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read file: {e}")))?;
                // A file input left empty in the browser still sends a part.
                if !filename.is_empty() {
                    debug!(filename = %filename, size = bytes.len(), "received upload");
                    form.file = Some(UploadedFile { filename, bytes });
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field '{name}': {e}")))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Extracted text of the uploaded file, if there is one.
    pub async fn file_text(&self) -> Result<Option<String>, ServerError> {
        match &self.file {
            Some(file) => Ok(Some(extract_text_blocking(file.bytes.clone(), file.filename.clone()).await?)),
            None => Ok(None),
        }
    }
}
