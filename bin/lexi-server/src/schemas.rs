//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TranslateRequest {
    /// Text to translate.
    #[serde(default)]
    pub text: Option<String>,
    /// Target language codes, e.g. `["fr", "hi"]`.
    #[serde(default)]
    pub languages: Vec<String>,
}

/// Multipart form accepted by `POST /api/translate`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct TranslateUpload {
    /// `.txt` or `.pdf` document.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// JSON array of language codes, e.g. `["es","de"]`.
    pub languages: String,
}

/// Multipart form with a single document (`file`) and, where accepted, a
/// `text` alternative.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct DocumentUpload {
    #[schema(value_type = Option<String>, format = Binary)]
    pub file: Option<Vec<u8>>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskAccepted {
    pub task_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TextRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DraftClauseRequest {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DraftClauseResponse {
    pub clause: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Form fields of `POST /draft_pdf`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct AgreementForm {
    pub agreement_date: Option<String>,
    pub landlord_name: Option<String>,
    pub tenant_name: Option<String>,
    pub property_address: Option<String>,
    pub term_months: Option<String>,
    pub rent_amount: Option<String>,
    pub deposit_amount: Option<String>,
    pub additional_clauses: Option<String>,
}

/// Treats blank strings as missing; non-blank values pass through untouched.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
