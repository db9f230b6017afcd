use serde::{Deserialize, Serialize};

use crate::extraction::{Dialog, ValidatedQaPair};
use crate::persistence::QaRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub ticket_id: u64,
    /// Client-side summary of the ticket; stored with the source, never
    /// used in place of extraction.
    #[serde(default)]
    pub question: Option<String>,
    pub dialog: Dialog,
}

#[derive(Debug, Clone)]
pub enum SaveOutcome {
    Saved(ValidatedQaPair),
    /// The ticket was saved earlier; the stored pair is returned unchanged.
    AlreadySaved(QaRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredQa {
    pub ticket_id: u64,
    pub question: String,
    pub answer: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroundedAnswer {
    pub query: String,
    pub answer: String,
    pub sources: Vec<ScoredQa>,
}
