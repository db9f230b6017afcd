//! Rule-based dialog scan used when the model yields nothing.

use super::types::{AnswerCandidate, Dialog, ExtractionCandidate, Role};

/// First user turn containing a question mark.
pub fn scan_question(dialog: &Dialog, confidence: f64) -> Option<ExtractionCandidate> {
    dialog
        .turns()
        .iter()
        .enumerate()
        .find(|(_, turn)| turn.role == Role::User && turn.content.contains('?'))
        .map(|(position, turn)| ExtractionCandidate {
            question: Some(turn.content.trim().to_string()),
            confidence,
            source_text: Some(turn.content.clone()),
            position: Some(position),
        })
}

/// First non-empty support turn after `after` (or anywhere when unknown).
pub fn scan_answer(dialog: &Dialog, after: Option<usize>, relevance: f64) -> Option<AnswerCandidate> {
    let start = after.map(|p| p + 1).unwrap_or(0);
    dialog
        .turns()
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, turn)| turn.role == Role::Support && !turn.content.trim().is_empty())
        .map(|(index, turn)| AnswerCandidate {
            answer: Some(turn.content.trim().to_string()),
            relevance,
            source_text: Some(turn.content.clone()),
            support_index: Some(index),
        })
}
