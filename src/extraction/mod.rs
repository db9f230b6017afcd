//! Turning support dialogs into candidate question/answer pairs.

pub mod engine;
pub mod fallback;
pub mod json;
pub mod prompts;
pub mod sanitize;
pub mod types;

pub use engine::{is_sentinel, ModelExtractor, QaExtractor};
pub use json::{extract_json_object, looks_like_json_fragment};
pub use sanitize::sanitize;
pub use types::{
    AnswerCandidate, Dialog, DialogTurn, ExtractionCandidate, Role, ValidatedQaPair,
};
