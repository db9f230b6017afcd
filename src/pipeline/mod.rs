//! Save, search and answer flows wired from the extraction, index,
//! persistence and responder components.

mod service;
mod types;


pub use service::QaService;
pub use types::{GroundedAnswer, SaveOutcome, SaveRequest, ScoredQa};
