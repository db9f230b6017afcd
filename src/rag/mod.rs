//! Retrieval-augmented answering over saved tickets.

pub mod responder;

pub use responder::{Evidence, GroundedResponder};
