pub mod core;
pub mod embedding;
pub mod extraction;
pub mod index;
pub mod llm;
pub mod persistence;
pub mod pipeline;
pub mod quality;
pub mod rag;
pub mod server;
pub mod state;

#[cfg(test)]
mod testing;
