//! These models represent the values passed between pipeline stages
//!
//! Messages are exchanged with the LLM provider, documents are produced by fetching and
//! converting remote pages, chunks are the fragments stored in the vector store, and file
//! entries pair local file contents with their names.
pub mod chunk;
pub mod document;
pub mod file;
pub mod message;
pub mod role;
