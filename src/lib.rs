//! selfquery - Self-Querying Document Retriever
//!
//! Turns a natural-language question into a refined search string plus a
//! structured metadata filter using a language model, then runs the filtered
//! similarity search against a document store.

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod llm;
pub mod query_constructor;
pub mod retriever;
pub mod store;

pub use document::Document;
pub use error::{Result, SelfQueryError};
pub use retriever::{SelfQueryRetriever, StructuredQuery};
