//! Document store seam used by the self-query retriever

mod memory;

pub use memory::{MemoryStore, MetadataFilter};

use crate::document::Document;
use crate::query_constructor::StructuredFilter;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to load documents: {0}")]
    LoadError(String),

    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// A searchable collection of documents with store-specific filters
///
/// `translate` turns the store-independent [`StructuredFilter`] into whatever
/// the backend understands; `search` runs a filtered similarity search.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend-specific filter representation
    type Filter: Send + Sync;

    /// Convert a parsed filter into this store's representation
    fn translate(&self, filter: &StructuredFilter) -> Result<Self::Filter, StoreError>;

    /// Return up to `limit` documents most similar to `query` that pass `filter`
    async fn search(
        &self,
        query: &str,
        filter: Option<Self::Filter>,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError>;
}
