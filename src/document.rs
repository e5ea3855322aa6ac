//! Document value type returned by stores and retrievers

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A retrievable unit of text with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text that similarity search runs against
    pub page_content: String,

    /// Filterable attributes
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Relevance score assigned by the last search (0.0 to 1.0, higher is better)
    #[serde(default)]
    pub score: f32,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
            score: 0.0,
        }
    }

    /// Attach a metadata attribute
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_without_metadata() {
        let doc: Document = serde_json::from_str(r#"{"page_content": "hello"}"#).unwrap();
        assert_eq!(doc.page_content, "hello");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.score, 0.0);
    }

    #[test]
    fn test_builder() {
        let doc = Document::new("text")
            .with_metadata("year", 1999)
            .with_metadata("genre", "drama");
        assert_eq!(doc.metadata["year"], 1999);
        assert_eq!(doc.metadata["genre"], "drama");
    }
}
