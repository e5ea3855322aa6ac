//! JSON-in-markdown output parsing

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputParseError {
    #[error("empty model output")]
    Empty,

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    // Lazy match so only the first fenced block is taken
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("fence regex is valid")
    })
}

/// Extracts and parses the JSON object a model wraps in a markdown code fence
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarkdownParser;

impl JsonMarkdownParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse model output; unfenced output is parsed as-is
    pub fn parse(&self, text: &str) -> Result<Value, OutputParseError> {
        let body = match fence_regex().captures(text).and_then(|c| c.get(1)) {
            Some(m) => m.as_str(),
            None => text,
        };

        let body = body.trim();
        if body.is_empty() {
            return Err(OutputParseError::Empty);
        }

        serde_json::from_str(body).map_err(|source| OutputParseError::InvalidJson { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_fence() {
        let text = "Here you go:\n```json\n{\"query\": \"love\", \"filter\": \"NO_FILTER\"}\n```\nDone.";
        let value = JsonMarkdownParser::new().parse(text).unwrap();
        assert_eq!(value, json!({"query": "love", "filter": "NO_FILTER"}));
    }

    #[test]
    fn test_parse_bare_fence() {
        let text = "```\n{\"limit\": 3}\n```";
        let value = JsonMarkdownParser::new().parse(text).unwrap();
        assert_eq!(value["limit"], 3);
    }

    #[test]
    fn test_parse_unfenced() {
        let value = JsonMarkdownParser::new()
            .parse("  {\"query\": \"x\"}  ")
            .unwrap();
        assert_eq!(value["query"], "x");
    }

    #[test]
    fn test_first_block_wins() {
        let text = "```json\n{\"a\": 1}\n```\n\n```json\n{\"a\": 2}\n```";
        let value = JsonMarkdownParser::new().parse(text).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_invalid_json() {
        let err = JsonMarkdownParser::new()
            .parse("```json\n{\"query\": \n```")
            .unwrap_err();
        assert!(matches!(err, OutputParseError::InvalidJson { .. }));
    }

    #[test]
    fn test_empty_output() {
        let err = JsonMarkdownParser::new().parse("```json\n```").unwrap_err();
        assert!(matches!(err, OutputParseError::Empty));
    }
}
