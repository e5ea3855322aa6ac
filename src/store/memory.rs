//! In-memory document store with keyword-overlap ranking

use super::{DocumentStore, StoreError};
use crate::document::Document;
use crate::query_constructor::parser::MAX_DEPTH;
use crate::query_constructor::{Comparator, FilterValue, Operator, StructuredFilter};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use tokio::sync::RwLock;

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\w+").expect("token regex is valid"))
}

fn tokenize(text: &str) -> HashSet<String> {
    token_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Compiled predicate over document metadata
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    Compare {
        comparator: Comparator,
        attribute: String,
        value: Value,
    },
    And(Vec<MetadataFilter>),
    Or(Vec<MetadataFilter>),
    Not(Box<MetadataFilter>),
}

impl MetadataFilter {
    /// Compile a structured filter, rejecting values a comparator cannot use
    pub fn compile(filter: &StructuredFilter) -> Result<Self, StoreError> {
        Self::compile_at(filter, 1)
    }

    fn compile_at(filter: &StructuredFilter, depth: usize) -> Result<Self, StoreError> {
        if depth > MAX_DEPTH {
            return Err(StoreError::UnsupportedFilter(format!(
                "filter nested deeper than {} levels",
                MAX_DEPTH
            )));
        }

        match filter {
            StructuredFilter::Comparison {
                comparator,
                attribute,
                value,
            } => {
                let shape_ok = match comparator {
                    Comparator::In | Comparator::Nin => matches!(value, FilterValue::List(_)),
                    Comparator::Like | Comparator::Contain => matches!(value, FilterValue::Str(_)),
                    _ => !matches!(value, FilterValue::List(_)),
                };
                if !shape_ok {
                    return Err(StoreError::UnsupportedFilter(format!(
                        "{} cannot compare '{}' against {}",
                        comparator.as_str(),
                        attribute,
                        value
                    )));
                }

                Ok(MetadataFilter::Compare {
                    comparator: *comparator,
                    attribute: attribute.clone(),
                    value: to_json(value)?,
                })
            }
            StructuredFilter::Operation {
                operator,
                arguments,
            } => {
                let compiled = arguments
                    .iter()
                    .map(|arg| Self::compile_at(arg, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;

                match operator {
                    Operator::And => Ok(MetadataFilter::And(compiled)),
                    Operator::Or => Ok(MetadataFilter::Or(compiled)),
                    Operator::Not => {
                        let mut compiled = compiled;
                        if compiled.len() != 1 {
                            return Err(StoreError::UnsupportedFilter(format!(
                                "not expects 1 argument, got {}",
                                compiled.len()
                            )));
                        }
                        Ok(MetadataFilter::Not(Box::new(compiled.remove(0))))
                    }
                }
            }
        }
    }

    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        match self {
            MetadataFilter::Compare {
                comparator,
                attribute,
                value,
            } => match metadata.get(attribute) {
                Some(actual) => compare(*comparator, actual, value),
                // Absent attributes only satisfy negative comparisons
                None => matches!(comparator, Comparator::Ne | Comparator::Nin),
            },
            MetadataFilter::And(filters) => filters.iter().all(|f| f.matches(metadata)),
            MetadataFilter::Or(filters) => filters.iter().any(|f| f.matches(metadata)),
            MetadataFilter::Not(filter) => !filter.matches(metadata),
        }
    }
}

fn to_json(value: &FilterValue) -> Result<Value, StoreError> {
    Ok(match value {
        FilterValue::Bool(b) => Value::Bool(*b),
        FilterValue::Int(i) => Value::Number((*i).into()),
        FilterValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| StoreError::UnsupportedFilter(format!("non-finite number {}", f)))?,
        FilterValue::Str(s) => Value::String(s.clone()),
        FilterValue::List(items) => {
            Value::Array(items.iter().map(to_json).collect::<Result<Vec<_>, _>>()?)
        }
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare(comparator: Comparator, actual: &Value, expected: &Value) -> bool {
    match comparator {
        Comparator::Eq => values_equal(actual, expected),
        Comparator::Ne => !values_equal(actual, expected),
        Comparator::Gt => order(actual, expected) == Some(Ordering::Greater),
        Comparator::Gte => matches!(
            order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Comparator::Lt => order(actual, expected) == Some(Ordering::Less),
        Comparator::Lte => matches!(
            order(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Comparator::Contain => match (actual, expected) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), _) => items.iter().any(|item| values_equal(item, expected)),
            _ => false,
        },
        Comparator::Like => match (actual, expected) {
            (Value::String(text), Value::String(pattern)) => like(text, pattern),
            _ => false,
        },
        Comparator::In => in_list(actual, expected),
        Comparator::Nin => !in_list(actual, expected),
    }
}

fn in_list(actual: &Value, list: &Value) -> bool {
    match list {
        Value::Array(items) => items.iter().any(|item| values_equal(actual, item)),
        _ => false,
    }
}

/// Case-insensitive match; `%` matches any run of characters, and a pattern
/// without `%` matches as a substring
fn like(text: &str, pattern: &str) -> bool {
    let text = text.to_lowercase();
    let pattern = pattern.to_lowercase();

    if !pattern.contains('%') {
        return text.contains(&pattern);
    }

    let segments: Vec<&str> = pattern.split('%').collect();
    let last = segments.len() - 1;
    let mut rest = text.as_str();

    for (i, &segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(segment) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == last {
            return rest.ends_with(segment);
        } else {
            match rest.find(segment) {
                Some(pos) => rest = &rest[pos + segment.len()..],
                None => return false,
            }
        }
    }

    true
}

/// Documents held in memory, searched by query-term overlap
///
/// Score is the fraction of distinct query terms found in the document; an
/// empty query scores every document 1.0 so filter-only queries still return
/// results.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<Vec<Document>>,
    min_score: f32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self {
            documents: RwLock::new(documents),
            min_score: 0.0,
        }
    }

    /// Load a JSON array of documents
    pub fn load_json(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::LoadError(format!("{}: {}", path.display(), e)))?;
        let documents: Vec<Document> = serde_json::from_str(&content)
            .map_err(|e| StoreError::LoadError(format!("{}: {}", path.display(), e)))?;

        tracing::info!("Loaded {} documents from {}", documents.len(), path.display());

        Ok(Self::from_documents(documents))
    }

    /// Drop results scoring below `min_score`
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub async fn add_documents(&self, documents: impl IntoIterator<Item = Document>) {
        self.documents.write().await.extend(documents);
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    type Filter = MetadataFilter;

    fn translate(&self, filter: &StructuredFilter) -> Result<MetadataFilter, StoreError> {
        MetadataFilter::compile(filter)
    }

    async fn search(
        &self,
        query: &str,
        filter: Option<MetadataFilter>,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        if limit == 0 {
            return Err(StoreError::InvalidQuery(
                "Limit must be greater than 0".to_string(),
            ));
        }

        let query_terms = tokenize(query);
        let documents = self.documents.read().await;

        let mut scored: Vec<(usize, f32)> = documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| filter.as_ref().map_or(true, |f| f.matches(&doc.metadata)))
            .map(|(idx, doc)| {
                let score = if query_terms.is_empty() {
                    1.0
                } else {
                    let doc_terms = tokenize(&doc.page_content);
                    let hits = query_terms.iter().filter(|t| doc_terms.contains(*t)).count();
                    hits as f32 / query_terms.len() as f32
                };
                (idx, score)
            })
            .filter(|(_, score)| *score >= self.min_score)
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(limit);

        tracing::debug!(
            "Memory search '{}' matched {} of {} documents",
            query,
            scored.len(),
            documents.len()
        );

        Ok(scored
            .into_iter()
            .map(|(idx, score)| documents[idx].clone().with_score(score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_constructor::parse;
    use serde_json::json;

    fn movies() -> Vec<Document> {
        vec![
            Document::new("A bunch of scientists bring back dinosaurs and mayhem breaks loose")
                .with_metadata("year", 1993)
                .with_metadata("rating", 7.7)
                .with_metadata("genre", "science fiction"),
            Document::new("Leo DiCaprio gets lost in a dream within a dream within a dream")
                .with_metadata("year", 2010)
                .with_metadata("director", "Christopher Nolan")
                .with_metadata("rating", 8.2),
            Document::new("A psychologist gets lost in a series of dreams within dreams")
                .with_metadata("year", 2006)
                .with_metadata("director", "Satoshi Kon")
                .with_metadata("rating", 8.6),
            Document::new("Toys come alive and have a blast doing so")
                .with_metadata("year", 1995)
                .with_metadata("genre", "animated")
                .with_metadata("tags", json!(["pixar", "family"])),
        ]
    }

    fn compiled(expr: &str) -> MetadataFilter {
        MetadataFilter::compile(&parse(expr).unwrap()).unwrap()
    }

    fn meta(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_numeric_comparisons() {
        let m = meta(json!({"year": 1993, "rating": 7.7}));
        assert!(compiled(r#"gt("rating", 7)"#).matches(&m));
        assert!(compiled(r#"eq("year", 1993.0)"#).matches(&m));
        assert!(compiled(r#"lte("year", 1993)"#).matches(&m));
        assert!(!compiled(r#"lt("year", 1993)"#).matches(&m));
    }

    #[test]
    fn test_string_ordering_handles_iso_dates() {
        let m = meta(json!({"released": "2021-06-01"}));
        assert!(compiled(r#"gte("released", "2021-01-01")"#).matches(&m));
        assert!(!compiled(r#"gt("released", "2022-01-01")"#).matches(&m));
    }

    #[test]
    fn test_missing_attribute() {
        let m = meta(json!({"year": 1993}));
        assert!(!compiled(r#"eq("genre", "drama")"#).matches(&m));
        assert!(compiled(r#"ne("genre", "drama")"#).matches(&m));
        assert!(compiled(r#"nin("genre", ["drama"])"#).matches(&m));
    }

    #[test]
    fn test_contain_like_and_in() {
        let m = meta(json!({"genre": "Science Fiction", "tags": ["pixar", "family"]}));
        assert!(compiled(r#"contain("tags", "pixar")"#).matches(&m));
        assert!(compiled(r#"contain("genre", "Fiction")"#).matches(&m));
        assert!(compiled(r#"like("genre", "science%")"#).matches(&m));
        assert!(compiled(r#"like("genre", "%fic%")"#).matches(&m));
        assert!(!compiled(r#"like("genre", "fiction%")"#).matches(&m));
        assert!(compiled(r#"in("genre", ["Drama", "Science Fiction"])"#).matches(&m));
    }

    #[test]
    fn test_logical_operations() {
        let m = meta(json!({"year": 2010, "director": "Christopher Nolan"}));
        assert!(
            compiled(r#"and(gt("year", 2000), eq("director", "Christopher Nolan"))"#).matches(&m)
        );
        assert!(
            compiled(r#"or(lt("year", 2000), eq("director", "Christopher Nolan"))"#).matches(&m)
        );
        assert!(!compiled(r#"not(eq("director", "Christopher Nolan"))"#).matches(&m));
    }

    #[test]
    fn test_translate_rejects_bad_shapes() {
        let store = MemoryStore::new();
        assert!(store.translate(&parse(r#"in("year", 1993)"#).unwrap()).is_err());
        assert!(store.translate(&parse(r#"like("year", 19)"#).unwrap()).is_err());
        assert!(store.translate(&parse(r#"eq("year", [1, 2])"#).unwrap()).is_err());
    }

    #[test]
    fn test_compile_rejects_deep_nesting() {
        let mut filter = parse(r#"eq("year", 1993)"#).unwrap();
        for _ in 0..200 {
            filter = StructuredFilter::Operation {
                operator: Operator::Not,
                arguments: vec![filter],
            };
        }

        let err = MetadataFilter::compile(&filter).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedFilter(msg) if msg.contains("nested")));
    }

    #[tokio::test]
    async fn test_search_ranks_by_overlap() {
        let store = MemoryStore::from_documents(movies());
        let results = store.search("lost psychologist", None, 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].page_content.contains("psychologist"));
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].score, 0.5);
    }

    #[tokio::test]
    async fn test_search_with_filter_and_empty_query() {
        let store = MemoryStore::from_documents(movies());
        let filter = store
            .translate(&parse(r#"gt("rating", 8.5)"#).unwrap())
            .unwrap();
        let results = store.search("", Some(filter), 10).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata["director"], "Satoshi Kon");
        assert_eq!(results[0].score, 1.0);
    }

    #[tokio::test]
    async fn test_min_score() {
        let store = MemoryStore::from_documents(movies()).with_min_score(0.5);
        let results = store.search("toys dinosaurs", None, 10).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_limit_is_rejected() {
        let store = MemoryStore::from_documents(movies());
        assert!(store.search("dream", None, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_load_json() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            temp.path(),
            r#"[{"page_content": "one", "metadata": {"n": 1}}, {"page_content": "two"}]"#,
        )
        .unwrap();

        let store = MemoryStore::load_json(temp.path()).unwrap();
        assert_eq!(store.len().await, 2);

        store.add_documents(vec![Document::new("three")]).await;
        assert_eq!(store.len().await, 3);
    }
}
