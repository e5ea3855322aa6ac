//! Self-querying retriever
//!
//! Asks a language model to split a natural-language query into a refined
//! search string and a metadata filter, then runs the filtered search against
//! a [`DocumentStore`].

use crate::config::RetrieverConfig;
use crate::document::Document;
use crate::error::{Result, SelfQueryError};
use crate::llm::{CallOptions, LanguageModel, LlmChain};
use crate::query_constructor::{
    self, get_query_constructor_prompt, AttributeInfo, QueryConstructorPromptArgs,
    StructuredFilter, NO_FILTER,
};
use crate::store::DocumentStore;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Decomposition of a user query as produced by the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredQuery {
    /// Text to compare against document contents
    pub query: String,

    /// Parsed filter, `None` when the model answered `NO_FILTER`
    pub filter: Option<StructuredFilter>,

    /// Positive limit requested by the model, if limits are enabled
    pub limit: Option<usize>,
}

pub struct SelfQueryRetriever<S: DocumentStore> {
    llm: Arc<dyn LanguageModel>,
    store: Arc<S>,
    document_contents: String,
    metadata_field_info: Vec<AttributeInfo>,
    enable_limit: bool,
    default_limit: usize,
    max_tokens: Option<u32>,
}

impl<S: DocumentStore> SelfQueryRetriever<S> {
    pub fn new(llm: Arc<dyn LanguageModel>, store: Arc<S>) -> Self {
        Self {
            llm,
            store,
            document_contents: String::new(),
            metadata_field_info: Vec::new(),
            enable_limit: false,
            default_limit: 4,
            max_tokens: None,
        }
    }

    /// Create a retriever from the `[retriever]` config section
    pub fn from_config(
        llm: Arc<dyn LanguageModel>,
        store: Arc<S>,
        config: &RetrieverConfig,
    ) -> Self {
        Self::new(llm, store)
            .with_document_contents(config.document_contents.clone())
            .with_metadata_field_info(config.attributes.clone())
            .with_enable_limit(config.enable_limit)
            .with_default_limit(config.default_limit)
    }

    pub fn with_document_contents(mut self, document_contents: impl Into<String>) -> Self {
        self.document_contents = document_contents.into();
        self
    }

    pub fn with_metadata_field_info(mut self, metadata_field_info: Vec<AttributeInfo>) -> Self {
        self.metadata_field_info = metadata_field_info;
        self
    }

    pub fn with_enable_limit(mut self, enable_limit: bool) -> Self {
        self.enable_limit = enable_limit;
        self
    }

    /// Limit used when the model gives none; values below 1 are raised to 1
    pub fn with_default_limit(mut self, default_limit: usize) -> Self {
        self.default_limit = default_limit.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Chain that turns a user query into the model's JSON answer
    pub fn query_constructor(&self) -> Result<LlmChain> {
        let prompt = get_query_constructor_prompt(QueryConstructorPromptArgs {
            document_contents: &self.document_contents,
            attribute_info: &self.metadata_field_info,
            enable_limit: self.enable_limit,
        })?;

        let mut options = CallOptions::default().with_temperature(0.0);
        if let Some(max_tokens) = self.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }

        Ok(LlmChain::new(self.llm.clone(), prompt).with_options(options))
    }

    /// Ask the model to decompose `query` without running a search
    pub async fn construct_query(&self, query: &str) -> Result<StructuredQuery> {
        let chain = self.query_constructor()?;

        let mut inputs = HashMap::new();
        inputs.insert("query".to_string(), query.to_string());
        let output = chain.call(&inputs).await?;

        let structured = self.interpret_output(output)?;

        tracing::debug!(
            "Constructed query {:?} with filter {} and limit {:?}",
            structured.query,
            structured
                .filter
                .as_ref()
                .map_or_else(|| NO_FILTER.to_string(), |f| f.to_string()),
            structured.limit
        );

        Ok(structured)
    }

    /// Retrieve documents relevant to a natural-language query
    pub async fn get_relevant_documents(&self, query: &str) -> Result<Vec<Document>> {
        let structured = self.construct_query(query).await?;

        let filter = match &structured.filter {
            Some(filter) => Some(self.store.translate(filter)?),
            None => None,
        };

        let limit = structured.limit.unwrap_or(self.default_limit);

        Ok(self.store.search(&structured.query, filter, limit).await?)
    }

    fn interpret_output(&self, output: Value) -> Result<StructuredQuery> {
        let Value::Object(mut fields) = output else {
            return Err(SelfQueryError::WrongOutputType {
                field: "output",
                expected: "a JSON object",
            });
        };

        let filter = match fields.remove("filter") {
            None | Some(Value::Null) => None,
            Some(Value::String(filter)) => Self::parse_filter(&filter)?,
            Some(_) => {
                return Err(SelfQueryError::WrongOutputType {
                    field: "filter",
                    expected: "a string",
                })
            }
        };

        let query = match fields.remove("query") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(query)) => query,
            Some(_) => {
                return Err(SelfQueryError::WrongOutputType {
                    field: "query",
                    expected: "a string",
                })
            }
        };

        let limit = if self.enable_limit {
            Self::parse_limit(fields.remove("limit"))?
        } else {
            None
        };

        Ok(StructuredQuery {
            query,
            filter,
            limit,
        })
    }

    fn parse_filter(filter: &str) -> Result<Option<StructuredFilter>> {
        let filter = filter.trim();
        if filter.is_empty() || filter == NO_FILTER {
            return Ok(None);
        }
        Ok(Some(query_constructor::parse(filter)?))
    }

    /// Zero, null, blank and absent all mean "use the default"
    fn parse_limit(limit: Option<Value>) -> Result<Option<usize>> {
        let wrong_type = || SelfQueryError::WrongOutputType {
            field: "limit",
            expected: "a non-negative integer",
        };

        match limit {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::Number(n)) => {
                let limit = match n.as_u64() {
                    Some(limit) => limit,
                    None => match n.as_f64() {
                        Some(f) if f >= 0.0 && f.fract() == 0.0 => f as u64,
                        _ => return Err(wrong_type()),
                    },
                };
                Ok(usize::try_from(limit).ok().filter(|&l| l > 0))
            }
            Some(_) => Err(wrong_type()),
        }
    }
}
