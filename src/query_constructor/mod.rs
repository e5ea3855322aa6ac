//! Query constructor: the few-shot prompt that teaches a model to split a
//! user query into a search string and a metadata filter, plus the parser for
//! the filter language it produces.

pub mod parser;
mod prompt;

pub use parser::{parse, Comparator, FilterValue, Operator, ParseError, StructuredFilter};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Filter value the model returns when the query carries no conditions
pub const NO_FILTER: &str = "NO_FILTER";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PromptError {
    #[error("document contents description cannot be empty")]
    EmptyDocumentContents,

    #[error("attribute at index {index} has an empty name")]
    EmptyAttributeName { index: usize },

    #[error("attribute '{name}' is declared more than once")]
    DuplicateAttribute { name: String },

    #[error("missing prompt variable: {name}")]
    MissingVariable { name: String },
}

/// Description of one filterable metadata field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub attr_type: String,
}

impl AttributeInfo {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        attr_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            attr_type: attr_type.into(),
        }
    }
}

/// Inputs for [`get_query_constructor_prompt`]
#[derive(Debug, Clone, Copy)]
pub struct QueryConstructorPromptArgs<'a> {
    /// What the documents' page content is, e.g. "Brief summary of a movie"
    pub document_contents: &'a str,
    pub attribute_info: &'a [AttributeInfo],
    /// Let the model pick how many documents to return
    pub enable_limit: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Variable(String),
}

/// Template with `{{name}}` placeholders
///
/// Placeholders are located once, when the template is built, so text
/// substituted by [`PromptTemplate::format`] is never scanned for further
/// placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
    segments: Vec<Segment>,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>, input_variables: Vec<String>) -> Self {
        let template = template.into();
        let segments = split_placeholders(&template, &input_variables);
        Self {
            template,
            segments,
            input_variables,
        }
    }

    /// Template whose only placeholder is `variable`, between `head` and `tail`
    fn with_slot(head: String, variable: &str, tail: &str) -> Self {
        Self {
            template: format!("{}{{{{{}}}}}{}", head, variable, tail),
            segments: vec![
                Segment::Text(head),
                Segment::Variable(variable.to_string()),
                Segment::Text(tail.to_string()),
            ],
            input_variables: vec![variable.to_string()],
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Substitute every input variable; all of them must be supplied
    pub fn format(&self, inputs: &HashMap<String, String>) -> Result<String, PromptError> {
        if let Some(name) = self.input_variables.iter().find(|n| !inputs.contains_key(*n)) {
            return Err(PromptError::MissingVariable { name: name.clone() });
        }

        let mut rendered = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => rendered.push_str(text),
                Segment::Variable(name) => {
                    let value = inputs
                        .get(name)
                        .ok_or_else(|| PromptError::MissingVariable { name: name.clone() })?;
                    rendered.push_str(value);
                }
            }
        }
        Ok(rendered)
    }
}

fn split_placeholders(template: &str, variables: &[String]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) if variables.iter().any(|v| v == &after[..close]) => {
                text.push_str(&rest[..open]);
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Variable(after[..close].to_string()));
                rest = &after[close + 2..];
            }
            _ => {
                text.push_str(&rest[..open + 2]);
                rest = after;
            }
        }
    }

    text.push_str(rest);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

/// Replace `{key}` markers in one pass; inserted values are not rescanned
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (close, *value))
        });
        match hit {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Build the query-constructor prompt for a data source
///
/// The returned template takes a single `query` input variable.
pub fn get_query_constructor_prompt(
    args: QueryConstructorPromptArgs<'_>,
) -> Result<PromptTemplate, PromptError> {
    if args.document_contents.trim().is_empty() {
        return Err(PromptError::EmptyDocumentContents);
    }

    let mut seen = HashSet::new();
    for (index, attr) in args.attribute_info.iter().enumerate() {
        if attr.name.trim().is_empty() {
            return Err(PromptError::EmptyAttributeName { index });
        }
        if !seen.insert(attr.name.as_str()) {
            return Err(PromptError::DuplicateAttribute {
                name: attr.name.clone(),
            });
        }
    }

    let (limit_field, limit_rule) = if args.enable_limit {
        (prompt::LIMIT_FIELD, prompt::LIMIT_RULE)
    } else {
        ("", "")
    };

    let comparators = join_names(Comparator::ALL.map(|c| c.as_str()));
    let operators = join_names(Operator::ALL.map(|o| o.as_str()));
    let schema = render(
        prompt::SCHEMA,
        &[
            ("limit_field", limit_field),
            ("allowed_comparators", comparators.as_str()),
            ("allowed_operators", operators.as_str()),
            ("limit_rule", limit_rule),
        ],
    );

    let mut examples = vec![&prompt::FULL_ANSWER, &prompt::NO_FILTER_ANSWER];
    if args.enable_limit {
        examples.push(&prompt::WITH_LIMIT_ANSWER);
    }

    let mut template = String::from(prompt::PREFIX);
    template.push_str(&schema);
    template.push_str("\n\n");

    for (i, example) in examples.iter().enumerate() {
        let index = (i + 1).to_string();
        template.push_str(&render(
            prompt::EXAMPLE,
            &[
                ("index", index.as_str()),
                ("data_source", prompt::SONG_DATA_SOURCE),
                ("user_query", example.user_query),
                ("structured_request", example.structured_request),
            ],
        ));
        template.push('\n');
    }

    let index = (examples.len() + 1).to_string();
    let content = escape_json(args.document_contents);
    let attributes = render_attributes(args.attribute_info);
    template.push_str(&render(
        prompt::SUFFIX_HEAD,
        &[
            ("index", index.as_str()),
            ("content", content.as_str()),
            ("attributes", attributes.as_str()),
        ],
    ));

    Ok(PromptTemplate::with_slot(template, "query", prompt::SUFFIX_TAIL))
}

fn join_names<const N: usize>(names: [&str; N]) -> String {
    names.join(" | ")
}

/// JSON string body without the surrounding quotes
fn escape_json(s: &str) -> String {
    let quoted = serde_json::Value::String(s.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

fn render_attributes(attributes: &[AttributeInfo]) -> String {
    if attributes.is_empty() {
        return "{}".to_string();
    }

    let entries: Vec<String> = attributes
        .iter()
        .map(|attr| {
            format!(
                "        \"{}\": {{\n            \"type\": \"{}\",\n            \"description\": \"{}\"\n        }}",
                escape_json(&attr.name),
                escape_json(&attr.attr_type),
                escape_json(&attr.description)
            )
        })
        .collect();

    format!("{{\n{}\n    }}", entries.join(",\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie_attributes() -> Vec<AttributeInfo> {
        vec![
            AttributeInfo::new("genre", "The genre of the movie", "string"),
            AttributeInfo::new("year", "The year the movie was released", "integer"),
            AttributeInfo::new("rating", "A 1-10 rating for the movie", "float"),
        ]
    }

    #[test]
    fn test_prompt_contains_data_source() {
        let attributes = movie_attributes();
        let prompt = get_query_constructor_prompt(QueryConstructorPromptArgs {
            document_contents: "Brief summary of a movie",
            attribute_info: &attributes,
            enable_limit: false,
        })
        .unwrap();

        let text = prompt.template();
        assert!(text.contains("\"content\": \"Brief summary of a movie\""));
        assert!(text.contains("\"year\": {"));
        assert!(text.contains("The year the movie was released"));
        assert!(text.contains("eq | ne | gt | gte | lt | lte | contain | like | in | nin"));
        assert!(text.contains("and | or | not"));
        assert!(text.contains("<< Example 3. >>"));
        assert!(!text.contains("\"limit\": int"));
        assert_eq!(prompt.input_variables(), &["query".to_string()]);
    }

    #[test]
    fn test_prompt_with_limit() {
        let attributes = movie_attributes();
        let prompt = get_query_constructor_prompt(QueryConstructorPromptArgs {
            document_contents: "Brief summary of a movie",
            attribute_info: &attributes,
            enable_limit: true,
        })
        .unwrap();

        let text = prompt.template();
        assert!(text.contains("\"limit\": int"));
        assert!(text.contains("What are three songs about love"));
        assert!(text.contains("<< Example 4. >>"));
    }

    #[test]
    fn test_format_substitutes_query() {
        let prompt = get_query_constructor_prompt(QueryConstructorPromptArgs {
            document_contents: "Notes",
            attribute_info: &[],
            enable_limit: false,
        })
        .unwrap();

        let mut inputs = HashMap::new();
        inputs.insert("query".to_string(), "dinosaur movies".to_string());
        let rendered = prompt.format(&inputs).unwrap();

        assert!(rendered.contains("User Query:\ndinosaur movies\n\nStructured Request:\n"));
        assert!(!rendered.contains("{{query}}"));
        assert!(rendered.contains("\"attributes\": {}"));
    }

    #[test]
    fn test_caller_text_is_not_template_syntax() {
        let attributes = vec![AttributeInfo::new("genre", "Use {{query}} carefully", "string")];
        let prompt = get_query_constructor_prompt(QueryConstructorPromptArgs {
            document_contents: "Docs {attributes} about {{query}}",
            attribute_info: &attributes,
            enable_limit: false,
        })
        .unwrap();

        let mut inputs = HashMap::new();
        inputs.insert("query".to_string(), "USERQ".to_string());
        let rendered = prompt.format(&inputs).unwrap();

        assert_eq!(rendered.matches("USERQ").count(), 1);
        assert!(rendered.contains("\"content\": \"Docs {attributes} about {{query}}\","));
        assert!(rendered.contains("\"description\": \"Use {{query}} carefully\""));
        assert!(rendered.ends_with("User Query:\nUSERQ\n\nStructured Request:\n"));
    }

    #[test]
    fn test_format_does_not_rescan_values() {
        let template = PromptTemplate::new(
            "{{a}} and {{b}}",
            vec!["a".to_string(), "b".to_string()],
        );
        let mut inputs = HashMap::new();
        inputs.insert("a".to_string(), "{{b}}".to_string());
        inputs.insert("b".to_string(), "two".to_string());

        assert_eq!(template.format(&inputs).unwrap(), "{{b}} and two");
    }

    #[test]
    fn test_format_missing_variable() {
        let template = PromptTemplate::new("Hello {{name}}", vec!["name".to_string()]);
        let err = template.format(&HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            PromptError::MissingVariable {
                name: "name".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_invalid_args() {
        let empty = get_query_constructor_prompt(QueryConstructorPromptArgs {
            document_contents: "  ",
            attribute_info: &[],
            enable_limit: false,
        });
        assert_eq!(empty.unwrap_err(), PromptError::EmptyDocumentContents);

        let dup = vec![
            AttributeInfo::new("year", "a", "integer"),
            AttributeInfo::new("year", "b", "integer"),
        ];
        let err = get_query_constructor_prompt(QueryConstructorPromptArgs {
            document_contents: "Movies",
            attribute_info: &dup,
            enable_limit: false,
        })
        .unwrap_err();
        assert!(matches!(err, PromptError::DuplicateAttribute { name } if name == "year"));
    }

    #[test]
    fn test_escapes_quotes_in_descriptions() {
        let attributes = vec![AttributeInfo::new(
            "genre",
            "One of \"drama\" or \"comedy\"",
            "string",
        )];
        let prompt = get_query_constructor_prompt(QueryConstructorPromptArgs {
            document_contents: "Movies",
            attribute_info: &attributes,
            enable_limit: false,
        })
        .unwrap();
        assert!(prompt
            .template()
            .contains(r#""description": "One of \"drama\" or \"comedy\"""#));
    }
}
