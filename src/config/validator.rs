use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{Result, SelfQueryError, ValidationError};
use std::collections::HashSet;

const VALID_PROVIDERS: [&str; 4] = ["openai", "groq", "ollama", "custom"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem before failing
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_retriever(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_store(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SelfQueryError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_retriever(config: &Config, errors: &mut Vec<ValidationError>) {
        let retriever = &config.retriever;

        if retriever.document_contents.trim().is_empty() {
            errors.push(ValidationError::new(
                "retriever.document_contents",
                "Document contents description cannot be empty",
            ));
        }

        if retriever.default_limit == 0 {
            errors.push(ValidationError::new(
                "retriever.default_limit",
                "Default limit must be greater than 0",
            ));
        }

        let mut seen = HashSet::new();
        for (i, attr) in retriever.attributes.iter().enumerate() {
            let path = format!("retriever.attributes[{}]", i);

            if attr.name.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("{}.name", path),
                    "Attribute name cannot be empty",
                ));
            } else if !seen.insert(attr.name.as_str()) {
                errors.push(ValidationError::new(
                    format!("{}.name", path),
                    format!("Duplicate attribute name: {}", attr.name),
                ));
            }

            if attr.attr_type.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("{}.type", path),
                    "Attribute type cannot be empty",
                ));
            }
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        let llm = &config.llm;

        if !VALID_PROVIDERS.contains(&llm.provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    VALID_PROVIDERS, llm.provider
                ),
            ));
        }

        match &llm.base_url {
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                errors.push(ValidationError::new(
                    "llm.base_url",
                    format!("Base URL must start with http:// or https://, got '{}'", url),
                ));
            }
            None if llm.provider == "custom" => {
                errors.push(ValidationError::new(
                    "llm.base_url",
                    "Custom provider requires a base URL",
                ));
            }
            _ => {}
        }

        if llm.model.is_empty() {
            errors.push(ValidationError::new("llm.model", "Model name cannot be empty"));
        }

        if llm.api_key_env.is_empty() {
            errors.push(ValidationError::new(
                "llm.api_key_env",
                "API key environment variable name cannot be empty",
            ));
        }

        if llm.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "llm.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_store(config: &Config, errors: &mut Vec<ValidationError>) {
        let min_score = config.store.min_score;
        if !(0.0..=1.0).contains(&min_score) {
            errors.push(ValidationError::new(
                "store.min_score",
                format!("Minimum score must be between 0.0 and 1.0, got {}", min_score),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_constructor::AttributeInfo;

    fn errors_of(config: &Config) -> Vec<ValidationError> {
        match ConfigValidator::validate(config) {
            Err(SelfQueryError::ConfigValidation { errors }) => errors,
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_zero_default_limit() {
        let mut config = Config::default();
        config.retriever.default_limit = 0;
        let errors = errors_of(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "retriever.default_limit");
    }

    #[test]
    fn test_duplicate_attribute() {
        let mut config = Config::default();
        config
            .retriever
            .attributes
            .push(AttributeInfo::new("year", "again", "integer"));
        let errors = errors_of(&config);
        assert_eq!(errors[0].path, "retriever.attributes[4].name");
    }

    #[test]
    fn test_invalid_provider() {
        let mut config = Config::default();
        config.llm.provider = "invalid".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_custom_provider_needs_base_url() {
        let mut config = Config::default();
        config.llm.provider = "custom".to_string();
        assert!(ConfigValidator::validate(&config).is_err());

        config.llm.base_url = Some("http://localhost:8080/v1".to_string());
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.meta.schema_version = "0.1.0".to_string();
        config.retriever.document_contents = String::new();
        config.llm.base_url = Some("localhost".to_string());
        config.store.min_score = 2.0;

        let errors = errors_of(&config);
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "_meta.schema_version",
                "retriever.document_contents",
                "llm.base_url",
                "store.min_score",
            ]
        );
    }
}
