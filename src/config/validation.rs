//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every endpoint compiles: tokens, pattern, constraints,
//!   methods, hosts and media types
//! - Validate addresses and detect duplicate endpoint names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RouterConfig;
use crate::routing::constraints::{ConstraintError, ConstraintRegistry};
use crate::routing::pattern::tokens::TokenError;
use crate::routing::pattern::{ExplicitValueError, PatternError};
use crate::routing::policy::{HostPatternError, MediaTypeError};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("admin.api_key must not be empty when the admin API is enabled")]
    EmptyApiKey,

    #[error("endpoint #{0} has an empty name")]
    EmptyName(usize),

    #[error("endpoint name '{0}' is used more than once")]
    DuplicateName(String),

    #[error("endpoint '{endpoint}': {source}")]
    Token {
        endpoint: String,
        #[source]
        source: TokenError,
    },

    #[error("endpoint '{endpoint}': {source}")]
    Pattern {
        endpoint: String,
        #[source]
        source: PatternError,
    },

    #[error("endpoint '{endpoint}': {source}")]
    ExplicitValue {
        endpoint: String,
        #[source]
        source: ExplicitValueError,
    },

    #[error("endpoint '{endpoint}': parameter '{parameter}': {source}")]
    Constraint {
        endpoint: String,
        parameter: String,
        #[source]
        source: ConstraintError,
    },

    #[error("endpoint '{endpoint}': invalid HTTP method '{method}'")]
    InvalidMethod { endpoint: String, method: String },

    #[error("endpoint '{endpoint}': {source}")]
    Host {
        endpoint: String,
        #[source]
        source: HostPatternError,
    },

    #[error("endpoint '{endpoint}': {source}")]
    MediaType {
        endpoint: String,
        #[source]
        source: MediaTypeError,
    },
}

/// Validates with the built-in constraints.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    validate_with(config, &ConstraintRegistry::default())
}

/// Validates against a custom constraint registry.
pub fn validate_with(config: &RouterConfig, registry: &ConstraintRegistry) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::EmptyApiKey);
        }
    }

    let mut seen = HashSet::new();
    for (index, endpoint) in config.endpoints.iter().enumerate() {
        if endpoint.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName(index));
        } else if !seen.insert(endpoint.name.as_str()) {
            errors.push(ValidationError::DuplicateName(endpoint.name.clone()));
        }

        let built = match endpoint.to_endpoint(&config.tokens) {
            Ok(built) => built,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        let pattern = built.pattern();
        let references = pattern
            .parameters()
            .flat_map(|p| p.constraints.iter().map(move |reference| (p.name.as_str(), reference)))
            .chain(pattern.extra_constraints());
        for (parameter, reference) in references {
            if let Err(source) = registry.resolve(reference) {
                errors.push(ValidationError::Constraint {
                    endpoint: endpoint.name.clone(),
                    parameter: parameter.to_string(),
                    source,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::EndpointConfig;

    fn endpoint(name: &str, pattern: &str) -> EndpointConfig {
        EndpointConfig {
            name: name.to_string(),
            pattern: pattern.to_string(),
            order: 0,
            methods: Vec::new(),
            hosts: Vec::new(),
            consumes: Vec::new(),
            tokens: Default::default(),
            defaults: Default::default(),
            constraints: Default::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let mut config = RouterConfig::default();
        config.endpoints.push(endpoint("users", "users/{id:int}"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = RouterConfig::default();
        config.listener.bind_address = "nowhere".to_string();
        config.endpoints.push(endpoint("a", "a"));
        config.endpoints.push(endpoint("a", "b"));
        config.endpoints.push(endpoint("bad-pattern", "x/{"));
        config.endpoints.push(endpoint("bad-constraint", "x/{id:nope}"));
        config.endpoints.push(endpoint("bad-token", "[missing]/x"));
        let mut bad_method = endpoint("bad-method", "m");
        bad_method.methods.push("NOT A VERB".to_string());
        config.endpoints.push(bad_method);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 6, "{:?}", errors);
        assert!(matches!(errors[0], ValidationError::InvalidAddress { .. }));
        assert!(matches!(&errors[1], ValidationError::DuplicateName(name) if name == "a"));
        assert!(matches!(errors[2], ValidationError::Pattern { .. }));
        assert!(matches!(errors[3], ValidationError::Constraint { .. }));
        assert!(matches!(errors[4], ValidationError::Token { .. }));
        assert!(matches!(errors[5], ValidationError::InvalidMethod { .. }));
    }

    #[test]
    fn test_explicit_values_are_checked() {
        let mut config = RouterConfig::default();
        let mut conflicting = endpoint("conflict", "page/{n=1}");
        conflicting.defaults.insert("n".to_string(), "2".to_string());
        config.endpoints.push(conflicting);
        let mut unknown = endpoint("unknown", "page/{n}");
        unknown.constraints.insert("tenant".to_string(), "nope".to_string());
        config.endpoints.push(unknown);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2, "{:?}", errors);
        assert!(matches!(errors[0], ValidationError::ExplicitValue { .. }));
        assert!(matches!(&errors[1], ValidationError::Constraint { parameter, .. } if parameter == "tenant"));
    }

    #[test]
    fn test_custom_registry() {
        let mut config = RouterConfig::default();
        config.endpoints.push(endpoint("slug", "posts/{slug:slug}"));
        assert!(validate_config(&config).is_err());

        let mut registry = ConstraintRegistry::default();
        registry.register("slug", |_| {
            Ok(std::sync::Arc::new(|value: &str| value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
                as std::sync::Arc<dyn crate::routing::constraints::ParameterPolicy>)
        });
        assert!(validate_with(&config, &registry).is_ok());
    }
}
