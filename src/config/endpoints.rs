//! Turns endpoint configuration into routable endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;

use crate::config::schema::{EndpointConfig, RouterConfig};
use crate::config::validation::ValidationError;
use crate::routing::endpoint::Endpoint;
use crate::routing::pattern::tokens::replace_tokens;
use crate::routing::policy::{ConsumesMetadata, HostMetadata, HttpMethodMetadata};

impl EndpointConfig {
    /// Applies token replacement, parses the pattern, merges the explicit
    /// defaults and constraints and attaches method, host and content type
    /// metadata. Empty lists attach nothing.
    pub fn to_endpoint(&self, shared_tokens: &HashMap<String, String>) -> Result<Arc<Endpoint>, ValidationError> {
        let tokens = merge_tokens(shared_tokens, &self.tokens);
        let template = replace_tokens(&self.pattern, &tokens).map_err(|source| ValidationError::Token {
            endpoint: self.name.clone(),
            source,
        })?;

        let mut builder = Endpoint::parse(&template)
            .map_err(|source| ValidationError::Pattern {
                endpoint: self.name.clone(),
                source,
            })?
            .order(self.order)
            .display_name(self.name.clone());

        let explicit = |source| ValidationError::ExplicitValue {
            endpoint: self.name.clone(),
            source,
        };
        for (name, value) in sorted(&self.defaults) {
            builder = builder.default_value(name, value.as_str()).map_err(explicit)?;
        }
        for (name, constraint) in sorted(&self.constraints) {
            builder = builder.constraint(name, constraint).map_err(explicit)?;
        }

        if !self.methods.is_empty() {
            let methods = self
                .methods
                .iter()
                .map(|method| {
                    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes()).map_err(|_| {
                        ValidationError::InvalidMethod {
                            endpoint: self.name.clone(),
                            method: method.clone(),
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            builder = builder.metadata(HttpMethodMetadata::new(methods));
        }

        if !self.hosts.is_empty() {
            let hosts = HostMetadata::new(&self.hosts).map_err(|source| ValidationError::Host {
                endpoint: self.name.clone(),
                source,
            })?;
            builder = builder.metadata(hosts);
        }

        if !self.consumes.is_empty() {
            let consumes = ConsumesMetadata::new(&self.consumes).map_err(|source| ValidationError::MediaType {
                endpoint: self.name.clone(),
                source,
            })?;
            builder = builder.metadata(consumes);
        }

        Ok(builder.build())
    }
}

impl RouterConfig {
    /// Every configured endpoint, in file order. Fails on the first
    /// endpoint that does not convert; run validation first for a full
    /// report.
    pub fn build_endpoints(&self) -> Result<Vec<Arc<Endpoint>>, ValidationError> {
        self.endpoints
            .iter()
            .map(|endpoint| endpoint.to_endpoint(&self.tokens))
            .collect()
    }
}

/// Map entries by key, so explicit values apply in a stable order.
fn sorted(map: &HashMap<String, String>) -> Vec<(&str, &String)> {
    let mut entries: Vec<(&str, &String)> = map.iter().map(|(key, value)| (key.as_str(), value)).collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

/// Endpoint tokens win over shared ones, compared case-insensitively.
fn merge_tokens(shared: &HashMap<String, String>, own: &HashMap<String, String>) -> HashMap<String, String> {
    let mut merged: HashMap<String, String> = shared
        .iter()
        .filter(|(key, _)| !own.keys().any(|k| k.eq_ignore_ascii_case(key)))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    merged.extend(own.iter().map(|(key, value)| (key.clone(), value.clone())));
    merged
}
