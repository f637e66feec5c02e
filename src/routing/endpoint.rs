//! Routable endpoints.
//!
//! An endpoint pairs a parsed [`RoutePattern`] with an order, a display name
//! and an open, type-keyed metadata collection. Matcher policies read their
//! own metadata types (`HttpMethodMetadata`, `HostMetadata`, ...) from it.

use std::fmt;
use std::sync::Arc;

use axum::http::Extensions;

use crate::routing::pattern::{ExplicitValueError, PatternError, RoutePattern};

/// A registered request target.
pub struct Endpoint {
    pattern: RoutePattern,
    order: i32,
    display_name: String,
    metadata: Extensions,
}

impl Endpoint {
    pub fn builder(pattern: RoutePattern) -> EndpointBuilder {
        EndpointBuilder {
            pattern,
            order: 0,
            display_name: None,
            metadata: Extensions::new(),
        }
    }

    /// Parse `template` and start building an endpoint for it.
    pub fn parse(template: &str) -> Result<EndpointBuilder, PatternError> {
        RoutePattern::parse(template).map(Self::builder)
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Lower values win.
    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn metadata(&self) -> &Extensions {
        &self.metadata
    }

    /// Shorthand for `metadata().get::<T>()`.
    pub fn metadata_of<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.metadata.get::<T>()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("display_name", &self.display_name)
            .field("pattern", &self.pattern.raw())
            .field("order", &self.order)
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

pub struct EndpointBuilder {
    pattern: RoutePattern,
    order: i32,
    display_name: Option<String>,
    metadata: Extensions,
}

impl EndpointBuilder {
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// A default kept outside the template. Names that are not template
    /// parameters still show up in the route values of every match.
    pub fn default_value(mut self, name: &str, value: impl Into<String>) -> Result<Self, ExplicitValueError> {
        self.pattern = self.pattern.with_default(name, value)?;
        Ok(self)
    }

    /// Constraints kept outside the template, e.g. `("id", "int:min(1)")`.
    pub fn constraint(mut self, name: &str, constraint: &str) -> Result<Self, ExplicitValueError> {
        self.pattern = self.pattern.with_constraint(name, constraint)?;
        Ok(self)
    }

    /// Attach a metadata value, replacing any existing value of the same type.
    pub fn metadata<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.metadata.insert(value);
        self
    }

    /// Finish the endpoint. The display name defaults to the template text.
    pub fn build(self) -> Arc<Endpoint> {
        let display_name = self
            .display_name
            .unwrap_or_else(|| self.pattern.raw().to_string());
        Arc::new(Endpoint {
            pattern: self.pattern,
            order: self.order,
            display_name,
            metadata: self.metadata,
        })
    }
}
