//! Request `Content-Type` filtering.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use super::{any_candidate_has, MatcherPolicy};
use crate::routing::candidate::{CandidateSet, Rejections};
use crate::routing::context::RequestContext;
use crate::routing::endpoint::Endpoint;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid media type '{0}'; expected 'type/subtype', 'type/*' or '*/*'")]
pub struct MediaTypeError(pub String);

/// `type/subtype`, lowercased, parameters dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    kind: String,
    subtype: String,
}

impl MediaType {
    fn is_any(&self) -> bool {
        self.kind == "*" && self.subtype == "*"
    }

    /// Whether this (possibly wildcard) type accepts `other`.
    pub fn accepts(&self, other: &MediaType) -> bool {
        if self.is_any() {
            return true;
        }
        self.kind == other.kind && (self.subtype == "*" || self.subtype == other.subtype)
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let essence = text.split(';').next().unwrap_or_default().trim();
        let invalid = || MediaTypeError(text.to_string());

        let (kind, subtype) = essence.split_once('/').ok_or_else(invalid)?;
        let (kind, subtype) = (kind.trim(), subtype.trim());
        if kind.is_empty() || subtype.is_empty() || subtype.contains('/') || (kind == "*" && subtype != "*") {
            return Err(invalid());
        }

        Ok(Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)
    }
}

/// Media types an endpoint accepts as request bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumesMetadata {
    content_types: Vec<MediaType>,
}

impl ConsumesMetadata {
    pub fn new<I, S>(content_types: I) -> Result<Self, MediaTypeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let content_types = content_types
            .into_iter()
            .map(|content_type| content_type.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { content_types })
    }

    pub fn content_types(&self) -> &[MediaType] {
        &self.content_types
    }

    /// A missing or unparseable request type only satisfies `*/*`.
    pub fn matches(&self, content_type: Option<&str>) -> bool {
        if self.content_types.is_empty() {
            return true;
        }

        match content_type.and_then(|value| value.parse::<MediaType>().ok()) {
            Some(request) => self.content_types.iter().any(|accepted| accepted.accepts(&request)),
            None => self.content_types.iter().any(MediaType::is_any),
        }
    }
}

/// Rejects candidates whose [`ConsumesMetadata`] does not accept the
/// request `Content-Type`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsumesMatcherPolicy;

impl MatcherPolicy for ConsumesMatcherPolicy {
    fn name(&self) -> &'static str {
        "consumes"
    }

    fn order(&self) -> i32 {
        -50
    }

    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool {
        endpoints
            .iter()
            .any(|endpoint| endpoint.metadata_of::<ConsumesMetadata>().is_some())
    }

    fn is_applicable(&self, _request: &RequestContext, candidates: &CandidateSet) -> bool {
        any_candidate_has::<ConsumesMetadata>(candidates)
    }

    fn apply(&self, request: &RequestContext, candidates: &mut CandidateSet) {
        let rejected: Vec<usize> = candidates
            .path_matches()
            .filter(|(_, candidate)| {
                candidate
                    .endpoint()
                    .metadata_of::<ConsumesMetadata>()
                    .map_or(false, |metadata| !metadata.matches(request.content_type()))
            })
            .map(|(index, _)| index)
            .collect();

        for index in rejected {
            candidates.reject(index, Rejections::CONTENT_TYPE);
        }
    }
}
