//! Final endpoint selection.
//!
//! ```text
//! Unmatched → PathWalked → PolicyFiltered → Selected
//!                                         → Ambiguous
//!                                         → MethodNotAllowed
//!                                         → NotFound
//! ```

use std::sync::Arc;

use axum::http::Method;

use crate::routing::candidate::{CandidateSet, Rejections};
use crate::routing::endpoint::Endpoint;
use crate::routing::policy::HttpMethodMetadata;
use crate::routing::values::RouteValues;

/// The selected endpoint and the values captured for it.
#[derive(Debug, Clone)]
pub struct EndpointMatch {
    endpoint: Arc<Endpoint>,
    values: RouteValues,
}

impl EndpointMatch {
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn values(&self) -> &RouteValues {
        &self.values
    }
}

/// Result of matching one request. Never retried.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched(EndpointMatch),
    NotFound,
    /// Every path match was rejected by the method policy alone.
    MethodNotAllowed { allow: Vec<Method> },
    /// More than one valid candidate shares the best score.
    Ambiguous { endpoints: Vec<String> },
}

impl MatchOutcome {
    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            MatchOutcome::Matched(_) => "matched",
            MatchOutcome::NotFound => "not_found",
            MatchOutcome::MethodNotAllowed { .. } => "method_not_allowed",
            MatchOutcome::Ambiguous { .. } => "ambiguous",
        }
    }

    pub fn matched(&self) -> Option<&EndpointMatch> {
        match self {
            MatchOutcome::Matched(found) => Some(found),
            _ => None,
        }
    }
}

/// Picks the valid candidate with the lowest score.
pub fn select(candidates: CandidateSet) -> MatchOutcome {
    let best_score = match candidates.valid().next() {
        Some(best) => best.score(),
        None => return unmatched(&candidates),
    };

    let tied: Vec<String> = candidates
        .valid()
        .filter(|candidate| candidate.score() == best_score)
        .map(|candidate| candidate.endpoint().display_name().to_string())
        .collect();
    if tied.len() > 1 {
        return MatchOutcome::Ambiguous { endpoints: tied };
    }

    candidates
        .into_vec()
        .into_iter()
        .find(|candidate| candidate.is_valid())
        .map(|candidate| {
            let (endpoint, values) = candidate.into_match();
            MatchOutcome::Matched(EndpointMatch { endpoint, values })
        })
        .unwrap_or(MatchOutcome::NotFound)
}

fn unmatched(candidates: &CandidateSet) -> MatchOutcome {
    let method_only: Vec<_> = candidates
        .iter()
        .filter(|candidate| candidate.rejections() == Rejections::METHOD)
        .collect();
    if method_only.is_empty() {
        return MatchOutcome::NotFound;
    }

    let mut allow: Vec<Method> = method_only
        .iter()
        .filter_map(|candidate| candidate.endpoint().metadata_of::<HttpMethodMetadata>())
        .flat_map(|metadata| metadata.methods().iter().cloned())
        .collect();
    allow.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    allow.dedup();

    MatchOutcome::MethodNotAllowed { allow }
}
