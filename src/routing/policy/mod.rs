//! Matcher policies.
//!
//! # Data Flow
//! ```text
//! CandidateSet (path matches, ordered by score)
//!     → http_method.rs (order -1000, rejects with METHOD)
//!     → host.rs        (order -100,  rejects with HOST)
//!     → consumes.rs    (order -50,   rejects with CONTENT_TYPE)
//!     → selector
//! ```
//!
//! # Design Decisions
//! - Policies run in ascending `order`, ties by registration
//! - A policy that no endpoint carries metadata for is dropped when the
//!   snapshot is built, so it costs nothing per request
//! - Policies mark candidates, never remove them, and look at every path
//!   match even if another policy already rejected it

mod consumes;
mod host;
mod http_method;

use std::sync::Arc;

pub use consumes::{ConsumesMatcherPolicy, ConsumesMetadata, MediaType, MediaTypeError};
pub use host::{HostMatcherPolicy, HostMetadata, HostPattern, HostPatternError};
pub use http_method::{HttpMethodMatcherPolicy, HttpMethodMetadata};

use crate::routing::candidate::CandidateSet;
use crate::routing::context::RequestContext;
use crate::routing::endpoint::Endpoint;

/// A filter applied to path matches before selection.
pub trait MatcherPolicy: Send + Sync {
    /// Name used in logs and the admin API.
    fn name(&self) -> &'static str;

    /// Lower runs earlier.
    fn order(&self) -> i32;

    /// Whether any endpoint in the table carries this policy's metadata.
    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool;

    /// Whether the policy has work to do for this request.
    fn is_applicable(&self, _request: &RequestContext, _candidates: &CandidateSet) -> bool {
        true
    }

    fn apply(&self, request: &RequestContext, candidates: &mut CandidateSet);
}

/// The built-in policies: method, host, then content type.
pub fn default_policies() -> Vec<Arc<dyn MatcherPolicy>> {
    vec![
        Arc::new(HttpMethodMatcherPolicy),
        Arc::new(HostMatcherPolicy),
        Arc::new(ConsumesMatcherPolicy),
    ]
}

/// Sorts policies by order; the sort is stable so equal orders keep their
/// registration sequence.
pub(crate) fn sort_policies(policies: &mut [Arc<dyn MatcherPolicy>]) {
    policies.sort_by_key(|policy| policy.order());
}

/// True when at least one path match carries metadata of type `T`.
pub(crate) fn any_candidate_has<T: Send + Sync + 'static>(candidates: &CandidateSet) -> bool {
    candidates
        .path_matches()
        .any(|(_, candidate)| candidate.endpoint().metadata_of::<T>().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_order() {
        let mut policies = default_policies();
        policies.reverse();
        sort_policies(&mut policies);

        let names: Vec<&str> = policies.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["http_method", "host", "consumes"]);
    }
}
