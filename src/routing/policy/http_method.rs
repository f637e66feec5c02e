//! HTTP method filtering.

use std::sync::Arc;

use axum::http::Method;

use super::{any_candidate_has, MatcherPolicy};
use crate::routing::candidate::{CandidateSet, Rejections};
use crate::routing::context::RequestContext;
use crate::routing::endpoint::Endpoint;

/// Verbs an endpoint accepts. An empty list accepts every verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMethodMetadata {
    methods: Vec<Method>,
}

impl HttpMethodMetadata {
    pub fn new(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
        }
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }
}

/// Rejects candidates whose [`HttpMethodMetadata`] excludes the request
/// method. Endpoints without metadata accept any method.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpMethodMatcherPolicy;

impl MatcherPolicy for HttpMethodMatcherPolicy {
    fn name(&self) -> &'static str {
        "http_method"
    }

    fn order(&self) -> i32 {
        -1000
    }

    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool {
        endpoints
            .iter()
            .any(|endpoint| endpoint.metadata_of::<HttpMethodMetadata>().is_some())
    }

    fn is_applicable(&self, _request: &RequestContext, candidates: &CandidateSet) -> bool {
        any_candidate_has::<HttpMethodMetadata>(candidates)
    }

    fn apply(&self, request: &RequestContext, candidates: &mut CandidateSet) {
        let rejected: Vec<usize> = candidates
            .path_matches()
            .filter(|(_, candidate)| {
                candidate
                    .endpoint()
                    .metadata_of::<HttpMethodMetadata>()
                    .map_or(false, |metadata| !metadata.allows(request.method()))
            })
            .map(|(index, _)| index)
            .collect();

        for index in rejected {
            candidates.reject(index, Rejections::METHOD);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::candidate::Candidate;
    use crate::routing::values::RouteValues;

    fn candidates(endpoints: Vec<Arc<Endpoint>>) -> CandidateSet {
        CandidateSet::new(
            endpoints
                .into_iter()
                .enumerate()
                .map(|(i, e)| Candidate::new(e, RouteValues::new(), i as u32, Rejections::empty()))
                .collect(),
        )
    }

    #[test]
    fn test_rejects_unlisted_method() {
        let get_only = Endpoint::parse("orders")
            .unwrap()
            .metadata(HttpMethodMetadata::new([Method::GET]))
            .build();
        let any = Endpoint::parse("orders").unwrap().build();
        let mut set = candidates(vec![get_only, any]);

        let request = RequestContext::new(Method::POST, "/orders");
        assert!(HttpMethodMatcherPolicy.is_applicable(&request, &set));
        HttpMethodMatcherPolicy.apply(&request, &mut set);

        assert_eq!(set.get(0).unwrap().rejections(), Rejections::METHOD);
        assert!(set.get(1).unwrap().is_valid());
    }

    #[test]
    fn test_marks_already_rejected_candidates() {
        let endpoint = Endpoint::parse("orders")
            .unwrap()
            .metadata(HttpMethodMetadata::new([Method::GET]))
            .build();
        let mut set = candidates(vec![endpoint]);
        set.reject(0, Rejections::HOST);

        HttpMethodMatcherPolicy.apply(&RequestContext::new(Method::DELETE, "/orders"), &mut set);
        assert_eq!(
            set.get(0).unwrap().rejections(),
            Rejections::HOST | Rejections::METHOD
        );
    }

    #[test]
    fn test_empty_list_accepts_all() {
        let metadata = HttpMethodMetadata::new([]);
        assert!(metadata.allows(&Method::PATCH));
    }

    #[test]
    fn test_not_applicable_without_metadata() {
        let set = candidates(vec![Endpoint::parse("a").unwrap().build()]);
        let request = RequestContext::new(Method::GET, "/a");
        assert!(!HttpMethodMatcherPolicy.is_applicable(&request, &set));
        assert!(!HttpMethodMatcherPolicy.applies_to_endpoints(&[Endpoint::parse("a").unwrap().build()]));
    }
}
