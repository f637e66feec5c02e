//! Route lookup and hot rebuilds.
//!
//! # Responsibilities
//! - Hold the current matcher snapshot
//! - Run path matching, policies and selection for a request
//! - Rebuild the snapshot when the endpoint source changes
//!
//! # Design Decisions
//! - Snapshots are immutable and swapped atomically (`ArcSwap`); a request
//!   keeps the snapshot it started with
//! - Matching never blocks and never waits for a rebuild
//! - Rebuilds are serialized by a mutex; a failed rebuild leaves the
//!   published snapshot untouched
//! - Every successful rebuild increments the generation

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};

use crate::observability::metrics;
use crate::routing::constraints::ConstraintRegistry;
use crate::routing::context::RequestContext;
use crate::routing::dfa::{BuildError, DfaMatcher, DfaMatcherBuilder};
use crate::routing::endpoint::Endpoint;
use crate::routing::policy::{self, MatcherPolicy};
use crate::routing::selector::{self, MatchOutcome};
use crate::routing::source::EndpointDataSource;

/// One immutable generation of the route table.
pub struct MatcherSnapshot {
    generation: u64,
    built_at: DateTime<Utc>,
    matcher: DfaMatcher,
    endpoints: Vec<Arc<Endpoint>>,
    /// Policies whose metadata appears on at least one endpoint.
    policies: Vec<Arc<dyn MatcherPolicy>>,
}

impl MatcherSnapshot {
    fn build(
        generation: u64,
        endpoints: Vec<Arc<Endpoint>>,
        registry: &ConstraintRegistry,
        policies: &[Arc<dyn MatcherPolicy>],
    ) -> Result<Self, BuildError> {
        let matcher = DfaMatcherBuilder::new(registry.clone())
            .add_endpoints(endpoints.iter().cloned())
            .build()?;

        let policies = policies
            .iter()
            .filter(|policy| policy.applies_to_endpoints(&endpoints))
            .cloned()
            .collect();

        Ok(Self {
            generation,
            built_at: Utc::now(),
            matcher,
            endpoints,
            policies,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn matcher(&self) -> &DfaMatcher {
        &self.matcher
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    /// Names of the policies that run for this snapshot, in order.
    pub fn active_policies(&self) -> Vec<&'static str> {
        self.policies.iter().map(|policy| policy.name()).collect()
    }

    /// Matches against this snapshot only.
    pub fn match_request(&self, request: &RequestContext) -> MatchOutcome {
        let mut candidates = self.matcher.candidates(request.path());
        if candidates.is_empty() {
            return MatchOutcome::NotFound;
        }

        for policy in &self.policies {
            if policy.is_applicable(request, &candidates) {
                policy.apply(request, &mut candidates);
            }
        }

        let outcome = selector::select(candidates);
        if let MatchOutcome::Ambiguous { endpoints } = &outcome {
            tracing::error!(
                method = %request.method(),
                path = %request.path(),
                endpoints = ?endpoints,
                generation = self.generation,
                "Request matched multiple endpoints with the same precedence"
            );
        }
        outcome
    }
}

pub struct RouterBuilder {
    registry: ConstraintRegistry,
    policies: Vec<Arc<dyn MatcherPolicy>>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            registry: ConstraintRegistry::default(),
            policies: policy::default_policies(),
        }
    }

    pub fn constraints(mut self, registry: ConstraintRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Adds a policy to the defaults.
    pub fn policy(mut self, policy: Arc<dyn MatcherPolicy>) -> Self {
        self.policies.push(policy);
        self
    }

    /// Drops every policy registered so far, defaults included.
    pub fn clear_policies(mut self) -> Self {
        self.policies.clear();
        self
    }

    /// Builds generation 1 from the current contents of `source`.
    pub fn build(mut self, source: Arc<dyn EndpointDataSource>) -> Result<Router, BuildError> {
        policy::sort_policies(&mut self.policies);

        // Subscribe first so changes racing the initial build still trigger
        // a rebuild.
        let changes = source.subscribe();
        let snapshot = MatcherSnapshot::build(1, source.endpoints(), &self.registry, &self.policies)?;
        metrics::record_rebuild(true, snapshot.endpoints.len());

        tracing::info!(
            endpoints = snapshot.endpoints.len(),
            nodes = snapshot.matcher.node_count(),
            policies = ?snapshot.active_policies(),
            "Router initialized"
        );

        Ok(Router {
            source,
            registry: self.registry,
            policies: self.policies,
            snapshot: ArcSwap::from_pointee(snapshot),
            rebuild_lock: Mutex::new(()),
            changes,
        })
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Matches requests against the latest snapshot of an endpoint source.
pub struct Router {
    source: Arc<dyn EndpointDataSource>,
    registry: ConstraintRegistry,
    policies: Vec<Arc<dyn MatcherPolicy>>,
    snapshot: ArcSwap<MatcherSnapshot>,
    rebuild_lock: Mutex<()>,
    changes: watch::Receiver<u64>,
}

impl Router {
    /// A router with the default constraints and policies.
    pub fn new(source: Arc<dyn EndpointDataSource>) -> Result<Self, BuildError> {
        RouterBuilder::new().build(source)
    }

    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn snapshot(&self) -> Arc<MatcherSnapshot> {
        self.snapshot.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.load().generation
    }

    pub fn source(&self) -> &Arc<dyn EndpointDataSource> {
        &self.source
    }

    /// Change notifications of the source, starting from the version the
    /// router was built from.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.clone()
    }

    pub fn match_request(&self, request: &RequestContext) -> MatchOutcome {
        let start = Instant::now();
        let outcome = self.snapshot.load().match_request(request);
        metrics::record_match(outcome.label(), start);
        outcome
    }

    /// Rebuilds from the source and publishes the result.
    ///
    /// Returns the new generation. On error the current snapshot stays.
    pub fn rebuild(&self) -> Result<u64, BuildError> {
        let _guard = self.rebuild_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let generation = self.snapshot.load().generation + 1;
        let start = Instant::now();
        match MatcherSnapshot::build(generation, self.source.endpoints(), &self.registry, &self.policies) {
            Ok(snapshot) => {
                let endpoints = snapshot.endpoints.len();
                let nodes = snapshot.matcher.node_count();
                self.snapshot.store(Arc::new(snapshot));
                metrics::record_rebuild(true, endpoints);
                tracing::info!(
                    generation,
                    endpoints,
                    nodes,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Route table rebuilt"
                );
                Ok(generation)
            }
            Err(e) => {
                metrics::record_rebuild(false, self.snapshot.load().endpoints.len());
                tracing::error!(
                    error = %e,
                    current_generation = generation - 1,
                    "Route table rebuild failed; keeping current snapshot"
                );
                Err(e)
            }
        }
    }
}

/// Rebuilds the router whenever its endpoint source changes.
///
/// Notifications that arrive while a rebuild runs are coalesced into one
/// follow-up rebuild.
pub struct RebuildCoordinator {
    router: Arc<Router>,
    changes: watch::Receiver<u64>,
}

impl RebuildCoordinator {
    pub fn new(router: Arc<Router>) -> Self {
        let changes = router.changes();
        Self { router, changes }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(generation = self.router.generation(), "Rebuild coordinator starting");

        loop {
            tokio::select! {
                changed = self.changes.changed() => {
                    if changed.is_err() {
                        tracing::info!("Endpoint source closed, rebuild coordinator exiting");
                        break;
                    }
                    let version = *self.changes.borrow_and_update();
                    tracing::debug!(version, "Endpoint change detected");

                    let router = self.router.clone();
                    match tokio::task::spawn_blocking(move || router.rebuild()).await {
                        Ok(Ok(generation)) => tracing::debug!(version, generation, "Rebuild applied"),
                        Ok(Err(_)) => {}
                        Err(e) => tracing::error!(error = %e, "Rebuild task failed"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rebuild coordinator received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::policy::HttpMethodMetadata;
    use crate::routing::source::DefaultEndpointDataSource;
    use axum::http::Method;

    fn get(path: &str) -> RequestContext {
        RequestContext::new(Method::GET, path)
    }

    #[test]
    fn test_initial_generation_and_match() {
        let source = Arc::new(DefaultEndpointDataSource::new(vec![
            Endpoint::parse("users/{id:int}").unwrap().build(),
        ]));
        let router = Router::new(source).unwrap();

        assert_eq!(router.generation(), 1);
        assert!(router.match_request(&get("/users/7")).matched().is_some());
        assert_eq!(router.match_request(&get("/users/x")).label(), "not_found");
    }

    #[test]
    fn test_inactive_policies_are_skipped() {
        let source = Arc::new(DefaultEndpointDataSource::new(vec![
            Endpoint::parse("a").unwrap().metadata(HttpMethodMetadata::new([Method::GET])).build(),
        ]));
        let router = Router::new(source).unwrap();
        assert_eq!(router.snapshot().active_policies(), vec!["http_method"]);
    }

    #[test]
    fn test_rebuild_swaps_snapshot() {
        let source = Arc::new(DefaultEndpointDataSource::new(vec![Endpoint::parse("old").unwrap().build()]));
        let router = Router::new(source.clone()).unwrap();
        let before = router.snapshot();

        source.set_endpoints(vec![Endpoint::parse("new").unwrap().build()]);
        assert_eq!(router.rebuild().unwrap(), 2);

        assert_eq!(router.match_request(&get("/old")).label(), "not_found");
        assert!(router.match_request(&get("/new")).matched().is_some());
        // The old snapshot is still usable by whoever holds it.
        assert!(before.match_request(&get("/old")).matched().is_some());
    }

    #[test]
    fn test_failed_rebuild_keeps_snapshot() {
        let source = Arc::new(DefaultEndpointDataSource::new(vec![Endpoint::parse("ok").unwrap().build()]));
        let router = Router::new(source.clone()).unwrap();

        source.add_endpoint(Endpoint::parse("bad/{id:nope}").unwrap().build());
        assert!(router.rebuild().is_err());
        assert_eq!(router.generation(), 1);
        assert!(router.match_request(&get("/ok")).matched().is_some());
    }

    #[tokio::test]
    async fn test_coordinator_rebuilds_and_stops() {
        let source = Arc::new(DefaultEndpointDataSource::default());
        let router = Arc::new(Router::new(source.clone()).unwrap());
        let shutdown = crate::lifecycle::Shutdown::new();
        let task = tokio::spawn(RebuildCoordinator::new(router.clone()).run(shutdown.subscribe()));

        source.add_endpoint(Endpoint::parse("late").unwrap().build());
        for _ in 0..100 {
            if router.generation() > 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(router.match_request(&get("/late")).matched().is_some());

        shutdown.trigger();
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .expect("coordinator stopped")
            .unwrap();
    }
}
