//! Endpoint data sources.
//!
//! # Responsibilities
//! - Supply the current endpoint list
//! - Signal changes through a `tokio::sync::watch` version counter
//!
//! # Design Decisions
//! - Watch channels coalesce: a slow rebuild only ever sees the latest
//!   version, never a backlog
//! - Endpoint lists are published as a whole (`ArcSwap`), readers never
//!   observe a half-updated list

use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::routing::endpoint::Endpoint;

/// A provider of endpoints that can announce changes.
pub trait EndpointDataSource: Send + Sync {
    /// Snapshot of the current endpoints.
    fn endpoints(&self) -> Vec<Arc<Endpoint>>;

    /// Receives a new version number after every change.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// In-memory, replaceable endpoint list.
pub struct DefaultEndpointDataSource {
    endpoints: ArcSwap<Vec<Arc<Endpoint>>>,
    version: watch::Sender<u64>,
}

impl DefaultEndpointDataSource {
    pub fn new(endpoints: Vec<Arc<Endpoint>>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            endpoints: ArcSwap::from_pointee(endpoints),
            version,
        }
    }

    /// Replace the whole list and notify subscribers.
    pub fn set_endpoints(&self, endpoints: Vec<Arc<Endpoint>>) {
        self.endpoints.store(Arc::new(endpoints));
        self.bump();
    }

    pub fn add_endpoint(&self, endpoint: Arc<Endpoint>) {
        self.endpoints.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(endpoint.clone());
            next
        });
        self.bump();
    }

    pub fn len(&self) -> usize {
        self.endpoints.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.load().is_empty()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Number of live change subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.version.receiver_count()
    }

    fn bump(&self) {
        self.version.send_modify(|version| *version += 1);
        tracing::debug!(version = self.version(), "Endpoint data source changed");
    }
}

impl Default for DefaultEndpointDataSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl EndpointDataSource for DefaultEndpointDataSource {
    fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        Vec::clone(&self.endpoints.load())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

/// Concatenates several sources, in order.
pub struct CompositeEndpointDataSource {
    sources: Vec<Arc<dyn EndpointDataSource>>,
    version: Arc<watch::Sender<u64>>,
    forwarders: Vec<JoinHandle<()>>,
}

impl CompositeEndpointDataSource {
    /// Change notifications of the inner sources are forwarded by one task
    /// per source, so this must be called inside a Tokio runtime for the
    /// composite to observe later changes.
    pub fn new(sources: Vec<Arc<dyn EndpointDataSource>>) -> Self {
        let (version, _) = watch::channel(0);
        let version = Arc::new(version);

        let forwarders = match tokio::runtime::Handle::try_current() {
            Ok(handle) => sources
                .iter()
                .map(|source| handle.spawn(forward_changes(source.subscribe(), Arc::downgrade(&version))))
                .collect(),
            Err(_) => {
                tracing::warn!(
                    sources = sources.len(),
                    "No Tokio runtime; composite endpoint source will not forward change notifications"
                );
                Vec::new()
            }
        };

        Self {
            sources,
            version,
            forwarders,
        }
    }

    pub fn sources(&self) -> &[Arc<dyn EndpointDataSource>] {
        &self.sources
    }
}

/// Bumps the composite version for every inner change. Stops when either
/// side goes away.
async fn forward_changes(mut inner: watch::Receiver<u64>, outer: Weak<watch::Sender<u64>>) {
    while inner.changed().await.is_ok() {
        match outer.upgrade() {
            Some(sender) => sender.send_modify(|version| *version += 1),
            None => break,
        }
    }
}

impl Drop for CompositeEndpointDataSource {
    fn drop(&mut self) {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
    }
}

impl EndpointDataSource for CompositeEndpointDataSource {
    fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.sources
            .iter()
            .flat_map(|source| source.endpoints())
            .collect()
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn endpoint(template: &str) -> Arc<Endpoint> {
        Endpoint::parse(template).unwrap().build()
    }

    #[test]
    fn test_default_source_versions() {
        let source = DefaultEndpointDataSource::new(vec![endpoint("a")]);
        let mut changes = source.subscribe();
        assert_eq!(source.version(), 0);

        source.add_endpoint(endpoint("b"));
        assert_eq!(source.len(), 2);
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 1);

        source.set_endpoints(vec![]);
        assert!(source.is_empty());
        assert_eq!(source.version(), 2);
    }

    #[tokio::test]
    async fn test_composite_concatenates_and_forwards() {
        let first = Arc::new(DefaultEndpointDataSource::new(vec![endpoint("a")]));
        let second = Arc::new(DefaultEndpointDataSource::new(vec![endpoint("b"), endpoint("c")]));
        let composite = CompositeEndpointDataSource::new(vec![first as Arc<dyn EndpointDataSource>, second.clone()]);

        let names: Vec<String> = composite
            .endpoints()
            .iter()
            .map(|e| e.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let mut changes = composite.subscribe();
        second.add_endpoint(endpoint("d"));
        tokio::time::timeout(Duration::from_secs(1), changes.changed())
            .await
            .expect("change forwarded")
            .unwrap();
        assert_eq!(composite.endpoints().len(), 4);
    }

    #[tokio::test]
    async fn test_composite_drop_stops_forwarders() {
        let inner = Arc::new(DefaultEndpointDataSource::new(vec![endpoint("a")]));
        let composite = CompositeEndpointDataSource::new(vec![inner.clone() as Arc<dyn EndpointDataSource>]);
        assert_eq!(inner.subscriber_count(), 1);

        drop(composite);
        for _ in 0..100 {
            if inner.subscriber_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(inner.subscriber_count(), 0);
    }

    #[test]
    fn test_composite_without_runtime_still_lists_endpoints() {
        let inner = Arc::new(DefaultEndpointDataSource::new(vec![endpoint("a")]));
        let composite = CompositeEndpointDataSource::new(vec![inner.clone() as Arc<dyn EndpointDataSource>]);
        assert_eq!(composite.endpoints().len(), 1);
        assert_eq!(inner.subscriber_count(), 0);
    }
}
