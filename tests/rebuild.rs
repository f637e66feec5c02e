//! Hot rebuilds while requests are being matched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use endpoint_router::lifecycle::Shutdown;
use endpoint_router::routing::{
    CompositeEndpointDataSource, DefaultEndpointDataSource, Endpoint, EndpointDataSource, RebuildCoordinator, Router,
};

mod common;
use common::{endpoint, get, router};

/// A table whose endpoint names all carry `version`.
fn table(version: u32) -> Vec<Arc<Endpoint>> {
    vec![
        endpoint("a/{id}").display_name(format!("a-v{}", version)).build(),
        endpoint("b").display_name(format!("b-v{}", version)).build(),
        endpoint("c/{*rest}").display_name(format!("c-v{}", version)).build(),
    ]
}

fn version_of(name: &str) -> &str {
    name.split_once("-v").map(|(_, version)| version).unwrap_or("?")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rebuild_never_tears() {
    let (source, router) = router(table(0));
    let stop = Arc::new(AtomicBool::new(false));

    let mut readers = Vec::new();
    for _ in 0..3 {
        let router = router.clone();
        let stop = stop.clone();
        readers.push(tokio::task::spawn_blocking(move || {
            let mut checked = 0u64;
            while !stop.load(Ordering::Relaxed) {
                let snapshot = router.snapshot();
                let names: Vec<String> = ["/a/1", "/b", "/c/x/y"]
                    .iter()
                    .map(|path| {
                        let outcome = snapshot.match_request(&get(path));
                        let found = outcome.matched().unwrap_or_else(|| panic!("{} unmatched: {:?}", path, outcome));
                        found.endpoint().display_name().to_string()
                    })
                    .collect();

                let version = version_of(&names[0]);
                assert!(names.iter().all(|name| version_of(name) == version), "torn snapshot: {:?}", names);
                assert!(router.match_request(&get("/b")).matched().is_some());
                checked += 1;
            }
            checked
        }));
    }

    for version in 1..=50 {
        source.set_endpoints(table(version));
        router.rebuild().unwrap();
        tokio::task::yield_now().await;
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }
    assert_eq!(router.generation(), 51);
    assert_eq!(
        router.match_request(&get("/b")).matched().unwrap().endpoint().display_name(),
        "b-v50"
    );
}

#[tokio::test]
async fn test_coordinator_follows_composite_source() {
    let static_source = Arc::new(DefaultEndpointDataSource::new(vec![endpoint("health").build()]));
    let dynamic_source = Arc::new(DefaultEndpointDataSource::default());
    let composite = Arc::new(CompositeEndpointDataSource::new(vec![
        static_source as Arc<dyn EndpointDataSource>,
        dynamic_source.clone(),
    ]));
    let router = Arc::new(Router::new(composite).unwrap());

    let shutdown = Shutdown::new();
    let coordinator = tokio::spawn(RebuildCoordinator::new(router.clone()).run(shutdown.subscribe()));

    assert!(router.match_request(&get("/health")).matched().is_some());
    assert!(router.match_request(&get("/orders/1")).matched().is_none());

    dynamic_source.add_endpoint(endpoint("orders/{id:int}").build());
    for _ in 0..200 {
        if router.match_request(&get("/orders/1")).matched().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(router.match_request(&get("/orders/1")).matched().is_some());
    assert!(router.generation() >= 2);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(1), coordinator).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bad_table_keeps_serving_previous_generation() {
    let (source, router) = router(table(1));
    let shutdown = Shutdown::new();
    let coordinator = tokio::spawn(RebuildCoordinator::new(router.clone()).run(shutdown.subscribe()));

    source.add_endpoint(endpoint("broken/{id:unknown}").build());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(router.generation(), 1);
    assert!(router.match_request(&get("/b")).matched().is_some());

    source.set_endpoints(table(2));
    for _ in 0..200 {
        if router.generation() > 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        router.match_request(&get("/b")).matched().unwrap().endpoint().display_name(),
        "b-v2"
    );

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(1), coordinator).await.unwrap().unwrap();
}
