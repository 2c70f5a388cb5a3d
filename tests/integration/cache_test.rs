//! Adapter cache: transparency and concurrent first-time insertion.

use std::sync::Arc;

use courier::{AdapterCache, Mediator, ServiceRegistry};

use crate::common::*;

fn decorated_registry(log: &EventLog) -> ServiceRegistry {
    ServiceRegistry::builder()
        .handler::<Echo, _>(EchoHandler { log: log.clone() })
        .decorator::<Echo, _>(RecordingDecorator::new("d1", log))
        .build()
}

#[tokio::test]
async fn test_cached_dispatch_matches_first_dispatch() {
    let log = EventLog::default();
    let mediator = mediator(decorated_registry(&log));

    let first = mediator.send(Echo("same".to_string())).await.unwrap();
    let first_log = log.entries();
    for _ in 0..5 {
        let again = mediator.send(Echo("same".to_string())).await.unwrap();
        assert_eq!(again, first);
    }

    assert_eq!(first_log, vec!["d1:before", "handler", "d1:after"]);
    assert_eq!(log.entries().len(), first_log.len() * 6);

    let stats = mediator.adapter_cache().stats();
    assert_eq!(stats.handler_entries, 1);
    assert_eq!(stats.decorator_entries, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 10);
}

#[tokio::test]
async fn test_failures_are_identical_with_warm_cache() {
    let mediator = mediator(ServiceRegistry::builder().handler::<Echo, _>(RejectingHandler).build());

    let cold = mediator.send(Echo("x".to_string())).await.unwrap_err();
    let warm = mediator.send(Echo("x".to_string())).await.unwrap_err();

    assert_eq!(cold.kind(), warm.kind());
    assert_eq!(cold.code(), warm.code());
    assert_eq!(cold.message(), warm.message());
}

#[tokio::test]
async fn test_mediators_can_share_one_cache() {
    let cache = Arc::new(AdapterCache::new());
    let log = EventLog::default();
    let build = |cache: &Arc<AdapterCache>| {
        Mediator::builder()
            .resolver(Arc::new(decorated_registry(&log)))
            .adapter_cache(cache.clone())
            .build()
            .unwrap()
    };
    let a = build(&cache);
    let b = build(&cache);

    a.send(Echo("a".to_string())).await.unwrap();
    b.send(Echo("b".to_string())).await.unwrap();

    let stats = cache.stats();
    assert_eq!(stats.handler_entries, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_first_dispatch_is_race_safe() {
    let log = EventLog::default();
    let mediator = mediator(decorated_registry(&log));
    let barrier = Arc::new(tokio::sync::Barrier::new(64));

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let mediator = mediator.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                mediator.send(Echo(format!("msg-{i}"))).await
            })
        })
        .collect();

    let results = futures::future::join_all(tasks).await;
    for (i, joined) in results.into_iter().enumerate() {
        let out = joined.expect("task completed").expect("dispatch succeeded");
        assert_eq!(out, format!("msg-{i}"));
    }

    let stats = mediator.adapter_cache().stats();
    assert_eq!(stats.handler_entries, 1);
    assert_eq!(stats.decorator_entries, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits + stats.misses, 128);
    assert_eq!(log.entries().len(), 64 * 3);
}
