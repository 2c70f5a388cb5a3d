//! Notification fan-out: isolation, wait-for-all and strategies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use courier::{
    AnyNotification, FanOutStrategy, MediatorConfig, NotificationConfig, PublishSummary,
    ServiceRegistry,
};
use tokio_util::sync::CancellationToken;

use crate::common::*;

fn concurrent(max_concurrency: Option<usize>) -> MediatorConfig {
    MediatorConfig {
        notifications: NotificationConfig {
            strategy: FanOutStrategy::Concurrent,
            max_concurrency,
        },
    }
}

#[tokio::test]
async fn test_panicking_handler_does_not_stop_siblings() {
    let (first, first_calls) = CountingHandler::new();
    let (third, third_calls) = CountingHandler::new();
    let registry = ServiceRegistry::builder()
        .notification_handler::<OrderPlaced, _>(first)
        .notification_handler::<OrderPlaced, _>(PanickingNotificationHandler)
        .notification_handler::<OrderPlaced, _>(third)
        .build();
    let mediator = mediator(registry);

    let summary = mediator.publish(OrderPlaced { order_id: 7 }).await;

    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(third_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        summary,
        PublishSummary {
            handlers: 3,
            succeeded: 2,
            failed: 1,
        }
    );
}

#[tokio::test]
async fn test_failing_handler_is_isolated_under_concurrent_strategy() {
    let (first, first_calls) = CountingHandler::new();
    let (third, third_calls) = CountingHandler::new();
    let registry = ServiceRegistry::builder()
        .notification_handler::<OrderPlaced, _>(first)
        .notification_handler::<OrderPlaced, _>(FailingNotificationHandler)
        .notification_handler::<OrderPlaced, _>(PanickingNotificationHandler)
        .notification_handler::<OrderPlaced, _>(third)
        .build();
    let mediator = mediator_with(registry, concurrent(None));

    let summary = mediator.publish(OrderPlaced { order_id: 1 }).await;

    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(third_calls.load(Ordering::SeqCst), 1);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 2);
    assert!(!summary.all_succeeded());
}

#[tokio::test]
async fn test_no_handlers_is_a_successful_no_op() {
    let (counting, calls) = CountingHandler::new();
    let registry = ServiceRegistry::builder()
        .notification_handler::<OrderPlaced, _>(counting)
        .build();
    let mediator = mediator(registry);

    let summary = mediator.publish(NobodyListens).await;

    assert_eq!(summary, PublishSummary::default());
    assert!(summary.all_succeeded());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(mediator.adapter_cache().is_empty());
}

#[tokio::test]
async fn test_resolution_fault_publishes_to_nobody() {
    let (counting, calls) = CountingHandler::new();
    let registry = ServiceRegistry::builder()
        .notification_handler::<OrderPlaced, _>(counting)
        .build();
    let mut resolver = FaultyResolver::new(registry);
    resolver.fail_notifications = true;
    let mediator = mediator(resolver);

    let summary = mediator.publish(OrderPlaced { order_id: 2 }).await;

    assert_eq!(summary.handlers, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_panicking_handler_factory_skips_only_that_registration() {
    for config in [MediatorConfig::default(), concurrent(None)] {
        let (first, first_calls) = CountingHandler::new();
        let (last, last_calls) = CountingHandler::new();
        let registry = ServiceRegistry::builder()
            .notification_handler::<OrderPlaced, _>(first)
            .notification_handler_factory::<OrderPlaced, _, _>(|| -> CountingHandler {
                panic!("notification factory exploded")
            })
            .notification_handler::<OrderPlaced, _>(last)
            .build();
        let mediator = mediator_with(registry, config);

        let summary = mediator.publish(OrderPlaced { order_id: 5 }).await;

        assert_eq!(summary.handlers, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(last_calls.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_panicking_resolver_publishes_to_nobody() {
    let mediator = mediator(PanickingResolver);

    let summary = mediator.publish(OrderPlaced { order_id: 6 }).await;

    assert_eq!(summary, PublishSummary::default());
}

#[tokio::test]
async fn test_dropping_publish_stops_outstanding_handlers() {
    for config in [MediatorConfig::default(), concurrent(None)] {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ServiceRegistry::builder()
            .notification_handler::<OrderPlaced, _>(SlowCountingHandler {
                delay: Duration::from_millis(200),
                calls: calls.clone(),
            })
            .build();
        let mediator = mediator_with(registry, config);

        let publish = mediator.publish(OrderPlaced { order_id: 7 });
        let outcome = tokio::time::timeout(Duration::from_millis(20), publish).await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_publish_waits_for_every_handler() {
    for config in [MediatorConfig::default(), concurrent(Some(2))] {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut builder = ServiceRegistry::builder();
        for delay_ms in [30, 5, 15, 0] {
            builder = builder.notification_handler::<OrderPlaced, _>(SlowCountingHandler {
                delay: Duration::from_millis(delay_ms),
                calls: calls.clone(),
            });
        }
        let mediator = mediator_with(builder.build(), config);

        let summary = mediator.publish(OrderPlaced { order_id: 3 }).await;

        assert_eq!(summary.succeeded, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawned_strategy_runs_on_worker_pool() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut builder = ServiceRegistry::builder();
    for _ in 0..16 {
        builder = builder.notification_handler::<OrderPlaced, _>(SlowCountingHandler {
            delay: Duration::from_millis(10),
            calls: calls.clone(),
        });
    }
    let config = MediatorConfig {
        notifications: NotificationConfig {
            strategy: FanOutStrategy::Spawned,
            max_concurrency: Some(4),
        },
    };
    let mediator = mediator_with(builder.build(), config);

    let summary = mediator.publish(OrderPlaced { order_id: 4 }).await;

    assert_eq!(summary.handlers, 16);
    assert_eq!(summary.succeeded, 16);
    assert_eq!(calls.load(Ordering::SeqCst), 16);
}

#[tokio::test]
async fn test_cancellation_is_handed_to_handlers_not_enforced() {
    let saw_cancel = Arc::new(AtomicUsize::new(0));
    let (counting, calls) = CountingHandler::new();
    let registry = ServiceRegistry::builder()
        .notification_handler::<OrderPlaced, _>(CancelObservingHandler {
            saw_cancel: saw_cancel.clone(),
        })
        .notification_handler::<OrderPlaced, _>(counting)
        .build();
    let mediator = mediator(registry);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = mediator
        .publish_with_cancel(OrderPlaced { order_id: 5 }, cancel)
        .await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(saw_cancel.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_publish_erased_notification() {
    let (counting, calls) = CountingHandler::new();
    let registry = ServiceRegistry::builder()
        .notification_handler::<OrderPlaced, _>(counting)
        .build();
    let mediator = mediator(registry);

    let notifications: Vec<Arc<dyn AnyNotification>> = vec![
        Arc::new(OrderPlaced { order_id: 10 }),
        Arc::new(NobodyListens),
        Arc::new(OrderPlaced { order_id: 11 }),
    ];
    for notification in notifications {
        mediator
            .publish_erased(notification, CancellationToken::new())
            .await;
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(mediator.adapter_cache().stats().notification_entries, 1);
}
