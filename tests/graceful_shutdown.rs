//! Graceful shutdown tests over a real listener.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::StatusCode;
use serde_json::json;
use tokio::sync::oneshot;

use greenlight::error::AppResult;
use greenlight::notifier::{Notification, Notifier};
use greenlight::{Application, LifecycleError, LifecycleState};

mod common;

/// Takes a while to deliver, and counts deliveries.
struct SlowNotifier {
    delivered: Arc<AtomicUsize>,
}

impl Notifier for SlowNotifier {
    fn send(&self, _notification: Notification) -> BoxFuture<'static, AppResult<()>> {
        let delivered = self.delivered.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    }
}

#[tokio::test]
async fn in_flight_request_completes_during_drain() {
    let server = common::spawn_app(common::test_config()).await;
    assert_eq!(server.handle.state(), LifecycleState::Running);

    let client = server.client.clone();
    let url = server.url("/test/slow");
    let request = tokio::spawn(async move { client.get(url).send().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let handle = server.handle.clone();
    let draining = tokio::spawn(async move { handle.shutdown(Duration::from_secs(5)).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.handle.state(), LifecycleState::Draining);
    assert!(!request.is_finished());

    let result = draining.await.unwrap();
    let res = request.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "done");

    assert!(result.is_ok());
    assert_eq!(server.handle.state(), LifecycleState::Stopped);

    let refused = server
        .client
        .get(server.url("/v1/healthcheck"))
        .timeout(Duration::from_secs(1))
        .send()
        .await;
    assert!(refused.is_err());
}

#[tokio::test]
async fn hanging_request_exceeds_the_deadline() {
    let server = common::spawn_app(common::test_config()).await;

    let client = server.client.clone();
    let url = server.url("/test/hang");
    let request = tokio::spawn(async move { client.get(url).send().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let started = tokio::time::Instant::now();
    let result = server.handle.shutdown(Duration::from_millis(300)).await;

    assert!(matches!(result, Err(LifecycleError::DeadlineExceeded(_))));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(server.handle.state(), LifecycleState::Stopped);

    request.abort();
}

#[tokio::test]
async fn drain_waits_for_background_tasks() {
    let delivered = Arc::new(AtomicUsize::new(0));
    let notifier = Arc::new(SlowNotifier {
        delivered: delivered.clone(),
    });
    let server = common::spawn_app_with_notifier(common::test_config(), notifier).await;

    let res = server
        .client
        .post(server.url("/v1/users"))
        .json(&json!({ "name": "Bob", "email": "bob@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert_eq!(delivered.load(Ordering::SeqCst), 0);

    server.handle.shutdown(Duration::from_secs(5)).await.unwrap();
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn run_until_signal_returns_after_drain() {
    let server = common::spawn_app(common::test_config()).await;
    let (tx, rx) = oneshot::channel::<()>();

    let handle = server.handle.clone();
    let running = tokio::spawn(async move {
        handle
            .run_until_signal(
                async move {
                    let _ = rx.await;
                },
                Duration::from_secs(5),
            )
            .await
    });

    let res = server
        .client
        .get(server.url("/v1/healthcheck"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    tx.send(()).unwrap();
    running.await.unwrap().unwrap();
    assert_eq!(server.handle.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn repeated_shutdown_is_harmless() {
    let server = common::spawn_app(common::test_config()).await;

    server.handle.shutdown(Duration::from_secs(5)).await.unwrap();
    server.handle.shutdown(Duration::from_secs(5)).await.unwrap();
    assert_eq!(server.handle.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn occupied_port_fails_to_bind() {
    let server = common::spawn_app(common::test_config()).await;

    let mut config = common::test_config();
    config.listener.bind_address = server.addr().to_string();
    let result = Application::new(config, greenlight::data::InMemoryStore::new())
        .start()
        .await;

    assert!(matches!(result, Err(LifecycleError::Bind { .. })));
    server.handle.shutdown(Duration::from_secs(5)).await.unwrap();
}
