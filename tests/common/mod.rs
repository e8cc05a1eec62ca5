//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;

use greenlight::data::{
    InMemoryStore, PermissionRepository, TokenRepository, TokenScope, User, UserData,
    UserRepository,
};
use greenlight::http::AppState;
use greenlight::notifier::{LogNotifier, Notifier};
use greenlight::{AppConfig, Application, ServerHandle};

pub struct TestServer {
    pub handle: ServerHandle,
    pub store: InMemoryStore,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn addr(&self) -> SocketAddr {
        self.handle.local_addr()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr(), path)
    }
}

/// Ephemeral port, generous limiter, short deadlines.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.env = "testing".to_string();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.limiter.rps = 100.0;
    config.limiter.burst = 1_000;
    config.shutdown.deadline_secs = 5;
    config
}

async fn explode() -> &'static str {
    panic!("handler exploded")
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_millis(300)).await;
    "done"
}

async fn hang() -> &'static str {
    std::future::pending().await
}

/// Routes that misbehave on purpose, mounted behind the full chain.
fn test_routes() -> Router<AppState<InMemoryStore>> {
    Router::new()
        .route("/test/panic", get(explode))
        .route("/test/slow", get(slow))
        .route("/test/hang", get(hang))
}

pub async fn spawn_app(config: AppConfig) -> TestServer {
    spawn_app_with_notifier(config, Arc::new(LogNotifier)).await
}

pub async fn spawn_app_with_notifier(config: AppConfig, notifier: Arc<dyn Notifier>) -> TestServer {
    let store = InMemoryStore::new();
    let handle = Application::new(config, store.clone())
        .with_notifier(notifier)
        .merge_routes(test_routes())
        .start()
        .await
        .expect("server should start");

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();

    TestServer {
        handle,
        store,
        client,
    }
}

/// A 26 character plaintext unique to `seed`.
pub fn plaintext_token(seed: i64) -> String {
    format!("{seed:A>26}")
}

/// Insert a user with an authentication token and the given permissions.
pub async fn seed_user(
    store: &InMemoryStore,
    email: &str,
    activated: bool,
    permissions: &[&str],
) -> (User, String) {
    let user = store
        .insert_user(UserData {
            name: "Test User".to_string(),
            email: email.to_string(),
            activated,
        })
        .await
        .unwrap();

    let token = plaintext_token(user.id);
    store
        .insert_token(
            &token,
            user.id,
            Duration::from_secs(24 * 60 * 60),
            TokenScope::Authentication,
        )
        .await
        .unwrap();

    if !permissions.is_empty() {
        store.add_for_user(user.id, permissions).await.unwrap();
    }

    (user, token)
}
