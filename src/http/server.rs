//! HTTP server setup.
//!
//! # Responsibilities
//! - Own the shared state injected into handlers
//! - Register routes and their permission gates
//! - Wrap the router in the middleware chain
//! - Start the limiter sweep and hand the app to the lifecycle

use std::sync::Arc;
use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post, put};
use axum::Router;

use crate::auth::{AuthenticationContext, PermissionGate};
use crate::config::AppConfig;
use crate::data::Store;
use crate::http::handlers::{self, healthcheck, movies, users};
use crate::http::middleware::{require_permission, MiddlewareChain};
use crate::lifecycle::{BackgroundTaskRunner, LifecycleError, ServerHandle, ServerLifecycle, Shutdown};
use crate::notifier::{LogNotifier, Notifier};
use crate::observability::RequestMetrics;
use crate::security::ClientLimiterRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState<S> {
    pub store: S,
    pub background: BackgroundTaskRunner,
    pub notifier: Arc<dyn Notifier>,
    pub metrics: Arc<RequestMetrics>,
    pub environment: Arc<str>,
}

/// Routes, gates and handlers, before state and middleware are applied.
pub fn routes<S: Store>(store: &S, query_timeout: Duration) -> Router<AppState<S>> {
    let read = from_fn_with_state(
        Arc::new(PermissionGate::new("movies:read", store.clone(), query_timeout)),
        require_permission::<S>,
    );
    let write = from_fn_with_state(
        Arc::new(PermissionGate::new("movies:write", store.clone(), query_timeout)),
        require_permission::<S>,
    );

    Router::new()
        .route("/v1/healthcheck", get(healthcheck::healthcheck::<S>))
        .route("/v1/metrics", get(healthcheck::metrics_snapshot::<S>))
        .route(
            "/v1/movies",
            get(movies::list_movies::<S>)
                .route_layer(read.clone())
                .merge(post(movies::create_movie::<S>).route_layer(write.clone())),
        )
        .route(
            "/v1/movies/{id}",
            get(movies::show_movie::<S>)
                .route_layer(read)
                .merge(
                    patch(movies::update_movie::<S>)
                        .delete(movies::delete_movie::<S>)
                        .route_layer(write),
                ),
        )
        .route("/v1/users", post(users::register_user::<S>))
        .route("/v1/users/activated", put(users::activate_user::<S>))
}

/// The assembled server: state, limiter, chain and routes.
pub struct Application<S: Store> {
    config: AppConfig,
    state: AppState<S>,
    limiter: Arc<ClientLimiterRegistry>,
    shutdown: Shutdown,
    extra_routes: Router<AppState<S>>,
}

impl<S: Store> Application<S> {
    pub fn new(config: AppConfig, store: S) -> Self {
        let state = AppState {
            store,
            background: BackgroundTaskRunner::new(),
            notifier: Arc::new(LogNotifier),
            metrics: Arc::new(RequestMetrics::new()),
            environment: Arc::from(config.env.as_str()),
        };
        let limiter = Arc::new(ClientLimiterRegistry::new(&config.limiter));

        Self {
            config,
            state,
            limiter,
            shutdown: Shutdown::new(),
            extra_routes: Router::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.state.notifier = notifier;
        self
    }

    /// Register additional routes behind the same middleware chain.
    pub fn merge_routes(mut self, routes: Router<AppState<S>>) -> Self {
        self.extra_routes = self.extra_routes.merge(routes);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState<S> {
        &self.state
    }

    pub fn limiter(&self) -> Arc<ClientLimiterRegistry> {
        self.limiter.clone()
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn chain(&self) -> MiddlewareChain {
        let context = Arc::new(AuthenticationContext::new(
            self.state.store.clone(),
            self.config.persistence.query_timeout(),
        ));
        MiddlewareChain::new(
            self.state.metrics.clone(),
            self.limiter.clone(),
            self.config.cors.trusted_origins.clone(),
            context,
        )
    }

    /// The complete service: routes wrapped in the middleware chain.
    pub fn router(&self) -> Router {
        self.chain().wrap(self.stateful_routes())
    }

    fn stateful_routes(&self) -> Router {
        routes(&self.state.store, self.config.persistence.query_timeout())
            .merge(self.extra_routes.clone())
            .fallback(handlers::not_found)
            .with_state(self.state.clone())
    }

    /// Bind the listener, start the limiter sweep and begin serving.
    pub async fn start(self) -> Result<ServerHandle, LifecycleError> {
        let chain = self.chain();
        tracing::info!(
            stages = ?chain.stage_names(),
            env = %self.config.env,
            limiter_enabled = self.limiter.is_enabled(),
            "Middleware chain assembled"
        );
        let app = chain.wrap(self.stateful_routes());

        let _ = self.limiter.clone().spawn_sweeper(self.shutdown.subscribe());

        ServerLifecycle::new(self.shutdown.clone(), self.state.background.clone())
            .start(&self.config.listener.bind_address, app)
            .await
    }
}
