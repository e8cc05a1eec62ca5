//! The ordered middleware chain wrapped around the router.
//!
//! ```text
//! metrics → recover_panic → enable_cors → rate_limit → authenticate → router
//! ```

use std::sync::Arc;

use axum::middleware;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthenticationContext;
use crate::data::UserRepository;
use crate::http::middleware::{authenticate, cors, metrics, rate_limit, recover};
use crate::observability::RequestMetrics;
use crate::security::ClientLimiterRegistry;

/// A named unit that wraps a router in one layer.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    fn wrap(&self, router: Router) -> Router;
}

pub struct MetricsStage {
    counters: Arc<RequestMetrics>,
}

impl Stage for MetricsStage {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn wrap(&self, router: Router) -> Router {
        router
            .layer(middleware::from_fn_with_state(
                self.counters.clone(),
                metrics::track_metrics,
            ))
            .layer(TraceLayer::new_for_http())
    }
}

pub struct RecoverPanicStage;

impl Stage for RecoverPanicStage {
    fn name(&self) -> &'static str {
        "recover_panic"
    }

    fn wrap(&self, router: Router) -> Router {
        router.layer(recover::recover_panic_layer())
    }
}

pub struct CorsStage {
    trusted_origins: Vec<String>,
}

impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "enable_cors"
    }

    fn wrap(&self, router: Router) -> Router {
        router.layer(cors::cors_layer(&self.trusted_origins))
    }
}

pub struct RateLimitStage {
    limiter: Arc<ClientLimiterRegistry>,
}

impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn wrap(&self, router: Router) -> Router {
        router.layer(middleware::from_fn_with_state(
            self.limiter.clone(),
            rate_limit::rate_limit,
        ))
    }
}

pub struct AuthenticateStage<S> {
    context: Arc<AuthenticationContext<S>>,
}

impl<S> Stage for AuthenticateStage<S>
where
    S: UserRepository + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn wrap(&self, router: Router) -> Router {
        router.layer(middleware::from_fn_with_state(
            self.context.clone(),
            authenticate::authenticate::<S>,
        ))
    }
}

/// Stages in request order, outermost first.
pub struct MiddlewareChain {
    stages: Vec<Box<dyn Stage>>,
}

impl MiddlewareChain {
    pub fn new<S>(
        counters: Arc<RequestMetrics>,
        limiter: Arc<ClientLimiterRegistry>,
        trusted_origins: Vec<String>,
        context: Arc<AuthenticationContext<S>>,
    ) -> Self
    where
        S: UserRepository + Send + Sync + 'static,
    {
        Self {
            stages: vec![
                Box::new(MetricsStage { counters }),
                Box::new(RecoverPanicStage),
                Box::new(CorsStage { trusted_origins }),
                Box::new(RateLimitStage { limiter }),
                Box::new(AuthenticateStage { context }),
            ],
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Wrap `router` so the first stage sees requests first.
    pub fn wrap(&self, router: Router) -> Router {
        self.stages
            .iter()
            .rev()
            .fold(router, |router, stage| stage.wrap(router))
    }
}
