//! Listener ownership and the serve/drain state machine.
//!
//! # State Machine
//! ```text
//! Starting ──start()──▶ Running ──shutdown()──▶ Draining ──drained──▶ Stopped
//!     └──────────────────────┴───────────────────────┴──transport error──▶ Failed
//! ```
//!
//! The listener closing after drain starts is the expected way for serving to end
//! and is reported as success. Any other end of serving is a transport failure.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use crate::lifecycle::background::BackgroundTaskRunner;
use crate::lifecycle::shutdown::Shutdown;

/// Lifecycle state of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Starting = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
    Failed = 4,
}

impl From<u8> for LifecycleState {
    fn from(value: u8) -> Self {
        match value {
            0 => LifecycleState::Starting,
            1 => LifecycleState::Running,
            2 => LifecycleState::Draining,
            3 => LifecycleState::Stopped,
            _ => LifecycleState::Failed,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server transport failed: {0}")]
    Transport(#[source] Arc<io::Error>),

    #[error("shutdown did not complete within {0:?}")]
    DeadlineExceeded(Duration),
}

/// How the serve loop ended.
#[derive(Debug, Clone)]
enum ServeOutcome {
    Pending,
    Closed,
    Failed(Arc<io::Error>),
}

#[derive(Debug, Clone, Default)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn get(&self) -> LifecycleState {
        LifecycleState::from(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves to `to` only when currently in `from`.
    fn advance(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Owns the listener and coordinates graceful shutdown.
pub struct ServerLifecycle {
    state: SharedState,
    shutdown: Shutdown,
    background: BackgroundTaskRunner,
}

impl ServerLifecycle {
    pub fn new(shutdown: Shutdown, background: BackgroundTaskRunner) -> Self {
        Self {
            state: SharedState::default(),
            shutdown,
            background,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Bind `bind_address` and serve `app` on a spawned task.
    pub async fn start(self, bind_address: &str, app: Router) -> Result<ServerHandle, LifecycleError> {
        let listener = match TcpListener::bind(bind_address).await {
            Ok(listener) => listener,
            Err(source) => {
                self.state.set(LifecycleState::Failed);
                return Err(LifecycleError::Bind {
                    address: bind_address.to_string(),
                    source,
                });
            }
        };
        let local_addr = listener.local_addr().map_err(|source| {
            self.state.set(LifecycleState::Failed);
            LifecycleError::Bind {
                address: bind_address.to_string(),
                source,
            }
        })?;

        let (outcome_tx, outcome_rx) = watch::channel(ServeOutcome::Pending);
        let mut drain = self.shutdown.subscribe();
        let service = app.into_make_service_with_connect_info::<SocketAddr>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, service)
                .with_graceful_shutdown(async move { drain.recv().await })
                .await;

            let outcome = match result {
                Ok(()) => ServeOutcome::Closed,
                Err(e) => ServeOutcome::Failed(Arc::new(e)),
            };
            outcome_tx.send_replace(outcome);
        });

        self.state.set(LifecycleState::Running);
        tracing::info!(address = %local_addr, "HTTP server listening");

        Ok(ServerHandle {
            inner: Arc::new(HandleInner {
                local_addr,
                state: self.state,
                shutdown: self.shutdown,
                background: self.background,
                outcome: outcome_rx,
                task,
            }),
        })
    }
}

struct HandleInner {
    local_addr: SocketAddr,
    state: SharedState,
    shutdown: Shutdown,
    background: BackgroundTaskRunner,
    outcome: watch::Receiver<ServeOutcome>,
    task: JoinHandle<()>,
}

/// Handle to a running server.
#[derive(Clone)]
pub struct ServerHandle {
    inner: Arc<HandleInner>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.get()
    }

    /// Stop accepting, then wait up to `deadline` for in-flight requests and
    /// background tasks.
    ///
    /// Safe to call more than once; later calls wait on the same drain.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), LifecycleError> {
        let deadline_at = Instant::now() + deadline;
        let inner = &self.inner;

        if inner.shutdown.trigger() {
            tracing::info!(deadline = ?deadline, "Shutting down, draining in-flight requests");
        }
        inner
            .state
            .advance(LifecycleState::Running, LifecycleState::Draining);

        let mut outcome = inner.outcome.clone();
        let drained = timeout_at(
            deadline_at,
            outcome.wait_for(|o| !matches!(o, ServeOutcome::Pending)),
        )
        .await
        .map(|result| result.map(|outcome| outcome.clone()));

        let outcome = match drained {
            Err(_) => return Err(self.expire(deadline)),
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => ServeOutcome::Failed(Arc::new(io::Error::other(
                "serve task ended without reporting an outcome",
            ))),
        };

        if let ServeOutcome::Failed(e) = outcome {
            inner.state.set(LifecycleState::Failed);
            tracing::error!(error = %e, "HTTP server failed while draining");
            return Err(LifecycleError::Transport(e));
        }

        let pending = inner.background.in_flight();
        if pending > 0 {
            tracing::info!(tasks = pending, "Waiting for background tasks");
        }
        if timeout_at(deadline_at, inner.background.wait_idle())
            .await
            .is_err()
        {
            return Err(self.expire(deadline));
        }

        if inner.state.get() != LifecycleState::Failed {
            inner.state.set(LifecycleState::Stopped);
        }
        tracing::info!("Server stopped");
        Ok(())
    }

    fn expire(&self, deadline: Duration) -> LifecycleError {
        self.inner.task.abort();
        self.inner.state.set(LifecycleState::Stopped);
        tracing::warn!(deadline = ?deadline, "Shutdown deadline exceeded, abandoning in-flight work");
        LifecycleError::DeadlineExceeded(deadline)
    }

    /// Serve until `signal` resolves (or shutdown is triggered elsewhere), then
    /// drain within `deadline`.
    ///
    /// Returns only after the drain finished or the deadline expired.
    pub async fn run_until_signal<F>(self, signal: F, deadline: Duration) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let handle = self.clone();
        let mut triggered = self.inner.shutdown.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                _ = signal => {}
                _ = triggered.recv() => {}
            }
            let _ = done_tx.send(handle.shutdown(deadline).await);
        });

        let mut outcome = self.inner.outcome.clone();
        let serving = outcome
            .wait_for(|o| !matches!(o, ServeOutcome::Pending))
            .await
            .map(|outcome| outcome.clone());

        if let Ok(ServeOutcome::Failed(e)) = serving {
            self.inner.state.set(LifecycleState::Failed);
            tracing::error!(error = %e, "HTTP server failed");
            return Err(LifecycleError::Transport(e));
        }

        // The listener closed because drain started; wait for drain to finish.
        done_rx.await.unwrap_or_else(|_| {
            Err(LifecycleError::Transport(Arc::new(io::Error::other(
                "shutdown task ended unexpectedly",
            ))))
        })
    }
}
