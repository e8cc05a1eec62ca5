//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (server.rs):
//!     Bind listener → Running → serve through the middleware chain
//!
//! Shutdown (shutdown.rs, server.rs):
//!     Signal received → Stop accepting → Drain requests → Wait for background tasks → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Background (background.rs):
//!     Handler → run(task) → spawned, panic-isolated, counted until done
//! ```
//!
//! # Design Decisions
//! - Shutdown is a one-shot event shared by every long-running task
//! - A single deadline bounds both request drain and background tasks
//! - The listener closing after drain starts is success, not an error

pub mod background;
pub mod server;
pub mod shutdown;
pub mod signals;

pub use background::BackgroundTaskRunner;
pub use server::{LifecycleError, LifecycleState, ServerHandle, ServerLifecycle};
pub use shutdown::{Shutdown, ShutdownListener};
