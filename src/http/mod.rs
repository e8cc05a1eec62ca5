//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (lifecycle::server)
//!     → middleware/chain.rs (metrics → recover_panic → enable_cors → rate_limit → authenticate)
//!     → server.rs routes (per-route permission gates)
//!     → request.rs (JSON bodies, ids, preconditions)
//!     → handlers/ (business logic over the data traits)
//!     → response.rs (JSON envelopes)
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use server::{routes, AppState, Application};
