//! Authentication and authorization subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization header
//!     → context.rs (parse Bearer token, look up owner, attach Principal)
//!     → gates.rs (authenticated ⊂ activated ⊂ permission)
//!     → handler (reads Principal through CurrentPrincipal)
//! ```
//!
//! # Design Decisions
//! - An absent header is the anonymous principal, not an error
//! - Unknown tokens are reported as invalid credentials, never as missing records
//! - The principal carrier is typed and checked; reading it never panics

pub mod context;
pub mod gates;
pub mod principal;

pub use context::{attach_principal, principal_of, AuthenticationContext, CurrentPrincipal};
pub use gates::{ensure_activated, ensure_authenticated, PermissionGate};
pub use principal::Principal;
