//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! handlers / gates
//!     → repository.rs (narrow async traits)
//!     → memory.rs (InMemoryStore, dashmap tables)
//!     → versioned.rs (conditioned writes, version stamps)
//! ```
//!
//! # Design Decisions
//! - Callers depend on traits, never on the backing store
//! - No lock spans a read and the following write; the write itself is conditioned
//! - Only token hashes are stored

pub mod memory;
pub mod models;
pub mod repository;
pub mod validator;
pub mod versioned;

pub use memory::InMemoryStore;
pub use models::{
    Metadata, Movie, MovieData, MovieFilter, Permissions, Runtime, Token, TokenScope, User, UserData,
};
pub use repository::{MovieRepository, PermissionRepository, Store, TokenRepository, UserRepository};
pub use validator::Validator;
pub use versioned::{Versioned, VersionedTable};
