//! # scopeq-query: schema-validated queries with row-level tenant scoping
//!
//! The query core of the scopeq administrative API. Callers describe
//! reads and writes against named resources; the compiler validates
//! every field against a loaded resource catalogue, resolves relation
//! joins, and renders one parameterized statement per request with the
//! tenant scope injected as the final, non-overridable stage.
//!
//! This crate knows nothing about HTTP. Routing, token verification, and
//! response envelopes live in the service layer on top of it.

pub mod config;
pub mod error;
pub mod executor;
pub mod query;
pub mod resource;
pub mod security;
pub mod storage;

// Re-export core types
pub use config::*;
pub use error::*;
pub use executor::*;
pub use query::*;
pub use resource::*;
pub use security::*;
pub use storage::*;
