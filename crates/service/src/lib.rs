//! # scopeq-service: the versioned administrative facade
//!
//! Sits on top of [`scopeq_query`] and exposes the operations an HTTP
//! layer would mount: versioned query/insert/update with response
//! envelopes, the public catalogue listings, and feature/capability
//! management. Version configuration decides which resources and caps
//! each API version gets; the caps feed straight into the compiler
//! limits of the query core.
//!
//! Token verification and routing stay with the embedding application;
//! every operation here takes an already-verified
//! [`scopeq_query::SecurityContext`].

pub mod admin;
pub mod catalog;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gateway;

pub use admin::{NewCapability, NewFeature, RoleCapabilityGrant};
pub use config::{
    ApiVersion, FilteringFeature, PaginationFeature, SecurityFeature, ServiceConfig,
    SortingFeature, VersionConfig, VersionFeatures,
};
pub use envelope::{
    ErrorBody, ErrorDetail, InsertData, InsertResponse, QueryMeta, QueryResponse, UpdateData,
    UpdateResponse,
};
pub use error::{ServiceError, ServiceResult};
pub use gateway::{default_registry, ResourceGateway};
