//! Query compilation pipeline
//!
//! Everything between a request specification and a parameterized
//! statement: filter compilation, join resolution, projection assembly,
//! ordering, pagination, and rendering. Security injection sits in
//! [`crate::security`] and is driven by the assembler as the last stage
//! before rendering.

pub mod assembler;
pub mod filter;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod select;
pub mod sql;
pub mod types;

pub use assembler::{InsertSpec, QueryAssembler, QuerySpec, UpdateSpec};
pub use filter::compile_filters;
pub use joins::resolve_joins;
pub use ordering::{compile_order, OrderClause};
pub use pagination::{compile_page, PageClause};
pub use select::{build_select, SelectSkeleton};
pub use types::{
    CompiledQuery, Condition, FilterOperator, FilterSpec, JoinClause, OrderDirection, OrderSpec,
    PageSpec, Predicate, PredicateTree,
};
