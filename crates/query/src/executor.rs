//! Query execution
//!
//! Ties the assembler to a storage backend. Compilation failures are
//! returned before storage is touched; a spec that cannot compile never
//! costs a round trip.

use std::sync::Arc;

use serde_json::Value;

use crate::error::QueryResult;
use crate::query::assembler::{InsertSpec, QueryAssembler, QuerySpec, UpdateSpec};
use crate::security::SecurityContext;
use crate::storage::{Storage, WriteOutcome};

/// Compiles and runs queries against one storage backend
#[derive(Clone)]
pub struct QueryExecutor {
    assembler: QueryAssembler,
    storage: Arc<dyn Storage>,
}

impl QueryExecutor {
    pub fn new(assembler: QueryAssembler, storage: Arc<dyn Storage>) -> Self {
        Self { assembler, storage }
    }

    pub fn assembler(&self) -> &QueryAssembler {
        &self.assembler
    }

    /// Compile and run a read, returning rows keyed by declared field names
    pub async fn query(
        &self,
        spec: &QuerySpec,
        context: &SecurityContext,
    ) -> QueryResult<Vec<Value>> {
        let compiled = self.assembler.compile_select(spec, context)?;
        self.storage.fetch(&compiled).await
    }

    /// Compile and run an insert
    pub async fn insert(
        &self,
        spec: &InsertSpec,
        context: &SecurityContext,
    ) -> QueryResult<WriteOutcome> {
        let compiled = self.assembler.compile_insert(spec, context)?;
        self.storage.execute(&compiled).await
    }

    /// Compile and run an update
    pub async fn update(
        &self,
        spec: &UpdateSpec,
        context: &SecurityContext,
    ) -> QueryResult<WriteOutcome> {
        let compiled = self.assembler.compile_update(spec, context)?;
        self.storage.execute(&compiled).await
    }
}
