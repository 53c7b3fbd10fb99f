//! Versioned resource gateway
//!
//! The transport-independent face of the service: callers name an API
//! version, a resource, and what they want done, and the gateway checks
//! the version gate, applies that version's feature caps, and drives the
//! query core. Routing, token parsing, and slug resolution stay outside;
//! the gateway only ever sees a verified [`SecurityContext`].

use std::sync::Arc;

use serde_json::Value;

use scopeq_query::{
    compile_page, CompilerLimits, InsertSpec, PageClause, QueryAssembler, QueryExecutor, QuerySpec,
    ResourceRegistry, SecurityContext, Storage, UpdateSpec,
};

use crate::config::{ApiVersion, ServiceConfig};
use crate::envelope::{InsertResponse, QueryResponse, UpdateResponse};
use crate::error::{ServiceError, ServiceResult};

/// Built-in resource catalogue for the admin schema
const ADMIN_CATALOGUE: &str = include_str!("../resources/admin.json");

/// Serves versioned query, insert, and update operations against a
/// resource catalogue
#[derive(Clone)]
pub struct ResourceGateway {
    registry: Arc<ResourceRegistry>,
    storage: Arc<dyn Storage>,
    config: ServiceConfig,
}

impl ResourceGateway {
    /// Gateway over the built-in admin catalogue with default settings
    pub fn new(storage: Arc<dyn Storage>) -> ServiceResult<Self> {
        Self::with_config(storage, ServiceConfig::default())
    }

    /// Gateway with explicit settings. The catalogue comes from
    /// `catalogue_path` when set, otherwise the built-in one is used.
    pub fn with_config(storage: Arc<dyn Storage>, config: ServiceConfig) -> ServiceResult<Self> {
        let registry = match &config.catalogue_path {
            Some(path) => ResourceRegistry::from_path(path)?,
            None => default_registry()?,
        };
        Self::from_parts(Arc::new(registry), storage, config)
    }

    /// Gateway over an already-loaded registry
    pub fn from_parts(
        registry: Arc<ResourceRegistry>,
        storage: Arc<dyn Storage>,
        config: ServiceConfig,
    ) -> ServiceResult<Self> {
        config.versions.validate()?;
        Ok(Self {
            registry,
            storage,
            config,
        })
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run a versioned read and wrap the rows in the list envelope.
    /// `version` of None selects the configured default version.
    pub async fn query(
        &self,
        version: Option<&str>,
        spec: &QuerySpec,
        context: &SecurityContext,
    ) -> ServiceResult<QueryResponse> {
        let version = self.gate(version, &spec.resource)?;

        if !version.features.filtering.enabled
            && spec.filters.as_ref().map_or(false, |f| !f.is_empty())
        {
            return Err(self.feature_disabled("filtering", version));
        }
        if !version.features.sorting.enabled && spec.order_by.is_some() {
            return Err(self.feature_disabled("sorting", version));
        }
        if !version.features.pagination.enabled && spec.pagination.is_some() {
            return Err(self.feature_disabled("pagination", version));
        }

        if !self.registry.contains(&spec.resource) && self.config.missing_resource_as_empty {
            tracing::warn!(
                "resource '{}' is not in the catalogue, answering with an empty result set",
                spec.resource
            );
            return Ok(QueryResponse::new(Vec::new()));
        }

        let limits = version.compiler_limits();
        let rows = self.executor(limits).query(spec, context).await?;

        let cursor = match &spec.pagination {
            Some(page) => next_cursor(compile_page(Some(page), &limits)?, rows.len()),
            None => None,
        };
        Ok(QueryResponse::new(rows).with_next_cursor(cursor))
    }

    /// Run a versioned insert. The response echoes the caller's payload;
    /// the stamped tenant column is not reflected back.
    pub async fn insert(
        &self,
        version: Option<&str>,
        spec: &InsertSpec,
        context: &SecurityContext,
    ) -> ServiceResult<InsertResponse> {
        let version = self.gate(version, &spec.resource)?;
        let outcome = self
            .executor(version.compiler_limits())
            .insert(spec, context)
            .await?;
        let payload = Value::Object(spec.payload.clone().into_iter().collect());
        Ok(InsertResponse::new(outcome.last_insert_id, payload))
    }

    /// Run a versioned update
    pub async fn update(
        &self,
        version: Option<&str>,
        spec: &UpdateSpec,
        context: &SecurityContext,
    ) -> ServiceResult<UpdateResponse> {
        let version = self.gate(version, &spec.resource)?;
        let outcome = self
            .executor(version.compiler_limits())
            .update(spec, context)
            .await?;
        Ok(UpdateResponse::new(outcome.rows_affected))
    }

    /// Resolve the version and check it exposes `resource`. Logs the
    /// retirement warning when the version is inside its warning window.
    fn gate(&self, version: Option<&str>, resource: &str) -> ServiceResult<&ApiVersion> {
        let version = self.config.versions.resolve(version)?;
        if let Some(warning) = self.config.versions.retirement_warning(version) {
            tracing::warn!("{}", warning);
        }
        if !version.supports_resource(resource) {
            return Err(ServiceError::ResourceNotAvailable {
                resource: resource.to_string(),
                version: version.name.clone(),
            });
        }
        Ok(version)
    }

    fn feature_disabled(&self, feature: &str, version: &ApiVersion) -> ServiceError {
        ServiceError::FeatureDisabled {
            feature: feature.to_string(),
            version: version.name.clone(),
        }
    }

    /// A fresh executor carrying the given limit set. Cheap: both the
    /// registry and the storage handle are shared.
    pub(crate) fn executor(&self, limits: CompilerLimits) -> QueryExecutor {
        let assembler = QueryAssembler::new(self.registry.clone()).with_limits(limits);
        QueryExecutor::new(assembler, self.storage.clone())
    }
}

/// Offset of the next page: present only when the page came back full,
/// which is the only case where more rows may exist
fn next_cursor(page: PageClause, returned: usize) -> Option<i64> {
    let limit = page.effective_limit()?;
    if limit > 0 && returned as i64 == limit {
        Some(page.offset.unwrap_or(0) + limit)
    } else {
        None
    }
}

/// Parse the built-in admin catalogue
pub fn default_registry() -> ServiceResult<ResourceRegistry> {
    Ok(ResourceRegistry::from_json_str(ADMIN_CATALOGUE)?)
}
