//! Public catalogue listings
//!
//! Fixed-resource reads serving the signup and admin screens: companies,
//! the apps of one company, teams, roles, features, and capability
//! bundles. These sit outside the version gate and run anonymously; every
//! resource they touch is public-classified, so no tenant scope applies.

use serde_json::Value;

use scopeq_query::{CompilerLimits, FilterSpec, OrderSpec, QuerySpec, SecurityContext};

use crate::error::{ServiceError, ServiceResult};
use crate::gateway::ResourceGateway;

impl ResourceGateway {
    /// All companies, name order
    pub async fn companies(&self) -> ServiceResult<Vec<Value>> {
        self.catalogue_list(
            QuerySpec::new("companies").with_order(OrderSpec::new().field("name", "asc")),
        )
        .await
    }

    /// The apps of the company with `company_slug`, name order
    pub async fn company_apps(&self, company_slug: &str) -> ServiceResult<Vec<Value>> {
        let companies = self
            .catalogue_list(QuerySpec::new("companies").with_filters(FilterSpec::from([(
                "slug.eq".to_string(),
                Value::from(company_slug),
            )])))
            .await?;
        let company_id = companies
            .first()
            .ok_or_else(|| ServiceError::not_found("Company"))?
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ServiceError::configuration("companies rows carry no integer id"))?;

        self.catalogue_list(
            QuerySpec::new("apps")
                .with_filters(FilterSpec::from([(
                    "company_id.eq".to_string(),
                    Value::from(company_id),
                )]))
                .with_order(OrderSpec::new().field("name", "asc")),
        )
        .await
    }

    /// All teams, name order
    pub async fn teams(&self) -> ServiceResult<Vec<Value>> {
        self.catalogue_list(
            QuerySpec::new("teams").with_order(OrderSpec::new().field("name", "asc")),
        )
        .await
    }

    /// All roles, name order
    pub async fn roles(&self) -> ServiceResult<Vec<Value>> {
        self.catalogue_list(
            QuerySpec::new("roles").with_order(OrderSpec::new().field("name", "asc")),
        )
        .await
    }

    /// All features, feature name order
    pub async fn features(&self) -> ServiceResult<Vec<Value>> {
        self.catalogue_list(
            QuerySpec::new("features").with_order(OrderSpec::new().field("feature_name", "asc")),
        )
        .await
    }

    /// All capability bundles, capability id order
    pub async fn capabilities(&self) -> ServiceResult<Vec<Value>> {
        self.catalogue_list(
            QuerySpec::new("feature_capability")
                .with_order(OrderSpec::new().field("capability_id", "asc")),
        )
        .await
    }

    /// Run one catalogue read with default limits. Honors the
    /// missing-resource switch the same way versioned list queries do.
    async fn catalogue_list(&self, spec: QuerySpec) -> ServiceResult<Vec<Value>> {
        if !self.registry().contains(&spec.resource) && self.config().missing_resource_as_empty {
            tracing::warn!(
                "resource '{}' is not in the catalogue, answering with an empty result set",
                spec.resource
            );
            return Ok(Vec::new());
        }
        let rows = self
            .executor(CompilerLimits::default())
            .query(&spec, &SecurityContext::anonymous())
            .await?;
        Ok(rows)
    }
}
