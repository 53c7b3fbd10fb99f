//! Feature and capability management
//!
//! Administrative writes: declaring features, bundling them into
//! capabilities, and granting capabilities to a role within a team.
//! Everything goes through the guarded insert path, so payload columns
//! are checked against the catalogue and grants are stamped with the
//! caller's company rather than trusting the request body.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use scopeq_query::{CompilerLimits, InsertSpec, SecurityContext};

use crate::envelope::InsertResponse;
use crate::error::ServiceResult;
use crate::gateway::ResourceGateway;

/// A feature to declare
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewFeature {
    pub feature_name: String,
    pub feature_tag: String,
    #[serde(rename = "type")]
    pub feature_type: String,
}

impl NewFeature {
    fn payload(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("feature_name".to_string(), Value::from(self.feature_name.clone())),
            ("feature_tag".to_string(), Value::from(self.feature_tag.clone())),
            ("type".to_string(), Value::from(self.feature_type.clone())),
        ])
    }
}

/// A capability bundle: a capability id plus the feature switches it
/// carries, stored serialized
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewCapability {
    pub capability_id: i64,
    pub features: Value,
}

impl NewCapability {
    fn payload(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("capability_id".to_string(), Value::from(self.capability_id)),
            (
                "features_json".to_string(),
                Value::from(self.features.to_string()),
            ),
        ])
    }
}

/// A capability grant for a role, optionally narrowed to one team.
/// The company comes from the verified context, never from the grant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoleCapabilityGrant {
    pub role: String,
    #[serde(default)]
    pub team_id: Option<i64>,
    pub capability_id: i64,
}

impl RoleCapabilityGrant {
    fn payload(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("role".to_string(), Value::from(self.role.clone())),
            ("team_id".to_string(), Value::from(self.team_id)),
            ("capability_id".to_string(), Value::from(self.capability_id)),
        ])
    }
}

impl ResourceGateway {
    /// Declare a new feature
    pub async fn add_feature(
        &self,
        feature: &NewFeature,
        context: &SecurityContext,
    ) -> ServiceResult<InsertResponse> {
        self.admin_insert(InsertSpec::new("features", feature.payload()), context)
            .await
    }

    /// Declare a new capability bundle
    pub async fn add_capability(
        &self,
        capability: &NewCapability,
        context: &SecurityContext,
    ) -> ServiceResult<InsertResponse> {
        self.admin_insert(
            InsertSpec::new("feature_capability", capability.payload()),
            context,
        )
        .await
    }

    /// Grant a capability to a role. The grant row is tenant-scoped, so
    /// the caller must carry a company id.
    pub async fn add_role_capability(
        &self,
        grant: &RoleCapabilityGrant,
        context: &SecurityContext,
    ) -> ServiceResult<InsertResponse> {
        self.admin_insert(InsertSpec::new("role_capability", grant.payload()), context)
            .await
    }

    /// Management writes sit outside the version gate, like the
    /// catalogue reads.
    async fn admin_insert(
        &self,
        spec: InsertSpec,
        context: &SecurityContext,
    ) -> ServiceResult<InsertResponse> {
        let outcome = self
            .executor(CompilerLimits::default())
            .insert(&spec, context)
            .await?;
        let payload = Value::Object(spec.payload.into_iter().collect());
        Ok(InsertResponse::new(outcome.last_insert_id, payload))
    }
}
