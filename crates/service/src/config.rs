//! Service configuration
//!
//! Which API versions exist, when they retire, and what each version
//! allows: pagination and sorting caps, filter value caps, the security
//! capabilities a version guarantees, and the resources it exposes.
//! Version features translate directly into compiler limits.

use std::env;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use scopeq_query::CompilerLimits;

use crate::error::{ServiceError, ServiceResult};

/// Pagination caps of one API version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationFeature {
    pub enabled: bool,
    pub max_limit: i64,
    pub default_limit: i64,
}

/// Filtering caps of one API version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteringFeature {
    pub enabled: bool,
    pub max_in_values: usize,
}

/// Sorting caps of one API version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortingFeature {
    pub enabled: bool,
    pub max_fields: usize,
}

/// Security capabilities a version guarantees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityFeature {
    pub row_level_security: bool,
    pub field_level_security: bool,
}

/// Everything one API version offers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionFeatures {
    pub pagination: PaginationFeature,
    pub filtering: FilteringFeature,
    pub sorting: SortingFeature,
    pub security: SecurityFeature,
    /// Resource names this version exposes
    pub resources: Vec<String>,
}

/// One published API version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersion {
    pub name: String,
    /// Date the version stops being served, if scheduled
    #[serde(default)]
    pub retired_on: Option<NaiveDate>,
    pub features: VersionFeatures,
}

impl ApiVersion {
    pub fn supports_resource(&self, resource: &str) -> bool {
        self.features.resources.iter().any(|r| r == resource)
    }

    /// Compiler limits derived from this version's feature caps
    pub fn compiler_limits(&self) -> CompilerLimits {
        CompilerLimits::new()
            .with_max_in_values(self.features.filtering.max_in_values)
            .with_max_order_fields(self.features.sorting.max_fields)
            .with_page_limits(
                self.features.pagination.max_limit,
                self.features.pagination.default_limit,
            )
    }
}

/// The published version set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionConfig {
    pub versions: Vec<ApiVersion>,
    pub default_version: String,
    /// Days before retirement during which requests get a warning
    #[serde(default = "default_warning_days")]
    pub retirement_warning_days: i64,
}

fn default_warning_days() -> i64 {
    180
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self::v1()
    }
}

impl VersionConfig {
    /// The stock v1 configuration
    pub fn v1() -> Self {
        Self {
            versions: vec![ApiVersion {
                name: "v1".to_string(),
                retired_on: None,
                features: VersionFeatures {
                    pagination: PaginationFeature {
                        enabled: true,
                        max_limit: 100,
                        default_limit: 20,
                    },
                    filtering: FilteringFeature {
                        enabled: true,
                        max_in_values: 200,
                    },
                    sorting: SortingFeature {
                        enabled: true,
                        max_fields: 3,
                    },
                    security: SecurityFeature {
                        row_level_security: true,
                        field_level_security: false,
                    },
                    resources: vec![
                        "users".to_string(),
                        "companies".to_string(),
                        "apps".to_string(),
                        "teams".to_string(),
                        "roles".to_string(),
                        "features".to_string(),
                        "feature_capability".to_string(),
                        "role_capability".to_string(),
                    ],
                },
            }],
            default_version: "v1".to_string(),
            retirement_warning_days: default_warning_days(),
        }
    }

    pub fn from_json_str(json: &str) -> ServiceResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ServiceError::configuration(format!("version config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if self.versions.is_empty() {
            return Err(ServiceError::configuration("no API versions declared"));
        }
        if !self.versions.iter().any(|v| v.name == self.default_version) {
            return Err(ServiceError::configuration(format!(
                "default version '{}' is not declared",
                self.default_version
            )));
        }
        for version in &self.versions {
            // Serving a version without row-level security would silently
            // disable tenant isolation; refuse to boot instead.
            if !version.features.security.row_level_security {
                return Err(ServiceError::configuration(format!(
                    "version '{}' disables row level security",
                    version.name
                )));
            }
        }
        Ok(())
    }

    /// Names of all published versions, in declaration order
    pub fn supported_names(&self) -> Vec<&str> {
        self.versions.iter().map(|v| v.name.as_str()).collect()
    }

    /// Resolve a requested version name. No name picks the default;
    /// retired versions are refused outright.
    pub fn resolve(&self, requested: Option<&str>) -> ServiceResult<&ApiVersion> {
        let name = requested.unwrap_or(&self.default_version);
        let version = self
            .versions
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| ServiceError::UnsupportedVersion {
                version: name.to_string(),
                supported: self.supported_names().join(", "),
            })?;

        if let Some(retired_on) = version.retired_on {
            if Utc::now().date_naive() >= retired_on {
                return Err(ServiceError::DeprecatedVersion {
                    version: version.name.clone(),
                    date: retired_on.to_string(),
                });
            }
        }

        Ok(version)
    }

    /// A warning line when `version` retires within the warning window
    pub fn retirement_warning(&self, version: &ApiVersion) -> Option<String> {
        let retired_on = version.retired_on?;
        let today = Utc::now().date_naive();
        let days_left = (retired_on - today).num_days();
        if days_left >= 0 && days_left <= self.retirement_warning_days {
            Some(format!(
                "API version {} retires on {} ({} days left)",
                version.name, retired_on, days_left
            ))
        } else {
            None
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Path to a JSON resource catalogue; None uses the built-in one
    pub catalogue_path: Option<String>,
    /// Answer queries for unregistered resources with an empty result
    /// set instead of an error
    pub missing_resource_as_empty: bool,
    pub versions: VersionConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            catalogue_path: None,
            missing_resource_as_empty: false,
            versions: VersionConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> ServiceResult<Self> {
        let catalogue_path = get_env_optional("SCOPEQ_CATALOGUE");
        let missing = get_env_or_default("SCOPEQ_MISSING_RESOURCE_AS_EMPTY", "false");
        let missing_resource_as_empty = match missing.as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                return Err(ServiceError::configuration(format!(
                    "SCOPEQ_MISSING_RESOURCE_AS_EMPTY must be true or false, got '{}'",
                    other
                )));
            }
        };

        let versions = match get_env_optional("SCOPEQ_VERSIONS") {
            Some(path) => {
                let json = std::fs::read_to_string(&path).map_err(|e| {
                    ServiceError::configuration(format!("cannot read {}: {}", path, e))
                })?;
                VersionConfig::from_json_str(&json)?
            }
            None => VersionConfig::default(),
        };

        Ok(Self {
            catalogue_path,
            missing_resource_as_empty,
            versions,
        })
    }

    pub fn with_versions(mut self, versions: VersionConfig) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_missing_resource_as_empty(mut self, enabled: bool) -> Self {
        self.missing_resource_as_empty = enabled;
        self
    }
}

fn get_env_optional(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
