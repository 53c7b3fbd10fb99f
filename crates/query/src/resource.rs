//! Resource catalogue
//!
//! A resource definition describes one queryable entity: the physical
//! table, its alias, the declared output fields with their source
//! expressions, and the named relations that may be joined in. The
//! registry loads definitions once, validates every identifier up front,
//! and is then shared read-only for the life of the process. Nothing a
//! definition does not declare can ever appear in a statement.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::security::{validate_expression, validate_identifier};

/// Column injected for tenant-scoped resources
pub const TENANT_COLUMN: &str = "company_id";
/// Column used for team narrowing when the resource declares it
pub const TEAM_COLUMN: &str = "team_id";

/// Declared type of an output field. Drives the default operator chosen
/// for filters that name the field without an explicit operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Uuid,
    Json,
}

impl FieldType {
    pub fn is_textual(self) -> bool {
        matches!(self, FieldType::Text)
    }
}

/// One declared output field: the name callers use and the source
/// expression that produces it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub expr: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new<N: Into<String>, E: Into<String>>(name: N, expr: E) -> Self {
        Self {
            name: name.into(),
            expr: expr.into(),
            field_type: FieldType::Text,
        }
    }

    pub fn typed<N: Into<String>, E: Into<String>>(name: N, expr: E, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            expr: expr.into(),
            field_type,
        }
    }
}

/// A named relation that can be joined into a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    pub name: String,
    pub table: String,
    pub alias: String,
    /// Join condition, e.g. `u.company_id = c.id`
    pub on: String,
    pub fields: Vec<FieldDef>,
}

/// Visibility class of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceAccess {
    /// Rows are scoped to a company; queries require a tenant context
    #[default]
    Tenant,
    /// Rows are readable without tenant scoping (catalogue tables)
    Public,
}

/// Where a field is declared within its resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOwner {
    Base,
    /// Index into the resource's relation list
    Relation(usize),
}

/// Full definition of one queryable resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Resource name; filled from the catalogue key when loading JSON
    #[serde(default)]
    pub name: String,
    pub table: String,
    pub alias: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub access: ResourceAccess,
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

impl ResourceDefinition {
    pub fn new<N: Into<String>, T: Into<String>, A: Into<String>>(
        name: N,
        table: T,
        alias: A,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            alias: alias.into(),
            primary_key: default_primary_key(),
            access: ResourceAccess::Tenant,
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn with_access(mut self, access: ResourceAccess) -> Self {
        self.access = access;
        self
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Look up who declares `field`, searching base fields first and then
    /// relations in declaration order.
    pub fn field_owner(&self, field: &str) -> Option<FieldOwner> {
        if self.fields.iter().any(|f| f.name == field) {
            return Some(FieldOwner::Base);
        }
        for (index, relation) in self.relations.iter().enumerate() {
            if relation.fields.iter().any(|f| f.name == field) {
                return Some(FieldOwner::Relation(index));
            }
        }
        None
    }

    /// Look up the declaration of `field` anywhere in the resource
    pub fn field_def(&self, field: &str) -> Option<&FieldDef> {
        match self.field_owner(field)? {
            FieldOwner::Base => self.fields.iter().find(|f| f.name == field),
            FieldOwner::Relation(index) => {
                self.relations[index].fields.iter().find(|f| f.name == field)
            }
        }
    }

    /// Look up `field` among the base fields only
    pub fn base_field(&self, field: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == field)
    }

    /// Resolve `field` to a plain base-table column, the only shape the
    /// write path accepts. The expression must be exactly `<alias>.<column>`.
    pub fn writable_column(&self, field: &str) -> Option<&str> {
        let def = self.base_field(field)?;
        let column = def
            .expr
            .strip_prefix(self.alias.as_str())?
            .strip_prefix('.')?;
        if validate_identifier(column).is_ok() {
            Some(column)
        } else {
            None
        }
    }

    /// Whether any base field maps straight onto `column` of the base table
    pub fn declares_base_column(&self, column: &str) -> bool {
        self.fields.iter().any(|f| {
            f.expr
                .strip_prefix(self.alias.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .map(|c| c == column)
                .unwrap_or(false)
        })
    }

    /// The qualified tenant column of this resource
    pub fn tenant_column_expr(&self) -> String {
        format!("{}.{}", self.alias, TENANT_COLUMN)
    }

    /// The qualified team column of this resource
    pub fn team_column_expr(&self) -> String {
        format!("{}.{}", self.alias, TEAM_COLUMN)
    }

    fn validate(&self) -> QueryResult<()> {
        let fail = |reason: String| QueryError::invalid_definition(&self.name, reason);

        validate_identifier(&self.name)
            .map_err(|e| fail(format!("resource name is not a valid identifier: {}", e)))?;
        validate_identifier(&self.table)
            .map_err(|e| fail(format!("table is not a valid identifier: {}", e)))?;
        validate_identifier(&self.alias)
            .map_err(|e| fail(format!("alias is not a valid identifier: {}", e)))?;
        validate_identifier(&self.primary_key)
            .map_err(|e| fail(format!("primary key is not a valid identifier: {}", e)))?;

        if self.fields.is_empty() {
            return Err(fail("resource declares no fields".to_string()));
        }

        let mut output_names: HashSet<&str> = HashSet::new();
        let mut aliases: HashSet<&str> = HashSet::new();
        aliases.insert(self.alias.as_str());

        for field in &self.fields {
            validate_identifier(&field.name)
                .map_err(|e| fail(format!("field name is not a valid identifier: {}", e)))?;
            validate_expression(&field.expr)
                .map_err(|e| fail(format!("field '{}': {}", field.name, e)))?;
            if !output_names.insert(field.name.as_str()) {
                return Err(fail(format!("duplicate field name '{}'", field.name)));
            }
        }

        let mut relation_names: HashSet<&str> = HashSet::new();
        for relation in &self.relations {
            validate_identifier(&relation.name)
                .map_err(|e| fail(format!("relation name is not a valid identifier: {}", e)))?;
            validate_identifier(&relation.table).map_err(|e| {
                fail(format!(
                    "relation '{}' table is not a valid identifier: {}",
                    relation.name, e
                ))
            })?;
            validate_identifier(&relation.alias).map_err(|e| {
                fail(format!(
                    "relation '{}' alias is not a valid identifier: {}",
                    relation.name, e
                ))
            })?;
            validate_expression(&relation.on)
                .map_err(|e| fail(format!("relation '{}' join condition: {}", relation.name, e)))?;
            if !relation_names.insert(relation.name.as_str()) {
                return Err(fail(format!("duplicate relation name '{}'", relation.name)));
            }
            if !aliases.insert(relation.alias.as_str()) {
                return Err(fail(format!(
                    "relation '{}' reuses alias '{}'",
                    relation.name, relation.alias
                )));
            }
            if relation.fields.is_empty() {
                return Err(fail(format!(
                    "relation '{}' declares no fields",
                    relation.name
                )));
            }
            for field in &relation.fields {
                validate_identifier(&field.name)
                    .map_err(|e| fail(format!("field name is not a valid identifier: {}", e)))?;
                validate_expression(&field.expr)
                    .map_err(|e| fail(format!("field '{}': {}", field.name, e)))?;
                if !output_names.insert(field.name.as_str()) {
                    return Err(fail(format!(
                        "field '{}' of relation '{}' collides with another field",
                        field.name, relation.name
                    )));
                }
            }
        }

        // Tenant scoping cannot work against a table that lacks the column.
        if self.access == ResourceAccess::Tenant && !self.declares_base_column(TENANT_COLUMN) {
            return Err(fail(format!(
                "tenant-scoped resource must declare a base '{}' column",
                TENANT_COLUMN
            )));
        }

        Ok(())
    }
}

/// Validated, immutable collection of resource definitions
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: HashMap<String, ResourceDefinition>,
}

static SHARED_REGISTRY: OnceCell<Arc<ResourceRegistry>> = OnceCell::new();

impl ResourceRegistry {
    /// Build a registry from already-constructed definitions
    pub fn from_definitions(definitions: Vec<ResourceDefinition>) -> QueryResult<Self> {
        let mut resources = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            definition.validate()?;
            if resources
                .insert(definition.name.clone(), definition)
                .is_some()
            {
                return Err(QueryError::invalid_definition(
                    "catalogue",
                    "duplicate resource name",
                ));
            }
        }
        let registry = Self { resources };
        tracing::info!(
            "resource catalogue loaded with {} resources",
            registry.resources.len()
        );
        Ok(registry)
    }

    /// Parse a JSON catalogue: an object keyed by resource name
    pub fn from_json_str(json: &str) -> QueryResult<Self> {
        let raw: HashMap<String, ResourceDefinition> = serde_json::from_str(json)
            .map_err(|e| QueryError::invalid_definition("catalogue", e.to_string()))?;
        let definitions = raw
            .into_iter()
            .map(|(name, mut definition)| {
                definition.name = name;
                definition
            })
            .collect();
        Self::from_definitions(definitions)
    }

    /// Load a JSON catalogue from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> QueryResult<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            QueryError::invalid_definition(
                "catalogue",
                format!("cannot read {}: {}", path.as_ref().display(), e),
            )
        })?;
        Self::from_json_str(&json)
    }

    /// Look up a resource, failing with UnknownResource
    pub fn get(&self, name: &str) -> QueryResult<&ResourceDefinition> {
        self.resources
            .get(name)
            .ok_or_else(|| QueryError::unknown_resource(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Declared resource names, sorted for stable output
    pub fn resource_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Install this registry as the process-wide shared one. Succeeds at
    /// most once per process; later calls fail instead of replacing it.
    pub fn install_shared(self) -> QueryResult<Arc<ResourceRegistry>> {
        let registry = Arc::new(self);
        SHARED_REGISTRY.set(registry.clone()).map_err(|_| {
            QueryError::invalid_definition("catalogue", "shared registry already installed")
        })?;
        Ok(registry)
    }

    /// The process-wide shared registry, if one was installed
    pub fn shared() -> Option<Arc<ResourceRegistry>> {
        SHARED_REGISTRY.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_definition() -> ResourceDefinition {
        ResourceDefinition::new("users", "users", "u")
            .with_field(FieldDef::typed("id", "u.id", FieldType::Integer))
            .with_field(FieldDef::new("email", "u.email"))
            .with_field(FieldDef::typed("company_id", "u.company_id", FieldType::Integer))
            .with_relation(RelationDef {
                name: "company".to_string(),
                table: "companies".to_string(),
                alias: "c".to_string(),
                on: "u.company_id = c.id".to_string(),
                fields: vec![FieldDef::new("company_name", "c.name")],
            })
    }

    #[test]
    fn lookup_distinguishes_base_and_relation_fields() {
        let def = users_definition();
        assert_eq!(def.field_owner("email"), Some(FieldOwner::Base));
        assert_eq!(def.field_owner("company_name"), Some(FieldOwner::Relation(0)));
        assert_eq!(def.field_owner("password"), None);
    }

    #[test]
    fn writable_column_requires_plain_base_column() {
        let def = users_definition().with_field(FieldDef::new("display", "UPPER(u.email)"));
        assert_eq!(def.writable_column("email"), Some("email"));
        assert_eq!(def.writable_column("display"), None);
        assert_eq!(def.writable_column("company_name"), None);
    }

    #[test]
    fn tenant_resource_must_declare_tenant_column() {
        let def = ResourceDefinition::new("widgets", "widgets", "w")
            .with_field(FieldDef::new("name", "w.name"));
        let err = ResourceRegistry::from_definitions(vec![def]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidDefinition { .. }));
        assert!(err.to_string().contains("company_id"));
    }

    #[test]
    fn public_resource_needs_no_tenant_column() {
        let def = ResourceDefinition::new("roles", "roles", "r")
            .with_access(ResourceAccess::Public)
            .with_field(FieldDef::new("name", "r.name"));
        assert!(ResourceRegistry::from_definitions(vec![def]).is_ok());
    }

    #[test]
    fn duplicate_output_names_are_rejected() {
        let def = users_definition().with_relation(RelationDef {
            name: "manager".to_string(),
            table: "users".to_string(),
            alias: "m".to_string(),
            on: "u.manager_id = m.id".to_string(),
            fields: vec![FieldDef::new("email", "m.email")],
        });
        let err = ResourceRegistry::from_definitions(vec![def]).unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn hostile_table_name_is_rejected_at_load() {
        let mut def = users_definition();
        def.table = "users; DROP TABLE users".to_string();
        let err = ResourceRegistry::from_definitions(vec![def]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidDefinition { .. }));
    }

    #[test]
    fn json_catalogue_round_trip() {
        let json = r#"{
            "roles": {
                "table": "roles",
                "alias": "r",
                "access": "public",
                "fields": [
                    {"name": "id", "expr": "r.id", "type": "integer"},
                    {"name": "name", "expr": "r.name"}
                ]
            }
        }"#;
        let registry = ResourceRegistry::from_json_str(json).unwrap();
        let roles = registry.get("roles").unwrap();
        assert_eq!(roles.name, "roles");
        assert_eq!(roles.primary_key, "id");
        assert_eq!(roles.access, ResourceAccess::Public);
        assert!(registry.get("users").is_err());
    }

    #[test]
    fn unknown_resource_error_names_the_resource() {
        let registry = ResourceRegistry::from_definitions(vec![users_definition()]).unwrap();
        let err = registry.get("newsletter").unwrap_err();
        assert_eq!(
            err,
            QueryError::unknown_resource("newsletter")
        );
    }

    #[test]
    fn shared_registry_installs_once() {
        let first = ResourceRegistry::from_definitions(vec![users_definition()]).unwrap();
        let installed = first.install_shared().unwrap();
        assert!(installed.contains("users"));
        assert!(ResourceRegistry::shared().is_some());

        let second = ResourceRegistry::from_definitions(vec![users_definition()]).unwrap();
        assert!(second.install_shared().is_err());
    }
}
