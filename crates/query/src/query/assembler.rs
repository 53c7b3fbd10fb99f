//! Query assembly
//!
//! Drives the compiler stages in a fixed order: resource resolution,
//! filter compilation, join resolution, projection, ordering, pagination,
//! and last of all security injection, before rendering the final
//! parameterized statement. A failure at any stage aborts the whole
//! request; nothing partial is ever rendered or executed.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::config::CompilerLimits;
use crate::error::{QueryError, QueryResult};
use crate::resource::{ResourceAccess, ResourceDefinition, ResourceRegistry, TENANT_COLUMN};
use crate::security::{inject_security, validate_identifier, SecurityContext};

use super::filter::{compile_filters, split_filter_key};
use super::joins::resolve_joins;
use super::ordering::compile_order;
use super::pagination::compile_page;
use super::select::build_select;
use super::sql::{render_insert, render_select, render_update};
use super::types::{CompiledQuery, FilterSpec, OrderSpec, PageSpec, PredicateTree};

/// A read request: which resource, which fields, and how to filter,
/// order, and page the rows
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuerySpec {
    pub resource: String,
    pub fields: Option<Vec<String>>,
    pub filters: Option<FilterSpec>,
    pub order_by: Option<OrderSpec>,
    pub pagination: Option<PageSpec>,
}

impl QuerySpec {
    pub fn new<R: Into<String>>(resource: R) -> Self {
        Self {
            resource: resource.into(),
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_filters(mut self, filters: FilterSpec) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn with_pagination(mut self, pagination: PageSpec) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

/// An insert request. The payload maps declared field names to scalar
/// values; iteration order is the sorted field order, which keeps the
/// rendered column list deterministic.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InsertSpec {
    pub resource: String,
    pub payload: BTreeMap<String, Value>,
}

impl InsertSpec {
    pub fn new<R: Into<String>>(resource: R, payload: BTreeMap<String, Value>) -> Self {
        Self {
            resource: resource.into(),
            payload,
        }
    }
}

/// An update request: payload columns to set plus filters selecting the
/// rows to touch
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpdateSpec {
    pub resource: String,
    pub payload: BTreeMap<String, Value>,
    pub filters: FilterSpec,
}

impl UpdateSpec {
    pub fn new<R: Into<String>>(
        resource: R,
        payload: BTreeMap<String, Value>,
        filters: FilterSpec,
    ) -> Self {
        Self {
            resource: resource.into(),
            payload,
            filters,
        }
    }
}

/// Compiles request specifications into parameterized statements against
/// a fixed registry and limit set
#[derive(Debug, Clone)]
pub struct QueryAssembler {
    registry: Arc<ResourceRegistry>,
    limits: CompilerLimits,
}

impl QueryAssembler {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self {
            registry,
            limits: CompilerLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: CompilerLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &CompilerLimits {
        &self.limits
    }

    /// Compile a read. The security conjuncts are appended after the
    /// caller's filters and cannot be displaced by anything in the spec.
    pub fn compile_select(
        &self,
        spec: &QuerySpec,
        context: &SecurityContext,
    ) -> QueryResult<CompiledQuery> {
        let resource = self.registry.get(&spec.resource)?;

        let tree = match &spec.filters {
            Some(filters) => compile_filters(filters, resource, &self.limits)?,
            None => PredicateTree::new(),
        };

        let needed = self.needed_fields(spec);
        let joins = resolve_joins(resource, needed.as_deref())?;
        let select = build_select(resource, &joins, spec.fields.as_deref())?;

        let order = match &spec.order_by {
            Some(order) => compile_order(order, resource, &self.limits)?,
            None => Vec::new(),
        };
        let page = compile_page(spec.pagination.as_ref(), &self.limits)?;

        let tree = inject_security(tree, resource, context)?;
        let compiled = render_select(&select, &tree, &order, page);

        tracing::debug!(
            "compiled select for resource '{}' ({} params)",
            resource.name,
            compiled.params.len()
        );
        Ok(compiled)
    }

    /// Compile an insert. Payload fields must resolve to plain base
    /// columns; tenant-scoped resources get the tenant column stamped
    /// from the verified context, overriding any caller-supplied value.
    pub fn compile_insert(
        &self,
        spec: &InsertSpec,
        context: &SecurityContext,
    ) -> QueryResult<CompiledQuery> {
        let resource = self.registry.get(&spec.resource)?;
        if spec.payload.is_empty() {
            return Err(QueryError::invalid_payload(
                &resource.name,
                "payload cannot be empty",
            ));
        }

        let (mut columns, mut values) = writable_payload(resource, &spec.payload)?;

        if resource.access == ResourceAccess::Tenant {
            let company_id = context
                .company_id
                .ok_or_else(|| QueryError::missing_tenant_context(&resource.name))?;
            match columns.iter().position(|c| c == TENANT_COLUMN) {
                Some(index) => values[index] = Value::from(company_id),
                None => {
                    columns.push(TENANT_COLUMN.to_string());
                    values.push(Value::from(company_id));
                }
            }
        }

        let compiled = render_insert(&resource.table, &resource.primary_key, &columns, &values);
        tracing::debug!(
            "compiled insert for resource '{}' ({} columns)",
            resource.name,
            columns.len()
        );
        Ok(compiled)
    }

    /// Compile an update. The tenant column can never be set, and the
    /// WHERE clause always carries at least one predicate: the injected
    /// tenant conjunct for scoped resources, or the caller's filters for
    /// public ones.
    pub fn compile_update(
        &self,
        spec: &UpdateSpec,
        context: &SecurityContext,
    ) -> QueryResult<CompiledQuery> {
        let resource = self.registry.get(&spec.resource)?;
        if spec.payload.is_empty() {
            return Err(QueryError::invalid_payload(
                &resource.name,
                "payload cannot be empty",
            ));
        }
        if spec.payload.keys().any(|field| {
            resource.writable_column(field) == Some(TENANT_COLUMN)
        }) {
            return Err(QueryError::invalid_payload(
                &resource.name,
                "tenant column cannot be updated",
            ));
        }

        let (columns, values) = writable_payload(resource, &spec.payload)?;

        let tree = compile_filters(&spec.filters, resource, &self.limits)?;
        let tree = inject_security(tree, resource, context)?;
        if tree.is_empty() {
            return Err(QueryError::invalid_filter_value(
                "filters",
                "update requires at least one condition",
            ));
        }

        let compiled = render_update(
            &resource.table,
            &resource.alias,
            &resource.primary_key,
            &columns,
            &values,
            &tree,
        );
        tracing::debug!(
            "compiled update for resource '{}' ({} columns, {} predicates)",
            resource.name,
            columns.len(),
            tree.len()
        );
        Ok(compiled)
    }

    /// The fields whose owners must be joinable: the explicit projection
    /// plus everything named by filters and ordering. None when no
    /// explicit projection was given, which makes join resolution fall
    /// back to joining every declared relation.
    fn needed_fields(&self, spec: &QuerySpec) -> Option<Vec<String>> {
        let fields = spec.fields.as_ref().filter(|fields| !fields.is_empty())?;
        let mut needed = fields.clone();
        if let Some(filters) = &spec.filters {
            for key in filters.keys() {
                let (field, _) = split_filter_key(key);
                needed.push(field.to_string());
            }
        }
        if let Some(order) = &spec.order_by {
            for (field, _) in &order.fields {
                needed.push(field.clone());
            }
        }
        Some(needed)
    }
}

/// Resolve a write payload to base-table columns and scalar values
fn writable_payload(
    resource: &ResourceDefinition,
    payload: &BTreeMap<String, Value>,
) -> QueryResult<(Vec<String>, Vec<Value>)> {
    let mut columns = Vec::with_capacity(payload.len());
    let mut values = Vec::with_capacity(payload.len());
    for (field, value) in payload {
        validate_identifier(field)?;
        let column = resource
            .writable_column(field)
            .ok_or_else(|| QueryError::unresolved_field(&resource.name, field))?;
        if value.is_array() || value.is_object() {
            return Err(QueryError::invalid_payload(
                &resource.name,
                format!("field '{}' must be a scalar value", field),
            ));
        }
        columns.push(column.to_string());
        values.push(value.clone());
    }
    Ok((columns, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{FieldDef, FieldType, RelationDef};
    use serde_json::json;

    fn registry() -> Arc<ResourceRegistry> {
        let users = ResourceDefinition::new("users", "users", "u")
            .with_field(FieldDef::typed("id", "u.id", FieldType::Integer))
            .with_field(FieldDef::new("name", "u.name"))
            .with_field(FieldDef::new("email", "u.email"))
            .with_field(FieldDef::typed("company_id", "u.company_id", FieldType::Integer))
            .with_relation(RelationDef {
                name: "company".to_string(),
                table: "companies".to_string(),
                alias: "c".to_string(),
                on: "u.company_id = c.id".to_string(),
                fields: vec![FieldDef::new("company_name", "c.name")],
            });
        let roles = ResourceDefinition::new("roles", "roles", "r")
            .with_access(ResourceAccess::Public)
            .with_field(FieldDef::typed("id", "r.id", FieldType::Integer))
            .with_field(FieldDef::new("name", "r.name"));
        Arc::new(ResourceRegistry::from_definitions(vec![users, roles]).unwrap())
    }

    fn assembler() -> QueryAssembler {
        QueryAssembler::new(registry())
    }

    #[test]
    fn filter_fields_pull_in_their_relation_joins() {
        let spec = QuerySpec::new("users")
            .with_fields(vec!["id".to_string()])
            .with_filters(FilterSpec::from([(
                "company_name.eq".to_string(),
                json!("Acme"),
            )]));
        let compiled = assembler()
            .compile_select(&spec, &SecurityContext::for_company(7))
            .unwrap();
        assert!(compiled.statement.contains("LEFT JOIN companies c"));
        // Projection stays what was asked for.
        assert!(compiled.statement.starts_with("SELECT u.id AS id FROM"));
    }

    #[test]
    fn order_fields_pull_in_their_relation_joins() {
        let spec = QuerySpec::new("users")
            .with_fields(vec!["id".to_string()])
            .with_order(OrderSpec::new().field("company_name", "asc"));
        let compiled = assembler()
            .compile_select(&spec, &SecurityContext::for_company(7))
            .unwrap();
        assert!(compiled.statement.contains("LEFT JOIN companies c"));
        assert!(compiled.statement.contains("ORDER BY c.name ASC"));
    }

    #[test]
    fn insert_stamps_the_tenant_column_from_context() {
        let spec = InsertSpec::new(
            "users",
            BTreeMap::from([("name".to_string(), json!("Dana"))]),
        );
        let compiled = assembler()
            .compile_insert(&spec, &SecurityContext::for_company(7))
            .unwrap();
        assert_eq!(
            compiled.statement,
            "INSERT INTO \"users\" (\"name\", \"company_id\") VALUES ($1, $2) RETURNING \"id\""
        );
        assert_eq!(compiled.params, vec![json!("Dana"), json!(7)]);
    }

    #[test]
    fn insert_overrides_caller_supplied_tenant_value() {
        let spec = InsertSpec::new(
            "users",
            BTreeMap::from([
                ("company_id".to_string(), json!(999)),
                ("name".to_string(), json!("Dana")),
            ]),
        );
        let compiled = assembler()
            .compile_insert(&spec, &SecurityContext::for_company(7))
            .unwrap();
        assert!(!compiled.params.contains(&json!(999)));
        assert!(compiled.params.contains(&json!(7)));
    }

    #[test]
    fn insert_rejects_fields_that_are_not_base_columns() {
        let spec = InsertSpec::new(
            "users",
            BTreeMap::from([("company_name".to_string(), json!("Acme"))]),
        );
        let err = assembler()
            .compile_insert(&spec, &SecurityContext::for_company(7))
            .unwrap_err();
        assert_eq!(err, QueryError::unresolved_field("users", "company_name"));
    }

    #[test]
    fn insert_requires_a_payload() {
        let spec = InsertSpec::new("users", BTreeMap::new());
        let err = assembler()
            .compile_insert(&spec, &SecurityContext::for_company(7))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidPayload { .. }));
    }

    #[test]
    fn anonymous_insert_into_tenant_resource_fails() {
        let spec = InsertSpec::new(
            "users",
            BTreeMap::from([("name".to_string(), json!("Dana"))]),
        );
        let err = assembler()
            .compile_insert(&spec, &SecurityContext::anonymous())
            .unwrap_err();
        assert_eq!(err, QueryError::missing_tenant_context("users"));
    }

    #[test]
    fn public_insert_needs_no_tenant_context() {
        let spec = InsertSpec::new(
            "roles",
            BTreeMap::from([("name".to_string(), json!("admin"))]),
        );
        let compiled = assembler()
            .compile_insert(&spec, &SecurityContext::anonymous())
            .unwrap();
        assert_eq!(
            compiled.statement,
            "INSERT INTO \"roles\" (\"name\") VALUES ($1) RETURNING \"id\""
        );
    }

    #[test]
    fn update_cannot_touch_the_tenant_column() {
        let spec = UpdateSpec::new(
            "users",
            BTreeMap::from([("company_id".to_string(), json!(3))]),
            FilterSpec::from([("id.eq".to_string(), json!(1))]),
        );
        let err = assembler()
            .compile_update(&spec, &SecurityContext::for_company(7))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidPayload { .. }));
    }

    #[test]
    fn update_carries_injected_scope_in_where() {
        let spec = UpdateSpec::new(
            "users",
            BTreeMap::from([("name".to_string(), json!("Dana"))]),
            FilterSpec::from([("id.eq".to_string(), json!(4))]),
        );
        let compiled = assembler()
            .compile_update(&spec, &SecurityContext::for_company(7))
            .unwrap();
        assert_eq!(
            compiled.statement,
            "UPDATE \"users\" AS u SET \"name\" = $1 \
             WHERE u.id = $2 AND u.company_id = $3 RETURNING \"id\""
        );
        assert_eq!(compiled.params, vec![json!("Dana"), json!(4), json!(7)]);
    }

    #[test]
    fn unfiltered_public_update_is_rejected() {
        let spec = UpdateSpec::new(
            "roles",
            BTreeMap::from([("name".to_string(), json!("renamed"))]),
            FilterSpec::new(),
        );
        let err = assembler()
            .compile_update(&spec, &SecurityContext::anonymous())
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilterValue { .. }));
    }

    #[test]
    fn spec_parses_from_camel_case_json() {
        let spec: QuerySpec = serde_json::from_str(
            r#"{
                "fields": ["id", "email"],
                "filters": {"email.like": "%@b.com"},
                "orderBy": {"id": "desc"},
                "pagination": {"limit": 10, "offset": 0}
            }"#,
        )
        .unwrap();
        assert_eq!(spec.fields.as_deref().map(|f| f.len()), Some(2));
        assert!(spec.order_by.is_some());
        assert_eq!(spec.pagination.and_then(|p| p.limit), Some(10));
    }
}
