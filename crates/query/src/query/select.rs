//! Projection and FROM assembly
//!
//! Builds the SELECT skeleton: every projected column renders as
//! `expr AS name` so output rows are keyed by declared field names, never
//! physical columns. With no explicit field list the projection covers
//! all base fields plus the fields of every joined relation, in
//! declaration order.

use std::collections::HashSet;

use crate::error::{QueryError, QueryResult};
use crate::resource::ResourceDefinition;

use super::types::JoinClause;

/// The SELECT skeleton: projection plus FROM and JOIN clauses
#[derive(Debug, Clone, PartialEq)]
pub struct SelectSkeleton {
    /// `expr AS name` entries, already ordered
    pub projection: Vec<String>,
    /// `table alias`
    pub from: String,
    pub joins: Vec<JoinClause>,
}

/// Build the skeleton for `resource` given the resolved joins and the
/// optional explicit field list. Requested fields keep their request
/// order; duplicates are projected once.
pub fn build_select(
    resource: &ResourceDefinition,
    joins: &[JoinClause],
    fields: Option<&[String]>,
) -> QueryResult<SelectSkeleton> {
    let mut projection = Vec::new();

    match fields {
        Some(requested) if !requested.is_empty() => {
            let mut seen: HashSet<&str> = HashSet::new();
            for name in requested {
                if !seen.insert(name.as_str()) {
                    continue;
                }
                let def = resource
                    .field_def(name)
                    .ok_or_else(|| QueryError::unresolved_field(&resource.name, name))?;
                projection.push(format!("{} AS {}", def.expr, def.name));
            }
        }
        _ => {
            for field in &resource.fields {
                projection.push(format!("{} AS {}", field.expr, field.name));
            }
            let joined: HashSet<&str> = joins.iter().map(|j| j.alias.as_str()).collect();
            for relation in &resource.relations {
                if joined.contains(relation.alias.as_str()) {
                    for field in &relation.fields {
                        projection.push(format!("{} AS {}", field.expr, field.name));
                    }
                }
            }
        }
    }

    Ok(SelectSkeleton {
        projection,
        from: format!("{} {}", resource.table, resource.alias),
        joins: joins.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::joins::resolve_joins;
    use crate::resource::{FieldDef, RelationDef};

    fn resource() -> ResourceDefinition {
        ResourceDefinition::new("users", "users", "u")
            .with_field(FieldDef::new("id", "u.id"))
            .with_field(FieldDef::new("email", "u.email"))
            .with_field(FieldDef::new("company_id", "u.company_id"))
            .with_relation(RelationDef {
                name: "company".to_string(),
                table: "companies".to_string(),
                alias: "c".to_string(),
                on: "u.company_id = c.id".to_string(),
                fields: vec![FieldDef::new("company_name", "c.name")],
            })
    }

    #[test]
    fn requested_fields_keep_request_order() {
        let resource = resource();
        let requested = vec!["email".to_string(), "id".to_string()];
        let joins = resolve_joins(&resource, Some(&requested)).unwrap();
        let skeleton = build_select(&resource, &joins, Some(&requested)).unwrap();
        assert_eq!(skeleton.projection, vec!["u.email AS email", "u.id AS id"]);
        assert_eq!(skeleton.from, "users u");
        assert!(skeleton.joins.is_empty());
    }

    #[test]
    fn duplicate_requests_are_projected_once() {
        let resource = resource();
        let requested = vec!["id".to_string(), "id".to_string()];
        let skeleton = build_select(&resource, &[], Some(&requested)).unwrap();
        assert_eq!(skeleton.projection, vec!["u.id AS id"]);
    }

    #[test]
    fn no_field_list_projects_everything_joined() {
        let resource = resource();
        let joins = resolve_joins(&resource, None).unwrap();
        let skeleton = build_select(&resource, &joins, None).unwrap();
        assert_eq!(
            skeleton.projection,
            vec![
                "u.id AS id",
                "u.email AS email",
                "u.company_id AS company_id",
                "c.name AS company_name",
            ]
        );
        assert_eq!(skeleton.joins.len(), 1);
    }

    #[test]
    fn relation_fields_outside_join_set_are_not_projected() {
        let resource = resource();
        // Everything-projection with no joins resolved: base fields only.
        let skeleton = build_select(&resource, &[], None).unwrap();
        assert_eq!(
            skeleton.projection,
            vec![
                "u.id AS id",
                "u.email AS email",
                "u.company_id AS company_id",
            ]
        );
    }

    #[test]
    fn unknown_requested_field_is_rejected() {
        let resource = resource();
        let requested = vec!["password".to_string()];
        let err = build_select(&resource, &[], Some(&requested)).unwrap_err();
        assert_eq!(err, QueryError::unresolved_field("users", "password"));
    }
}
