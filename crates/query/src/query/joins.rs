//! Join resolution
//!
//! Walks the fields a query needs and produces the minimal set of
//! relation joins: one join per relation no matter how many of its
//! fields appear, ordered by first use. With no explicit field list
//! every declared relation is joined, which is what the
//! select-everything path relies on.

use std::collections::HashSet;

use crate::error::{QueryError, QueryResult};
use crate::resource::{FieldOwner, RelationDef, ResourceDefinition};

use super::types::JoinClause;

/// Resolve the joins needed to satisfy `needed_fields`. `None` (or an
/// empty list) means no explicit projection was given and all declared
/// relations are joined.
pub fn resolve_joins(
    resource: &ResourceDefinition,
    needed_fields: Option<&[String]>,
) -> QueryResult<Vec<JoinClause>> {
    let fields = match needed_fields {
        Some(fields) if !fields.is_empty() => fields,
        _ => {
            return Ok(resource.relations.iter().map(join_for).collect());
        }
    };

    let mut joins = Vec::new();
    let mut joined: HashSet<usize> = HashSet::new();

    for field in fields {
        match resource.field_owner(field) {
            Some(FieldOwner::Base) => {}
            Some(FieldOwner::Relation(index)) => {
                if joined.insert(index) {
                    joins.push(join_for(&resource.relations[index]));
                }
            }
            None => {
                return Err(QueryError::unresolved_field(&resource.name, field));
            }
        }
    }

    Ok(joins)
}

fn join_for(relation: &RelationDef) -> JoinClause {
    JoinClause {
        table: relation.table.clone(),
        alias: relation.alias.clone(),
        condition: relation.on.clone(),
    }
}
