//! Ordering compilation
//!
//! Validates the caller's sort specification field by field. The field
//! count cap is checked before anything else so an oversized spec never
//! partially compiles.

use crate::config::CompilerLimits;
use crate::error::{QueryError, QueryResult};
use crate::resource::ResourceDefinition;
use crate::security::validate_identifier;

use super::types::{OrderDirection, OrderSpec};

/// One validated ORDER BY term
#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
    /// Source expression from the resource definition
    pub expr: String,
    pub direction: OrderDirection,
}

/// Compile `order` against `resource`
pub fn compile_order(
    order: &OrderSpec,
    resource: &ResourceDefinition,
    limits: &CompilerLimits,
) -> QueryResult<Vec<OrderClause>> {
    if order.len() > limits.max_order_fields {
        return Err(QueryError::TooManyOrderFields {
            count: order.len(),
            max: limits.max_order_fields,
        });
    }

    let mut clauses = Vec::with_capacity(order.len());
    for (field, raw_direction) in &order.fields {
        validate_identifier(field)?;
        let def = resource
            .field_def(field)
            .ok_or_else(|| QueryError::unresolved_field(&resource.name, field))?;
        let direction =
            OrderDirection::parse(raw_direction).ok_or_else(|| QueryError::InvalidDirection {
                field: field.clone(),
                direction: raw_direction.clone(),
            })?;
        clauses.push(OrderClause {
            expr: def.expr.clone(),
            direction,
        });
    }

    Ok(clauses)
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn directions_are_case_insensitive() {
        let order = OrderSpec::new().field("email", "DESC").field("id", "asc");
        let clauses = compile_order(&order, &resource(), &CompilerLimits::default()).unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].expr, "u.email");
        assert_eq!(clauses[0].direction, OrderDirection::Desc);
        assert_eq!(clauses[1].direction, OrderDirection::Asc);
    }

    #[test]
    fn relation_fields_order_by_their_source_expression() {
        let order = OrderSpec::new().field("company_name", "asc");
        let clauses = compile_order(&order, &resource(), &CompilerLimits::default()).unwrap();
        assert_eq!(clauses[0].expr, "c.name");
    }

    #[test]
    fn invalid_direction_is_rejected() {
        let order = OrderSpec::new().field("email", "sideways");
        let err = compile_order(&order, &resource(), &CompilerLimits::default()).unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidDirection {
                field: "email".to_string(),
                direction: "sideways".to_string(),
            }
        );
    }

    #[test]
    fn field_cap_is_checked_before_resolution() {
        let order = OrderSpec::new()
            .field("id", "asc")
            .field("email", "asc")
            .field("company_name", "asc")
            .field("no_such_field", "asc");
        let err = compile_order(&order, &resource(), &CompilerLimits::default()).unwrap_err();
        assert_eq!(
            err,
            QueryError::TooManyOrderFields { count: 4, max: 3 }
        );
    }

    #[test]
    fn unknown_order_field_is_rejected() {
        let order = OrderSpec::new().field("nickname", "asc");
        let err = compile_order(&order, &resource(), &CompilerLimits::default()).unwrap_err();
        assert_eq!(err, QueryError::unresolved_field("users", "nickname"));
    }
}
