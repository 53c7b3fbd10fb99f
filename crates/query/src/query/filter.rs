//! Filter compilation
//!
//! Turns the caller's filter specification into the predicate tree that
//! later renders as the WHERE clause. Keys are `field` or
//! `field.operator`; a bare field picks its default operator from the
//! declared field type and the value shape. Field names are checked for
//! identifier safety before they are resolved against the resource, and
//! every operand becomes a bound parameter.

use serde_json::Value;

use crate::config::CompilerLimits;
use crate::error::{QueryError, QueryResult};
use crate::resource::{FieldType, ResourceDefinition};
use crate::security::validate_identifier;

use super::types::{Condition, FilterOperator, FilterSpec, Predicate, PredicateTree};

/// Split a filter key into its field name and optional operator token
pub(crate) fn split_filter_key(key: &str) -> (&str, Option<&str>) {
    match key.split_once('.') {
        Some((field, operator)) => (field, Some(operator)),
        None => (key, None),
    }
}

/// Compile `filters` against `resource` into a predicate tree
pub fn compile_filters(
    filters: &FilterSpec,
    resource: &ResourceDefinition,
    limits: &CompilerLimits,
) -> QueryResult<PredicateTree> {
    let mut tree = PredicateTree::new();

    for (key, value) in filters {
        let (field, operator_token) = split_filter_key(key);
        validate_identifier(field)?;

        let field_def = resource
            .field_def(field)
            .ok_or_else(|| QueryError::unresolved_field(&resource.name, field))?;

        let operator = match operator_token {
            Some(token) => FilterOperator::parse(token)
                .ok_or_else(|| QueryError::unsupported_operator(field, token))?,
            None => default_operator(field_def.field_type, value),
        };

        tree.push(compile_condition(
            field,
            &field_def.expr,
            operator,
            value,
            limits,
        )?);
    }

    Ok(tree)
}

/// Operator used when the filter key names a field without one
fn default_operator(field_type: FieldType, value: &Value) -> FilterOperator {
    if value.is_null() {
        FilterOperator::IsNull
    } else if value.is_array() {
        FilterOperator::In
    } else if field_type.is_textual() {
        FilterOperator::Like
    } else {
        FilterOperator::Equal
    }
}

fn compile_condition(
    field: &str,
    column_expr: &str,
    operator: FilterOperator,
    value: &Value,
    limits: &CompilerLimits,
) -> QueryResult<Predicate> {
    match operator {
        FilterOperator::In | FilterOperator::NotIn => {
            let items = value.as_array().ok_or_else(|| {
                QueryError::invalid_filter_value(field, "IN requires an array of values")
            })?;
            // An empty list has a fixed truth value; render it as a
            // constant instead of invalid `IN ()` SQL.
            if items.is_empty() {
                return Ok(match operator {
                    FilterOperator::In => Predicate::AlwaysFalse,
                    _ => Predicate::AlwaysTrue,
                });
            }
            if items.len() > limits.max_in_values {
                return Err(QueryError::TooManyValues {
                    field: field.to_string(),
                    count: items.len(),
                    max: limits.max_in_values,
                });
            }
            require_scalars(field, items)?;
            Ok(Predicate::Condition(Condition::list(
                column_expr,
                operator,
                items.clone(),
            )))
        }
        FilterOperator::Between | FilterOperator::NotBetween => {
            let items = value.as_array().ok_or_else(|| {
                QueryError::invalid_filter_value(field, "BETWEEN requires an array of two values")
            })?;
            if items.len() != 2 {
                return Err(QueryError::invalid_filter_value(
                    field,
                    format!("BETWEEN requires exactly two values, got {}", items.len()),
                ));
            }
            require_scalars(field, items)?;
            Ok(Predicate::Condition(Condition::list(
                column_expr,
                operator,
                items.clone(),
            )))
        }
        FilterOperator::IsNull | FilterOperator::IsNotNull => {
            Ok(Predicate::Condition(Condition::bare(column_expr, operator)))
        }
        FilterOperator::Like | FilterOperator::NotLike => {
            if !value.is_string() {
                return Err(QueryError::invalid_filter_value(
                    field,
                    "LIKE requires a string pattern",
                ));
            }
            Ok(Predicate::Condition(Condition::scalar(
                column_expr,
                operator,
                value.clone(),
            )))
        }
        _ => {
            if value.is_array() || value.is_object() {
                return Err(QueryError::invalid_filter_value(
                    field,
                    "expected a scalar value",
                ));
            }
            if value.is_null() {
                return Err(QueryError::invalid_filter_value(
                    field,
                    "null is only valid with the is_null / is_not_null operators",
                ));
            }
            Ok(Predicate::Condition(Condition::scalar(
                column_expr,
                operator,
                value.clone(),
            )))
        }
    }
}

fn require_scalars(field: &str, items: &[Value]) -> QueryResult<()> {
    if items.iter().any(|v| v.is_array() || v.is_object()) {
        return Err(QueryError::invalid_filter_value(
            field,
            "list values must be scalars",
        ));
    }
    Ok(())
}
