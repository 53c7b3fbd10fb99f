//! Statement rendering
//!
//! The only place clause fragments become statement text. Caller values
//! are emitted exclusively as `$n` placeholders with a parallel parameter
//! vector; identifier text comes from the resource definition by way of
//! the earlier stages. Rendering the same compiled clauses always yields
//! byte-identical output.

use serde_json::Value;

use crate::security::escape_identifier;

use super::ordering::OrderClause;
use super::pagination::PageClause;
use super::select::SelectSkeleton;
use super::types::{CompiledQuery, Condition, FilterOperator, Predicate, PredicateTree};

/// Render a complete SELECT statement
pub fn render_select(
    select: &SelectSkeleton,
    predicates: &PredicateTree,
    order: &[OrderClause],
    page: PageClause,
) -> CompiledQuery {
    let mut sql = String::from("SELECT ");
    let mut params: Vec<Value> = Vec::new();

    sql.push_str(&select.projection.join(", "));
    sql.push_str(" FROM ");
    sql.push_str(&select.from);

    for join in &select.joins {
        sql.push_str(&format!(
            " LEFT JOIN {} {} ON {}",
            join.table, join.alias, join.condition
        ));
    }

    append_where(&mut sql, &mut params, predicates);

    if !order.is_empty() {
        sql.push_str(" ORDER BY ");
        for (index, clause) in order.iter().enumerate() {
            if index > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("{} {}", clause.expr, clause.direction));
        }
    }

    if let Some(limit) = page.limit {
        params.push(Value::from(limit));
        sql.push_str(&format!(" LIMIT ${}", params.len()));
    }
    if let Some(offset) = page.offset {
        params.push(Value::from(offset));
        sql.push_str(&format!(" OFFSET ${}", params.len()));
    }

    CompiledQuery::new(sql, params)
}

/// Render an INSERT with a RETURNING clause so the write outcome can
/// report the new key
pub fn render_insert(
    table: &str,
    primary_key: &str,
    columns: &[String],
    values: &[Value],
) -> CompiledQuery {
    let mut sql = String::from("INSERT INTO ");
    let mut params: Vec<Value> = Vec::new();

    sql.push_str(&escape_identifier(table));
    sql.push_str(" (");
    for (index, column) in columns.iter().enumerate() {
        if index > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&escape_identifier(column));
    }
    sql.push_str(") VALUES (");
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            sql.push_str(", ");
        }
        params.push(value.clone());
        sql.push_str(&format!("${}", params.len()));
    }
    sql.push_str(&format!(") RETURNING {}", escape_identifier(primary_key)));

    CompiledQuery::new(sql, params)
}

/// Render an UPDATE. The table is aliased because the WHERE predicates
/// are alias-qualified; affected keys come back so outcomes stay uniform
/// with inserts.
pub fn render_update(
    table: &str,
    alias: &str,
    primary_key: &str,
    columns: &[String],
    values: &[Value],
    predicates: &PredicateTree,
) -> CompiledQuery {
    let mut sql = String::from("UPDATE ");
    let mut params: Vec<Value> = Vec::new();

    sql.push_str(&escape_identifier(table));
    sql.push_str(&format!(" AS {}", alias));
    sql.push_str(" SET ");
    for (index, (column, value)) in columns.iter().zip(values.iter()).enumerate() {
        if index > 0 {
            sql.push_str(", ");
        }
        params.push(value.clone());
        sql.push_str(&format!("{} = ${}", escape_identifier(column), params.len()));
    }

    append_where(&mut sql, &mut params, predicates);
    sql.push_str(&format!(" RETURNING {}", escape_identifier(primary_key)));

    CompiledQuery::new(sql, params)
}

fn append_where(sql: &mut String, params: &mut Vec<Value>, tree: &PredicateTree) {
    if tree.is_empty() {
        return;
    }
    sql.push_str(" WHERE ");
    for (index, predicate) in tree.predicates.iter().enumerate() {
        if index > 0 {
            sql.push_str(" AND ");
        }
        match predicate {
            Predicate::AlwaysFalse => sql.push_str("1 = 0"),
            Predicate::AlwaysTrue => sql.push_str("1 = 1"),
            Predicate::Condition(condition) => append_condition(sql, params, condition),
        }
    }
}

fn append_condition(sql: &mut String, params: &mut Vec<Value>, condition: &Condition) {
    match condition.operator {
        FilterOperator::In | FilterOperator::NotIn => {
            sql.push_str(&format!("{} {} (", condition.column, condition.operator));
            for (index, value) in condition.values.iter().enumerate() {
                if index > 0 {
                    sql.push_str(", ");
                }
                params.push(value.clone());
                sql.push_str(&format!("${}", params.len()));
            }
            sql.push(')');
        }
        FilterOperator::Between | FilterOperator::NotBetween => {
            params.push(condition.values[0].clone());
            let low = params.len();
            params.push(condition.values[1].clone());
            let high = params.len();
            sql.push_str(&format!(
                "{} {} ${} AND ${}",
                condition.column, condition.operator, low, high
            ));
        }
        FilterOperator::IsNull | FilterOperator::IsNotNull => {
            sql.push_str(&format!("{} {}", condition.column, condition.operator));
        }
        _ => {
            let value = condition.value.clone().unwrap_or(Value::Null);
            params.push(value);
            sql.push_str(&format!(
                "{} {} ${}",
                condition.column, condition.operator,
                params.len()
            ));
        }
    }
}
