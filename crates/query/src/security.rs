//! Identifier safety and row-level tenant scoping
//!
//! Two concerns live here. First, validating and escaping SQL identifiers
//! so no caller-controlled text is ever interpolated into a statement.
//! Second, the security injector: it appends the mandatory tenant and
//! team conjuncts derived from a verified identity. Injection runs after
//! filter compilation, so caller filters are ANDed in front of the
//! injected predicates and can only narrow visibility, never widen it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::query::types::{Condition, FilterOperator, Predicate, PredicateTree};
use crate::resource::{ResourceAccess, ResourceDefinition, TEAM_COLUMN};

/// Characters allowed in SQL identifiers (alphanumeric, underscore)
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

/// Reserved words rejected as identifiers
static SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "JOIN", "UNION", "DROP", "CREATE",
    "ALTER", "GRANT", "REVOKE", "TRUNCATE", "EXEC", "EXECUTE", "DECLARE",
];

/// Validate that an identifier is safe for use in SQL
pub fn validate_identifier(identifier: &str) -> QueryResult<()> {
    if identifier.is_empty() {
        return Err(QueryError::invalid_identifier(
            identifier,
            "identifier cannot be empty",
        ));
    }

    // PostgreSQL caps identifiers at 63 bytes
    if identifier.len() > 63 {
        return Err(QueryError::invalid_identifier(
            identifier,
            "identifier is too long (max 63 characters)",
        ));
    }

    for c in identifier.chars() {
        if !ALLOWED_IDENTIFIER_CHARS.contains(c) {
            return Err(QueryError::invalid_identifier(
                identifier,
                format!("invalid character '{}'", c),
            ));
        }
    }

    if identifier.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(QueryError::invalid_identifier(
            identifier,
            "identifier cannot start with a number",
        ));
    }

    let upper = identifier.to_uppercase();
    if SQL_KEYWORDS.contains(&upper.as_str()) {
        return Err(QueryError::invalid_identifier(
            identifier,
            "identifier is a reserved SQL keyword",
        ));
    }

    Ok(())
}

/// Escape a single SQL identifier by doubling embedded quotes and
/// wrapping it in double quotes. Used on the write path where column
/// names are rendered one by one.
pub fn escape_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Validate a source expression or join condition from a resource
/// definition. Definitions are the trust root, but the loader still keeps
/// them to plain column references and calls: no statement separators,
/// no comments, no string literals.
pub fn validate_expression(expr: &str) -> QueryResult<()> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(QueryError::invalid_identifier(
            expr,
            "expression cannot be empty",
        ));
    }
    if trimmed.len() > 256 {
        return Err(QueryError::invalid_identifier(
            expr,
            "expression is too long (max 256 characters)",
        ));
    }
    for forbidden in [";", "--", "/*", "*/", "'"] {
        if trimmed.contains(forbidden) {
            return Err(QueryError::invalid_identifier(
                expr,
                format!("expression contains forbidden sequence '{}'", forbidden),
            ));
        }
    }
    Ok(())
}

/// The verified identity a query executes under. Built from a validated
/// token by the caller, never from request bodies or query strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    /// Tenant the caller belongs to; None only for anonymous access
    pub company_id: Option<i64>,
    /// Teams the caller may see; empty means no team narrowing
    #[serde(default)]
    pub team_ids: Vec<i64>,
}

impl SecurityContext {
    /// Context for an anonymous caller. Only public resources are
    /// reachable with it.
    pub fn anonymous() -> Self {
        Self {
            company_id: None,
            team_ids: Vec::new(),
        }
    }

    pub fn for_company(company_id: i64) -> Self {
        Self {
            company_id: Some(company_id),
            team_ids: Vec::new(),
        }
    }

    pub fn with_teams(mut self, team_ids: Vec<i64>) -> Self {
        self.team_ids = team_ids;
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.company_id.is_none()
    }
}

/// Append the mandatory row-level predicates for `resource` to `tree`.
///
/// Tenant-scoped resources always get `alias.company_id = $n`. A team
/// conjunct `alias.team_id IN (...)` is added only when the context
/// carries team ids and the resource declares the column. Public
/// resources pass through untouched.
pub fn inject_security(
    mut tree: PredicateTree,
    resource: &ResourceDefinition,
    context: &SecurityContext,
) -> QueryResult<PredicateTree> {
    if resource.access == ResourceAccess::Public {
        return Ok(tree);
    }

    let company_id = context
        .company_id
        .ok_or_else(|| QueryError::missing_tenant_context(&resource.name))?;

    tree.push(Predicate::Condition(Condition::scalar(
        resource.tenant_column_expr(),
        FilterOperator::Equal,
        Value::from(company_id),
    )));

    if !context.team_ids.is_empty() && resource.declares_base_column(TEAM_COLUMN) {
        let team_values = context.team_ids.iter().map(|id| Value::from(*id)).collect();
        tree.push(Predicate::Condition(Condition::list(
            resource.team_column_expr(),
            FilterOperator::In,
            team_values,
        )));
    }

    tracing::debug!(
        "tenant scope injected for resource '{}' (company {})",
        resource.name,
        company_id
    );

    Ok(tree)
}
