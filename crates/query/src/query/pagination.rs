//! Pagination compilation
//!
//! Limits beyond the configured maximum are clamped rather than
//! rejected; negative values are rejected outright. Both LIMIT and
//! OFFSET are bound as parameters when the statement is rendered.

use crate::config::CompilerLimits;
use crate::error::{QueryError, QueryResult};

use super::types::PageSpec;

/// Validated LIMIT/OFFSET pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageClause {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageClause {
    /// The limit that actually applies when this clause renders
    pub fn effective_limit(&self) -> Option<i64> {
        self.limit
    }
}

/// Compile the caller's pagination. No spec at all means no LIMIT or
/// OFFSET; a spec without a limit gets the configured default.
pub fn compile_page(page: Option<&PageSpec>, limits: &CompilerLimits) -> QueryResult<PageClause> {
    let Some(page) = page else {
        return Ok(PageClause::default());
    };

    let limit = match page.limit {
        Some(value) if value < 0 => {
            return Err(QueryError::invalid_pagination(format!(
                "limit must be non-negative, got {}",
                value
            )));
        }
        Some(value) if value > limits.max_page_limit => {
            tracing::warn!(
                "requested page limit {} clamped to {}",
                value,
                limits.max_page_limit
            );
            Some(limits.max_page_limit)
        }
        Some(value) => Some(value),
        None => Some(limits.default_page_limit),
    };

    let offset = match page.offset {
        Some(value) if value < 0 => {
            return Err(QueryError::invalid_pagination(format!(
                "offset must be non-negative, got {}",
                value
            )));
        }
        other => other,
    };

    Ok(PageClause { limit, offset })
}
