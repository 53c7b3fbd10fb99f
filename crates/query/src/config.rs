//! Compiler limits
//!
//! Server-side caps applied while compiling a query. The defaults match
//! the v1 feature configuration; per-version overrides are supplied by
//! the service layer.

use serde::{Deserialize, Serialize};

/// Caps enforced during compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerLimits {
    /// Largest accepted IN / NOT IN value list
    pub max_in_values: usize,
    /// Largest accepted number of ORDER BY fields
    pub max_order_fields: usize,
    /// Page limits above this are clamped, not rejected
    pub max_page_limit: i64,
    /// Page limit applied when pagination is requested without one
    pub default_page_limit: i64,
}

impl Default for CompilerLimits {
    fn default() -> Self {
        Self {
            max_in_values: 200,
            max_order_fields: 3,
            max_page_limit: 100,
            default_page_limit: 20,
        }
    }
}

impl CompilerLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_in_values(mut self, max: usize) -> Self {
        self.max_in_values = max;
        self
    }

    pub fn with_max_order_fields(mut self, max: usize) -> Self {
        self.max_order_fields = max;
        self
    }

    pub fn with_page_limits(mut self, max: i64, default: i64) -> Self {
        self.max_page_limit = max;
        self.default_page_limit = default;
        self
    }
}
