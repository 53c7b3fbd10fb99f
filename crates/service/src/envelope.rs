//! Response envelopes
//!
//! Every operation answers with a `data` envelope; list queries add a
//! `meta` block carrying the returned row count and the offset of the
//! next page. Errors serialize as `{ "error": { code, message } }`
//! using the public message only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;

/// List query result: rows plus paging metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: Vec<Value>,
    pub meta: QueryMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMeta {
    /// Offset of the next page; null when the page was not full
    pub next_cursor: Option<i64>,
    /// Rows returned in this page
    pub total: i64,
}

impl QueryResponse {
    pub fn new(data: Vec<Value>) -> Self {
        let total = data.len() as i64;
        Self {
            data,
            meta: QueryMeta {
                next_cursor: None,
                total,
            },
        }
    }

    pub fn with_next_cursor(mut self, cursor: Option<i64>) -> Self {
        self.meta.next_cursor = cursor;
        self
    }
}

/// Insert result echoing the accepted payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertResponse {
    pub data: InsertData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertData {
    pub created: bool,
    /// Key of the new row when the storage reports one
    pub id: Option<i64>,
    pub payload: Value,
}

impl InsertResponse {
    pub fn new(id: Option<i64>, payload: Value) -> Self {
        Self {
            data: InsertData {
                created: true,
                id,
                payload,
            },
        }
    }
}

/// Update result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub data: UpdateData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateData {
    pub updated: bool,
    pub affected: u64,
}

impl UpdateResponse {
    pub fn new(affected: u64) -> Self {
        Self {
            data: UpdateData {
                updated: affected > 0,
                affected,
            },
        }
    }
}

/// Wire form of an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl From<&ServiceError> for ErrorBody {
    fn from(err: &ServiceError) -> Self {
        Self {
            error: ErrorDetail {
                code: err.error_code().to_string(),
                message: err.public_message(),
            },
        }
    }
}
