//! Core types shared by the compiler stages

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{QueryError, QueryResult};

/// Filter operators accepted by the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    NotBetween,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    IsNull,
    IsNotNull,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sql = match self {
            FilterOperator::Equal => "=",
            FilterOperator::NotEqual => "!=",
            FilterOperator::Like => "LIKE",
            FilterOperator::NotLike => "NOT LIKE",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT IN",
            FilterOperator::Between => "BETWEEN",
            FilterOperator::NotBetween => "NOT BETWEEN",
            FilterOperator::LessThan => "<",
            FilterOperator::GreaterThan => ">",
            FilterOperator::LessThanOrEqual => "<=",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::IsNotNull => "IS NOT NULL",
        };
        write!(f, "{}", sql)
    }
}

impl FilterOperator {
    /// Parse the operator token of a `field.operator` filter key. Tokens
    /// are case-insensitive and accept both word and symbol spellings.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "eq" | "=" => Some(FilterOperator::Equal),
            "ne" | "neq" | "!=" | "<>" => Some(FilterOperator::NotEqual),
            "like" => Some(FilterOperator::Like),
            "notlike" | "not_like" => Some(FilterOperator::NotLike),
            "in" => Some(FilterOperator::In),
            "notin" | "not_in" => Some(FilterOperator::NotIn),
            "between" => Some(FilterOperator::Between),
            "notbetween" | "not_between" => Some(FilterOperator::NotBetween),
            "lt" | "<" => Some(FilterOperator::LessThan),
            "gt" | ">" => Some(FilterOperator::GreaterThan),
            "lte" | "<=" => Some(FilterOperator::LessThanOrEqual),
            "gte" | ">=" => Some(FilterOperator::GreaterThanOrEqual),
            "null" | "isnull" | "is_null" => Some(FilterOperator::IsNull),
            "notnull" | "isnotnull" | "is_not_null" => Some(FilterOperator::IsNotNull),
            _ => None,
        }
    }

    /// Operators whose operand is a value list
    pub fn takes_list(self) -> bool {
        matches!(
            self,
            FilterOperator::In
                | FilterOperator::NotIn
                | FilterOperator::Between
                | FilterOperator::NotBetween
        )
    }

    /// Operators that take no operand at all
    pub fn takes_no_value(self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

/// One compiled condition. `column` is always a source expression drawn
/// from the resource definition, never caller text.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: FilterOperator,
    pub value: Option<Value>,
    pub values: Vec<Value>,
}

impl Condition {
    pub fn scalar<C: Into<String>>(column: C, operator: FilterOperator, value: Value) -> Self {
        Self {
            column: column.into(),
            operator,
            value: Some(value),
            values: Vec::new(),
        }
    }

    pub fn list<C: Into<String>>(column: C, operator: FilterOperator, values: Vec<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: None,
            values,
        }
    }

    pub fn bare<C: Into<String>>(column: C, operator: FilterOperator) -> Self {
        Self {
            column: column.into(),
            operator,
            value: None,
            values: Vec::new(),
        }
    }
}

/// A node of the compiled predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Condition(Condition),
    /// Constant-false comparison; produced by an empty IN list
    AlwaysFalse,
    /// Constant-true comparison; produced by an empty NOT IN list
    AlwaysTrue,
}

/// Conjunction of predicates. AND is the only combinator; injected
/// security conjuncts can therefore only narrow what filters matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateTree {
    pub predicates: Vec<Predicate>,
}

impl PredicateTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }
}

/// A resolved relation join, rendered as `LEFT JOIN table alias ON condition`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub table: String,
    pub alias: String,
    pub condition: String,
}

/// Validated ORDER BY direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

impl OrderDirection {
    /// Parse a caller-supplied direction, case-insensitive. Anything but
    /// asc/desc is rejected by the ordering compiler.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" => Some(OrderDirection::Asc),
            "desc" => Some(OrderDirection::Desc),
            _ => None,
        }
    }
}

/// Caller-facing filter specification: `field` or `field.operator` keys
/// mapped to operand values. BTreeMap keeps compilation deterministic.
pub type FilterSpec = BTreeMap<String, Value>;

/// Ordered list of `(field, direction)` pairs. Deserialization preserves
/// the document order of the JSON object, which fixes ORDER BY priority.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderSpec {
    pub fields: Vec<(String, String)>,
}

impl OrderSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<N: Into<String>, D: Into<String>>(mut self, name: N, direction: D) -> Self {
        self.fields.push((name.into(), direction.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl From<Vec<(String, String)>> for OrderSpec {
    fn from(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }
}

impl<'de> Deserialize<'de> for OrderSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderSpecVisitor;

        impl<'de> Visitor<'de> for OrderSpecVisitor {
            type Value = OrderSpec;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of field name to sort direction")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((field, direction)) = access.next_entry::<String, String>()? {
                    fields.push((field, direction));
                }
                Ok(OrderSpec { fields })
            }
        }

        deserializer.deserialize_map(OrderSpecVisitor)
    }
}

/// Caller-facing limit/offset pagination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSpec {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageSpec {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    pub fn with_limit(limit: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
        }
    }

    /// Parse a caller-supplied JSON object, rejecting fractional and
    /// out-of-range numbers up front. Unknown keys are ignored.
    pub fn from_value(value: &Value) -> QueryResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| QueryError::invalid_pagination("pagination must be an object"))?;
        Ok(Self {
            limit: read_page_number(object.get("limit"), "limit")?,
            offset: read_page_number(object.get("offset"), "offset")?,
        })
    }
}

fn read_page_number(value: Option<&Value>, key: &str) -> QueryResult<Option<i64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => raw
            .as_i64()
            .ok_or_else(|| {
                QueryError::invalid_pagination(format!("{} must be an integer, got {}", key, raw))
            })
            .map(Some),
    }
}

/// The terminal artifact of compilation: one statement with its ordered
/// parameter list. Placeholders are `$1..$n`, matching `params` by index.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub statement: String,
    pub params: Vec<Value>,
}

impl CompiledQuery {
    pub fn new<S: Into<String>>(statement: S, params: Vec<Value>) -> Self {
        Self {
            statement: statement.into(),
            params,
        }
    }
}
