//! Structured query contract.
//!
//! Mirrors the JSON query format accepted by the `/load` endpoint. Empty
//! collections and default offsets are omitted on the wire, so a query
//! built with only measures serializes to `{"measures": [...], "limit": 500}`.
//!
//! # Example
//!
//! ```rust
//! use cubelink_client::query::{Filter, FilterOperator, Granularity, OrderDirection, Query, TimeDimension};
//!
//! let query = Query::new()
//!     .measure("Orders.count")
//!     .dimension("Orders.status")
//!     .time_dimension(TimeDimension::relative("Orders.created_at", Granularity::Day, "last 7 days"))
//!     .filter(Filter::member("Orders.status", FilterOperator::Equals, ["completed"]))
//!     .order("Orders.count", OrderDirection::Desc)
//!     .limit(10);
//!
//! let wire = serde_json::to_value(&query).unwrap();
//! assert_eq!(wire["limit"], 10);
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default row limit.
pub const DEFAULT_LIMIT: u32 = 500;

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A query against the `/load` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Measures to compute.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<String>,

    /// Dimensions to group by.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<String>,

    /// Time dimensions to group by.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub time_dimensions: Vec<TimeDimension>,

    /// Filters to apply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,

    /// Maximum number of rows to return.
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Number of rows to skip.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub offset: u32,

    /// Ordering; key order is significant.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub order: IndexMap<String, OrderDirection>,

    /// Return raw rows instead of grouping by dimensions.
    #[serde(default, skip_serializing_if = "is_false")]
    pub ungrouped: bool,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            measures: Vec::new(),
            dimensions: Vec::new(),
            time_dimensions: Vec::new(),
            filters: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            order: IndexMap::new(),
            ungrouped: false,
        }
    }
}

impl Query {
    /// Create an empty query with the default limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a measure.
    pub fn measure(mut self, name: impl Into<String>) -> Self {
        self.measures.push(name.into());
        self
    }

    /// Add a dimension.
    pub fn dimension(mut self, name: impl Into<String>) -> Self {
        self.dimensions.push(name.into());
        self
    }

    /// Add a time dimension.
    pub fn time_dimension(mut self, time_dimension: TimeDimension) -> Self {
        self.time_dimensions.push(time_dimension);
        self
    }

    /// Add a filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the row limit.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the row offset.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Append an ordering clause. Re-ordering an existing member keeps its position.
    pub fn order(mut self, member: impl Into<String>, direction: OrderDirection) -> Self {
        self.order.insert(member.into(), direction);
        self
    }

    /// Toggle ungrouped results.
    pub fn ungrouped(mut self, ungrouped: bool) -> Self {
        self.ungrouped = ungrouped;
        self
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Time bucket size for a time dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

/// Date range for a time dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateRange {
    /// Inclusive `[start, end]` pair of ISO dates.
    Absolute(String, String),
    /// Relative expression such as `"last 7 days"` or `"yesterday"`.
    Relative(String),
}

/// A time dimension with granularity and range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeDimension {
    /// Name of the time dimension.
    pub dimension: String,
    /// Time granularity.
    pub granularity: Granularity,
    /// Range to restrict to.
    pub date_range: DateRange,
}

impl TimeDimension {
    /// Time dimension over an absolute `[start, end]` range.
    pub fn between(
        dimension: impl Into<String>,
        granularity: Granularity,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            dimension: dimension.into(),
            granularity,
            date_range: DateRange::Absolute(start.into(), end.into()),
        }
    }

    /// Time dimension over a relative range.
    pub fn relative(
        dimension: impl Into<String>,
        granularity: Granularity,
        range: impl Into<String>,
    ) -> Self {
        Self {
            dimension: dimension.into(),
            granularity,
            date_range: DateRange::Relative(range.into()),
        }
    }
}

/// Filter operators understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    Set,
    NotSet,
    InDateRange,
    NotInDateRange,
    BeforeDate,
    AfterDate,
    MeasureFilter,
}

/// Right-hand side value of a member filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Integer(value.into())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

/// A filter: either a member condition or a boolean combination of filters.
///
/// Serializes as `{"member", "operator", "values"}`, `{"and": [...]}` or
/// `{"or": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    /// All nested filters must hold.
    And { and: Vec<Filter> },
    /// At least one nested filter must hold.
    Or { or: Vec<Filter> },
    /// Condition on a single measure or dimension.
    Member {
        member: String,
        operator: FilterOperator,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        values: Vec<FilterValue>,
    },
}

impl Filter {
    /// Condition on a single member.
    pub fn member<V: Into<FilterValue>>(
        member: impl Into<String>,
        operator: FilterOperator,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::Member {
            member: member.into(),
            operator,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Conjunction of filters.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And {
            and: filters.into_iter().collect(),
        }
    }

    /// Disjunction of filters.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or {
            or: filters.into_iter().collect(),
        }
    }
}
