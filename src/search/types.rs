//! Request and result types for the search-engine boundary

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Sort order for aggregation sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Declarative filter predicate, independent of the engine's native
/// query syntax. An empty predicate list means "no constraint".
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPredicate {
    /// Exact-match terms filter.
    Terms { field: String, values: Vec<Value> },
    /// Inclusive range filter; open ends are omitted.
    Range {
        field: String,
        gte: Option<Value>,
        lte: Option<Value>,
    },
    /// Terms filter on a field inside a nested document path.
    NestedTerms {
        path: String,
        field: String,
        values: Vec<Value>,
    },
}

impl FilterPredicate {
    /// Render into the engine's bool-filter clause.
    pub fn to_engine_json(&self) -> Value {
        fn keyed(key: &str, value: Value) -> Value {
            let mut map = serde_json::Map::new();
            map.insert(key.to_string(), value);
            Value::Object(map)
        }

        match self {
            FilterPredicate::Terms { field, values } => {
                json!({ "terms": keyed(field, json!(values)) })
            }
            FilterPredicate::Range { field, gte, lte } => {
                let mut bounds = serde_json::Map::new();
                if let Some(gte) = gte {
                    bounds.insert("gte".to_string(), gte.clone());
                }
                if let Some(lte) = lte {
                    bounds.insert("lte".to_string(), lte.clone());
                }
                json!({ "range": keyed(field, Value::Object(bounds)) })
            }
            FilterPredicate::NestedTerms {
                path,
                field,
                values,
            } => {
                json!({
                    "nested": {
                        "path": path,
                        "query": { "terms": keyed(field, json!(values)) }
                    }
                })
            }
        }
    }
}

/// Opaque after-key cursor returned by a composite aggregation.
///
/// Threaded verbatim into the next page request; never constructed or
/// inspected by this subsystem. Field order is significant for the
/// engine, hence the ordered map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeCursor(IndexMap<String, Value>);

/// One source of a composite aggregation: output key, index field and
/// sort order. Source order is pagination-significant.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSource {
    pub key: String,
    pub field: String,
    pub order: SortOrder,
}

impl CompositeSource {
    /// Ascending terms source, the ordering the after-key protocol
    /// resumes on.
    pub fn asc(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field: field.into(),
            order: SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardinalityRequest {
    pub index: String,
    pub filters: Vec<FilterPredicate>,
    pub field: String,
    /// Nested document path containing `field`, if any.
    pub nested_path: Option<String>,
}

/// Flat terms aggregation on the user field with a distinct-taxon
/// cardinality sub-aggregation, bucket-sorted by that cardinality
/// descending (ties by ascending key) with a from/size window.
#[derive(Debug, Clone, PartialEq)]
pub struct TermsLeaderboardRequest {
    pub index: String,
    pub filters: Vec<FilterPredicate>,
    pub user_field: String,
    /// Nested document path containing `user_field`, if any. Metrics are
    /// then computed behind a reverse-nested step.
    pub nested_path: Option<String>,
    pub metric_field: String,
    pub from: usize,
    pub size: usize,
    /// Candidate bucket bound; must cover the whole user universe.
    pub max_buckets: usize,
}

/// One page of a composite aggregation request. Source fields must be
/// doc-level; composite sources cannot read nested-mapped fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositePageRequest {
    pub index: String,
    pub filters: Vec<FilterPredicate>,
    pub sources: Vec<CompositeSource>,
    pub metric_field: String,
    pub size: usize,
    /// Cursor from the previous page; `None` starts from the beginning.
    pub after: Option<CompositeCursor>,
}

/// Doubly-nested user → area terms aggregation with per-level distinct
/// metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedUserAreaRequest {
    pub index: String,
    pub filters: Vec<FilterPredicate>,
    pub user_field: String,
    /// Nested document path containing `user_field`, if any.
    pub nested_path: Option<String>,
    pub area_field: String,
    pub metric_field: String,
    pub max_users: usize,
    pub max_areas_per_user: usize,
}

/// Bucket of the flat user leaderboard aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct UserBucket {
    pub user_id: i64,
    pub doc_count: i64,
    /// Distinct metric value for this user (complete, not summable).
    pub metric: i64,
}

/// Bucket of a composite aggregation page. Key values appear in source
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeBucket {
    pub keys: IndexMap<String, Value>,
    pub doc_count: i64,
    pub metric: i64,
}

impl CompositeBucket {
    pub fn key_i64(&self, key: &str) -> Option<i64> {
        self.keys.get(key).and_then(value_as_i64)
    }

    /// Key value rendered as a string; numeric keys are formatted.
    pub fn key_string(&self, key: &str) -> Option<String> {
        match self.keys.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Integer view of a bucket key that may arrive as a number or a string.
pub(crate) fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositePage {
    pub buckets: Vec<CompositeBucket>,
    /// Cursor for the next page; `None` when the engine is exhausted.
    pub after: Option<CompositeCursor>,
}

/// Area-level bucket nested under a user bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaBucket {
    pub feature_id: String,
    pub doc_count: i64,
    pub metric: i64,
}

/// User-level node of the nested user → area aggregation tree.
#[derive(Debug, Clone, PartialEq)]
pub struct UserAreaBuckets {
    pub user_id: i64,
    /// Parent-document count for the user (after reverse-nesting when
    /// the user field is nested).
    pub doc_count: i64,
    /// Cross-area distinct metric at the parent-document level. Not the
    /// sum of the per-area metrics.
    pub metric: i64,
    pub areas: Vec<AreaBucket>,
}
