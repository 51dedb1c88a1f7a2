//! Elasticsearch-compatible implementation of the search client
//!
//! Builds `_search` aggregation bodies with `serde_json` and maps the
//! engine's bucket dictionaries into the typed result shapes of
//! [`crate::search::types`]. Any non-success response, or a body with an
//! `error` payload, aborts with `AppError::AggregationExecution`
//! carrying the engine's own diagnostics.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::SearchConfig;
use crate::error::{AppError, AppResult};
use crate::search::types::value_as_i64;
use crate::search::{
    AreaBucket, CardinalityRequest, CompositeBucket, CompositePage, CompositePageRequest,
    NestedUserAreaRequest, SearchClient, TermsLeaderboardRequest, UserAreaBuckets, UserBucket,
};

pub struct ElasticClient {
    http: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticClient {
    pub fn new(config: &SearchConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    async fn post(&self, endpoint: &str, body: Value) -> AppResult<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self.http.post(&url).json(&body);
        if let Some(ref username) = self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }
        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;
        if !status.is_success() || payload.get("error").is_some() {
            let diagnostic = payload
                .get("error")
                .map(|e| e.to_string())
                .unwrap_or_else(|| payload.to_string());
            return Err(AppError::AggregationExecution(format!(
                "{status}: {diagnostic}"
            )));
        }
        Ok(payload)
    }

    async fn search(&self, index: &str, body: Value) -> AppResult<Value> {
        self.post(&format!("{index}/_search"), body).await
    }
}

fn query_json(filters: &[crate::search::FilterPredicate]) -> Value {
    let clauses: Vec<Value> = filters.iter().map(|f| f.to_engine_json()).collect();
    json!({ "bool": { "filter": clauses } })
}

fn keyed(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn cardinality_agg(field: &str) -> Value {
    json!({ "cardinality": { "field": field } })
}

/// Wrap user-level aggs in the nested context when the user field lives
/// in nested documents.
fn maybe_nested(nested_path: Option<&str>, inner: Value) -> Value {
    match nested_path {
        Some(path) => json!({
            "recorded_by": { "nested": { "path": path }, "aggs": inner }
        }),
        None => inner,
    }
}

pub(crate) fn cardinality_body(request: &CardinalityRequest) -> Value {
    let aggs = maybe_nested(
        request.nested_path.as_deref(),
        json!({ "distinct": cardinality_agg(&request.field) }),
    );
    json!({ "size": 0, "query": query_json(&request.filters), "aggs": aggs })
}

pub(crate) fn terms_leaderboard_body(request: &TermsLeaderboardRequest) -> Value {
    // Bucket-sort pipeline: distinct metric descending, ties by
    // ascending key, with the effective skip/take window.
    let (metric_aggs, sort_path) = match request.nested_path {
        Some(_) => (
            json!({
                "observations": {
                    "reverse_nested": {},
                    "aggs": { "species_count": cardinality_agg(&request.metric_field) }
                }
            }),
            "observations>species_count",
        ),
        None => (
            json!({ "species_count": cardinality_agg(&request.metric_field) }),
            "species_count",
        ),
    };
    let mut user_aggs = metric_aggs;
    user_aggs["window"] = json!({
        "bucket_sort": {
            "sort": [
                keyed(sort_path, json!({ "order": "desc" })),
                { "_key": { "order": "asc" } }
            ],
            "from": request.from,
            "size": request.size
        }
    });
    let aggs = maybe_nested(
        request.nested_path.as_deref(),
        json!({
            "users": {
                "terms": { "field": request.user_field, "size": request.max_buckets },
                "aggs": user_aggs
            }
        }),
    );
    json!({ "size": 0, "query": query_json(&request.filters), "aggs": aggs })
}

pub(crate) fn composite_body(request: &CompositePageRequest) -> Value {
    let sources: Vec<Value> = request
        .sources
        .iter()
        .map(|source| {
            keyed(
                &source.key,
                json!({
                    "terms": { "field": source.field, "order": source.order.as_str() }
                }),
            )
        })
        .collect();
    let mut composite = json!({ "size": request.size, "sources": sources });
    if let Some(ref after) = request.after {
        composite["after"] = serde_json::to_value(after).unwrap_or(Value::Null);
    }
    json!({
        "size": 0,
        "query": query_json(&request.filters),
        "aggs": {
            "composite_buckets": {
                "composite": composite,
                "aggs": { "species_count": cardinality_agg(&request.metric_field) }
            }
        }
    })
}

pub(crate) fn user_area_body(request: &NestedUserAreaRequest) -> Value {
    let area_aggs = json!({
        "species_count": cardinality_agg(&request.metric_field),
        "areas": {
            "terms": { "field": request.area_field, "size": request.max_areas_per_user },
            "aggs": { "species_count": cardinality_agg(&request.metric_field) }
        }
    });
    let user_aggs = match request.nested_path {
        // Back to the observation level before computing any metric.
        Some(_) => json!({ "observations": { "reverse_nested": {}, "aggs": area_aggs } }),
        None => area_aggs,
    };
    let aggs = maybe_nested(
        request.nested_path.as_deref(),
        json!({
            "users": {
                "terms": { "field": request.user_field, "size": request.max_users },
                "aggs": user_aggs
            }
        }),
    );
    json!({ "size": 0, "query": query_json(&request.filters), "aggs": aggs })
}

fn missing(context: &str) -> AppError {
    AppError::AggregationExecution(format!("engine response missing '{context}'"))
}

fn node<'v>(value: &'v Value, path: &[&str]) -> AppResult<&'v Value> {
    let mut current = value;
    for key in path {
        current = current.get(key).ok_or_else(|| missing(&path.join(".")))?;
    }
    Ok(current)
}

fn i64_node(value: &Value, path: &[&str]) -> AppResult<i64> {
    let leaf = node(value, path)?;
    leaf.as_i64()
        .or_else(|| leaf.as_f64().map(|f| f as i64))
        .ok_or_else(|| missing(&path.join(".")))
}

fn key_i64(bucket: &Value) -> AppResult<i64> {
    bucket
        .get("key")
        .and_then(value_as_i64)
        .ok_or_else(|| missing("bucket key"))
}

fn key_string(bucket: &Value) -> AppResult<String> {
    match bucket.get("key") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(missing("bucket key")),
    }
}

fn buckets<'v>(value: &'v Value, path: &[&str]) -> AppResult<&'v Vec<Value>> {
    node(value, path)?
        .as_array()
        .ok_or_else(|| missing(&path.join(".")))
}

pub(crate) fn parse_leaderboard(
    response: &Value,
    nested: bool,
) -> AppResult<Vec<UserBucket>> {
    let path: &[&str] = if nested {
        &["aggregations", "recorded_by", "users", "buckets"]
    } else {
        &["aggregations", "users", "buckets"]
    };
    let mut out = Vec::new();
    for bucket in buckets(response, path)? {
        let (doc_count, metric) = if nested {
            (
                i64_node(bucket, &["observations", "doc_count"])?,
                i64_node(bucket, &["observations", "species_count", "value"])?,
            )
        } else {
            (
                i64_node(bucket, &["doc_count"])?,
                i64_node(bucket, &["species_count", "value"])?,
            )
        };
        out.push(UserBucket {
            user_id: key_i64(bucket)?,
            doc_count,
            metric,
        });
    }
    Ok(out)
}

pub(crate) fn parse_composite_page(response: &Value) -> AppResult<CompositePage> {
    let root = node(response, &["aggregations", "composite_buckets"])?;
    let mut out = Vec::new();
    for bucket in buckets(root, &["buckets"])? {
        let keys = bucket
            .get("key")
            .and_then(Value::as_object)
            .ok_or_else(|| missing("composite bucket key"))?;
        out.push(CompositeBucket {
            keys: keys.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            doc_count: i64_node(bucket, &["doc_count"])?,
            metric: i64_node(bucket, &["species_count", "value"])?,
        });
    }
    let after = match root.get("after_key") {
        Some(after) => Some(
            serde_json::from_value(after.clone())
                .map_err(|e| AppError::AggregationExecution(format!("malformed after_key: {e}")))?,
        ),
        None => None,
    };
    Ok(CompositePage { buckets: out, after })
}

pub(crate) fn parse_user_area_buckets(
    response: &Value,
    nested: bool,
) -> AppResult<Vec<UserAreaBuckets>> {
    let path: &[&str] = if nested {
        &["aggregations", "recorded_by", "users", "buckets"]
    } else {
        &["aggregations", "users", "buckets"]
    };
    let mut out = Vec::new();
    for bucket in buckets(response, path)? {
        // With a nested user source, per-observation values live behind
        // the reverse-nested node.
        let observation_level = if nested {
            node(bucket, &["observations"])?
        } else {
            bucket
        };
        let mut areas = Vec::new();
        for area in buckets(observation_level, &["areas", "buckets"])? {
            areas.push(AreaBucket {
                feature_id: key_string(area)?,
                doc_count: i64_node(area, &["doc_count"])?,
                metric: i64_node(area, &["species_count", "value"])?,
            });
        }
        out.push(UserAreaBuckets {
            user_id: key_i64(bucket)?,
            doc_count: i64_node(observation_level, &["doc_count"])?,
            metric: i64_node(observation_level, &["species_count", "value"])?,
            areas,
        });
    }
    Ok(out)
}

#[async_trait]
impl SearchClient for ElasticClient {
    async fn cardinality(&self, request: CardinalityRequest) -> AppResult<i64> {
        let response = self
            .search(&request.index, cardinality_body(&request))
            .await?;
        if request.nested_path.is_some() {
            i64_node(&response, &["aggregations", "recorded_by", "distinct", "value"])
        } else {
            i64_node(&response, &["aggregations", "distinct", "value"])
        }
    }

    async fn terms_leaderboard(
        &self,
        request: TermsLeaderboardRequest,
    ) -> AppResult<Vec<UserBucket>> {
        let nested = request.nested_path.is_some();
        let response = self
            .search(&request.index, terms_leaderboard_body(&request))
            .await?;
        parse_leaderboard(&response, nested)
    }

    async fn composite_page(&self, request: CompositePageRequest) -> AppResult<CompositePage> {
        let response = self.search(&request.index, composite_body(&request)).await?;
        parse_composite_page(&response)
    }

    async fn user_area_buckets(
        &self,
        request: NestedUserAreaRequest,
    ) -> AppResult<Vec<UserAreaBuckets>> {
        let nested = request.nested_path.is_some();
        let response = self.search(&request.index, user_area_body(&request)).await?;
        parse_user_area_buckets(&response, nested)
    }
}
