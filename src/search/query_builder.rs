//! Translation of statistics filters into index predicates
//!
//! Pure functions: an empty or absent filter field contributes no
//! predicate, matching "no constraint". One entry point per index
//! schema.

use serde_json::{json, Value};

use crate::models::SpeciesCountUserStatisticsQuery;
use crate::search::FilterPredicate;

/// Nested document path holding the recorded-by users in the processed
/// observation index.
pub const PROCESSED_RECORDED_BY_PATH: &str = "artportalenInternal.occurrenceRecordedByInternal";

/// Add an exact-match terms criterion when ids are present and non-empty.
pub fn try_add_terms_criteria(
    filters: &mut Vec<FilterPredicate>,
    field: &str,
    ids: Option<&[i32]>,
) {
    if let Some(ids) = ids {
        if !ids.is_empty() {
            filters.push(FilterPredicate::Terms {
                field: field.to_string(),
                values: ids.iter().map(|id| json!(id)).collect(),
            });
        }
    }
}

/// Add a nested-path terms criterion when ids are present and non-empty.
pub fn try_add_nested_terms_criteria(
    filters: &mut Vec<FilterPredicate>,
    path: &str,
    field: &str,
    ids: Option<&[i32]>,
) {
    if let Some(ids) = ids {
        if !ids.is_empty() {
            filters.push(FilterPredicate::NestedTerms {
                path: path.to_string(),
                field: field.to_string(),
                values: ids.iter().map(|id| json!(id)).collect(),
            });
        }
    }
}

fn try_add_date_range(
    filters: &mut Vec<FilterPredicate>,
    field: &str,
    from: Option<chrono::NaiveDate>,
    to: Option<chrono::NaiveDate>,
) {
    if from.is_none() && to.is_none() {
        return;
    }
    filters.push(FilterPredicate::Range {
        field: field.to_string(),
        gte: from.map(|d| json!(d.to_string())),
        lte: to.map(|d| json!(d.to_string())),
    });
}

fn try_add_feature_criteria(
    filters: &mut Vec<FilterPredicate>,
    field: Option<&str>,
    feature_id: Option<&str>,
) {
    if let (Some(field), Some(feature_id)) = (field, feature_id) {
        filters.push(FilterPredicate::Terms {
            field: field.to_string(),
            values: vec![Value::String(feature_id.to_string())],
        });
    }
}

/// Predicates for the flat user-observation index.
pub fn to_user_observation_query(
    query: &SpeciesCountUserStatisticsQuery,
) -> Vec<FilterPredicate> {
    let mut filters = Vec::new();
    try_add_terms_criteria(&mut filters, "taxonId", query.taxon_ids.as_deref());
    try_add_date_range(&mut filters, "startDate", query.from_date, query.to_date);
    try_add_feature_criteria(
        &mut filters,
        query.area_type.map(|a| a.user_observation_field()),
        query.feature_id.as_deref(),
    );
    try_add_terms_criteria(&mut filters, "userId", query.user_ids.as_deref());
    filters
}

/// Predicates for the processed observation index. User restrictions go
/// through the nested recorded-by path.
pub fn to_processed_observation_query(
    query: &SpeciesCountUserStatisticsQuery,
) -> Vec<FilterPredicate> {
    let mut filters = Vec::new();
    try_add_terms_criteria(&mut filters, "taxon.id", query.taxon_ids.as_deref());
    try_add_date_range(
        &mut filters,
        "event.startDate",
        query.from_date,
        query.to_date,
    );
    try_add_feature_criteria(
        &mut filters,
        query.area_type.map(|a| a.processed_observation_field()),
        query.feature_id.as_deref(),
    );
    try_add_nested_terms_criteria(
        &mut filters,
        PROCESSED_RECORDED_BY_PATH,
        &format!("{PROCESSED_RECORDED_BY_PATH}.id"),
        query.user_ids.as_deref(),
    );
    filters
}
