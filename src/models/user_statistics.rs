//! User statistics models

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Derived per-user statistics over the filtered observation set.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStatisticsItem {
    pub user_id: i32,
    /// Total observations attributed to the user.
    pub observation_count: i64,
    /// Distinct taxa observed by the user over the same filtered set.
    pub species_count: i64,
    /// Distinct taxa per area feature id; present only for area-breakdown
    /// queries. Areas can share taxa, so these values do not sum to
    /// `species_count` and are never derived from it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species_count_by_feature_id: Option<HashMap<String, i64>>,
}

impl UserStatisticsItem {
    pub fn new(user_id: i32) -> Self {
        Self {
            user_id,
            observation_count: 0,
            species_count: 0,
            species_count_by_feature_id: None,
        }
    }
}

/// Area types a statistics query can filter on or break down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum AreaType {
    County,
    Municipality,
    Province,
    Parish,
}

impl AreaType {
    /// Feature-id field in the flat user-observation index.
    pub fn user_observation_field(&self) -> &'static str {
        match self {
            AreaType::County => "countyFeatureId",
            AreaType::Municipality => "municipalityFeatureId",
            AreaType::Province => "provinceFeatureId",
            AreaType::Parish => "parishFeatureId",
        }
    }

    /// Feature-id field in the processed observation index.
    pub fn processed_observation_field(&self) -> &'static str {
        match self {
            AreaType::County => "location.county.featureId",
            AreaType::Municipality => "location.municipality.featureId",
            AreaType::Province => "location.province.featureId",
            AreaType::Parish => "location.parish.featureId",
        }
    }
}

/// Immutable filter for the user statistics queries. Constructed per
/// request, translated once to index predicates, never mutated after.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesCountUserStatisticsQuery {
    /// Restrict to these taxa.
    pub taxon_ids: Option<Vec<i32>>,
    /// Earliest observation start date (inclusive).
    pub from_date: Option<NaiveDate>,
    /// Latest observation start date (inclusive).
    pub to_date: Option<NaiveDate>,
    /// Area dimension used for geographic filtering and breakdowns.
    pub area_type: Option<AreaType>,
    /// Restrict to a single area feature (requires `area_type`).
    pub feature_id: Option<String>,
    /// Explicit user-id allowlist restricting the aggregation universe.
    pub user_ids: Option<Vec<i32>>,
}
