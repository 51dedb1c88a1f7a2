//! User statistics endpoints

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use utoipa::IntoParams;

use crate::error::{AppError, AppResult};
use crate::models::{
    AreaType, PagedResult, PagedUserStatistics, SpeciesCountUserStatisticsQuery,
    UserStatisticsItem,
};
use crate::AppState;

/// Query parameters for the user statistics endpoints. Id lists arrive
/// as comma-separated values.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserStatisticsParams {
    /// Comma-separated taxon ids to restrict to
    pub taxon_ids: Option<String>,
    /// Earliest observation start date (inclusive, YYYY-MM-DD)
    pub from_date: Option<NaiveDate>,
    /// Latest observation start date (inclusive, YYYY-MM-DD)
    pub to_date: Option<NaiveDate>,
    /// Area dimension for geographic filtering and breakdowns
    pub area_type: Option<AreaType>,
    /// Restrict to a single area feature (requires areaType)
    pub feature_id: Option<String>,
    /// Comma-separated user ids restricting the aggregation universe
    pub user_ids: Option<String>,
    /// Number of leading records to skip
    pub skip: Option<usize>,
    /// Maximum number of records to return
    pub take: Option<usize>,
    /// Aggregate over the processed observation index instead of the
    /// flat user-observation index
    #[serde(default)]
    pub use_processed_index: bool,
    /// Always use composite paging for area breakdowns
    #[serde(default)]
    pub force_composite: bool,
}

impl UserStatisticsParams {
    fn to_query(&self) -> AppResult<SpeciesCountUserStatisticsQuery> {
        Ok(SpeciesCountUserStatisticsQuery {
            taxon_ids: parse_id_list("taxonIds", self.taxon_ids.as_deref())?,
            from_date: self.from_date,
            to_date: self.to_date,
            area_type: self.area_type,
            feature_id: self.feature_id.clone(),
            user_ids: parse_id_list("userIds", self.user_ids.as_deref())?,
        })
    }
}

/// Parse a comma-separated id list. Empty or absent input means no
/// restriction; any malformed entry rejects the whole parameter.
fn parse_id_list(name: &str, raw: Option<&str>) -> AppResult<Option<Vec<i32>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<i32>()
                .map_err(|_| AppError::Validation(format!("invalid id '{part}' in {name}")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Species-count leaderboard for the filtered observation set
#[utoipa::path(
    get,
    path = "/user-statistics/species-count",
    tag = "user-statistics",
    params(UserStatisticsParams),
    responses(
        (status = 200, description = "Paged species-count leaderboard", body = PagedUserStatistics),
        (status = 400, description = "Invalid query parameters"),
        (status = 502, description = "Search engine failure")
    )
)]
pub async fn species_count(
    State(state): State<AppState>,
    Query(params): Query<UserStatisticsParams>,
) -> AppResult<Json<PagedResult<UserStatisticsItem>>> {
    let query = params.to_query()?;
    let cancel = CancellationToken::new();
    let result = state
        .services
        .statistics
        .paged_species_count(
            &query,
            params.skip,
            params.take,
            params.use_processed_index,
            &cancel,
        )
        .await?;
    Ok(Json(result))
}

/// Species-count leaderboard with a per-area breakdown
#[utoipa::path(
    get,
    path = "/user-statistics/area-species-count",
    tag = "user-statistics",
    params(UserStatisticsParams),
    responses(
        (status = 200, description = "Paged leaderboard with per-area species counts", body = PagedUserStatistics),
        (status = 400, description = "Invalid query parameters or missing areaType"),
        (status = 502, description = "Search engine failure")
    )
)]
pub async fn area_species_count(
    State(state): State<AppState>,
    Query(params): Query<UserStatisticsParams>,
) -> AppResult<Json<PagedResult<UserStatisticsItem>>> {
    let query = params.to_query()?;
    let cancel = CancellationToken::new();
    let result = state
        .services
        .statistics
        .area_species_count(
            &query,
            params.skip,
            params.take,
            params.use_processed_index,
            params.force_composite,
            &cancel,
        )
        .await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_or_blank_id_list_means_no_restriction() {
        assert_eq!(parse_id_list("userIds", None).unwrap(), None);
        assert_eq!(parse_id_list("userIds", Some("")).unwrap(), None);
        assert_eq!(parse_id_list("userIds", Some("  ")).unwrap(), None);
    }

    #[test]
    fn id_lists_tolerate_whitespace_around_entries() {
        assert_eq!(
            parse_id_list("taxonIds", Some("1, 2 ,3")).unwrap(),
            Some(vec![1, 2, 3])
        );
    }

    #[test]
    fn malformed_id_entry_rejects_the_parameter() {
        let err = parse_id_list("taxonIds", Some("1,x,3")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
