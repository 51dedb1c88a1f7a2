//! Statistics repository over the processed observation index
//!
//! The processed index stores recorded-by users as nested documents, so
//! user filtering goes through a nested-path terms criterion and
//! user-level metrics are computed behind a reverse-nested step.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{pin_mut, TryStreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::models::{
    resolve_paging, PagedResult, SpeciesCountUserStatisticsQuery, UserStatisticsItem,
};
use crate::repository::{merge, user_id_from_key};
use crate::search::query_builder::{to_processed_observation_query, PROCESSED_RECORDED_BY_PATH};
use crate::search::{
    CardinalityRequest, CompositeAggregationPager, CompositeSource, NestedUserAreaRequest,
    SearchClient, TermsLeaderboardRequest, MAX_AGGREGATION_BUCKETS, MAX_AREA_BUCKETS_PER_USER,
};

const TAXON_ID_FIELD: &str = "taxon.id";

const USER_KEY: &str = "userId";
const FEATURE_KEY: &str = "featureId";

fn recorded_by_id_field() -> String {
    format!("{PROCESSED_RECORDED_BY_PATH}.id")
}

/// Doc-level keyword copy of the nested recorded-by ids, maintained by
/// the indexer via `copy_to`. Composite sources cannot read values
/// inside a nested context, so composite paging buckets on this copy;
/// the nested path stays in use for filters and metric aggregations.
const RECORDED_BY_ID_DOC_FIELD: &str = "artportalenInternal.occurrenceRecordedByIds";

#[derive(Clone)]
pub struct ProcessedObservationStatisticsRepository {
    client: Arc<dyn SearchClient>,
    index: String,
    composite_page_size: usize,
}

impl ProcessedObservationStatisticsRepository {
    pub fn new(client: Arc<dyn SearchClient>, index: String, composite_page_size: usize) -> Self {
        Self {
            client,
            index,
            composite_page_size,
        }
    }

    /// Species-count leaderboard over the processed index. Same flow as
    /// the flat variant, with the user terms aggregation running inside
    /// the nested recorded-by context.
    pub async fn paged_species_count_search(
        &self,
        filter: &SpeciesCountUserStatisticsQuery,
        skip: Option<usize>,
        take: Option<usize>,
        cancel: &CancellationToken,
    ) -> AppResult<PagedResult<UserStatisticsItem>> {
        let filters = to_processed_observation_query(filter);

        let total_count = self
            .client
            .cardinality(CardinalityRequest {
                index: self.index.clone(),
                filters: filters.clone(),
                field: recorded_by_id_field(),
                nested_path: Some(PROCESSED_RECORDED_BY_PATH.to_string()),
            })
            .await?;
        let total_count = usize::try_from(total_count).unwrap_or(0);

        let (skip, take) = resolve_paging(skip, take, total_count);
        if take == 0 {
            return Ok(PagedResult::new(skip, take, total_count, vec![]));
        }

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let buckets = self
            .client
            .terms_leaderboard(TermsLeaderboardRequest {
                index: self.index.clone(),
                filters,
                user_field: recorded_by_id_field(),
                nested_path: Some(PROCESSED_RECORDED_BY_PATH.to_string()),
                metric_field: TAXON_ID_FIELD.to_string(),
                from: skip,
                size: take,
                max_buckets: MAX_AGGREGATION_BUCKETS,
            })
            .await?;

        let records = buckets
            .into_iter()
            .map(|bucket| {
                Ok(UserStatisticsItem {
                    user_id: user_id_from_key(bucket.user_id)?,
                    observation_count: bucket.doc_count,
                    species_count: bucket.metric,
                    species_count_by_feature_id: None,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PagedResult::new(skip, take, total_count, records))
    }

    /// Single-dimension pass over the nested recorded-by id.
    pub async fn species_count_search(
        &self,
        filter: &SpeciesCountUserStatisticsQuery,
        cancel: &CancellationToken,
    ) -> AppResult<HashMap<i32, UserStatisticsItem>> {
        let filters = to_processed_observation_query(filter);

        let pager = CompositeAggregationPager::new(
            self.client.as_ref(),
            &self.index,
            self.composite_page_size,
        );
        let stream = pager.page_all(
            filters,
            vec![CompositeSource::asc(USER_KEY, RECORDED_BY_ID_DOC_FIELD)],
            TAXON_ID_FIELD.to_string(),
            cancel.clone(),
        );
        pin_mut!(stream);

        let mut acc = HashMap::new();
        while let Some(bucket) = stream.try_next().await? {
            let user_id = bucket
                .key_i64(USER_KEY)
                .ok_or_else(|| AppError::Internal("composite bucket missing user key".into()))?;
            merge::fold_user_bucket(&mut acc, user_id_from_key(user_id)?, bucket.doc_count, bucket.metric);
        }
        Ok(acc)
    }

    /// Area breakdown in one request: nested user terms, reverse-nested
    /// back to the observation level for the area terms and both
    /// distinct-taxon metrics. The user-level metric is the cross-area
    /// distinct count, read as-is, never recomputed from area buckets.
    pub async fn area_species_count_search(
        &self,
        filter: &SpeciesCountUserStatisticsQuery,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<UserStatisticsItem>> {
        let area_field = Self::area_field(filter)?;
        let filters = to_processed_observation_query(filter);

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let buckets = self
            .client
            .user_area_buckets(NestedUserAreaRequest {
                index: self.index.clone(),
                filters,
                user_field: recorded_by_id_field(),
                nested_path: Some(PROCESSED_RECORDED_BY_PATH.to_string()),
                area_field: area_field.to_string(),
                metric_field: TAXON_ID_FIELD.to_string(),
                max_users: MAX_AGGREGATION_BUCKETS,
                max_areas_per_user: MAX_AREA_BUCKETS_PER_USER,
            })
            .await?;

        let items = buckets
            .into_iter()
            .map(|bucket| {
                let mut by_feature = HashMap::with_capacity(bucket.areas.len());
                for area in bucket.areas {
                    by_feature.insert(area.feature_id, area.metric);
                }
                Ok(UserStatisticsItem {
                    user_id: user_id_from_key(bucket.user_id)?,
                    observation_count: bucket.doc_count,
                    species_count: bucket.metric,
                    species_count_by_feature_id: Some(by_feature),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(merge::sort_leaderboard(items))
    }

    /// Two-source composite variant for large user × area cross
    /// products, joined with an independent totals pass.
    pub async fn area_species_count_search_composite(
        &self,
        filter: &SpeciesCountUserStatisticsQuery,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<UserStatisticsItem>> {
        let area_field = Self::area_field(filter)?;
        let filters = to_processed_observation_query(filter);

        let pager = CompositeAggregationPager::new(
            self.client.as_ref(),
            &self.index,
            self.composite_page_size,
        );
        let stream = pager.page_all(
            filters,
            vec![
                CompositeSource::asc(USER_KEY, RECORDED_BY_ID_DOC_FIELD),
                CompositeSource::asc(FEATURE_KEY, area_field),
            ],
            TAXON_ID_FIELD.to_string(),
            cancel.clone(),
        );
        pin_mut!(stream);

        let mut areas = HashMap::new();
        while let Some(bucket) = stream.try_next().await? {
            let user_id = bucket
                .key_i64(USER_KEY)
                .ok_or_else(|| AppError::Internal("composite bucket missing user key".into()))?;
            let feature_id = bucket
                .key_string(FEATURE_KEY)
                .ok_or_else(|| AppError::Internal("composite bucket missing feature key".into()))?;
            merge::fold_user_area_bucket(&mut areas, user_id_from_key(user_id)?, &feature_id, bucket.metric);
        }

        let totals = self.species_count_search(filter, cancel).await?;
        Ok(merge::join_area_breakdowns(totals, areas))
    }

    fn area_field(filter: &SpeciesCountUserStatisticsQuery) -> AppResult<&'static str> {
        filter
            .area_type
            .map(|area| area.processed_observation_field())
            .ok_or_else(|| {
                AppError::Validation("areaType is required for area breakdown queries".into())
            })
    }
}
