//! User statistics service

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{
    resolve_paging, PagedResult, SpeciesCountUserStatisticsQuery, UserStatisticsItem,
};
use crate::repository::Repository;
use crate::search::{MAX_AGGREGATION_BUCKETS, MAX_AREA_BUCKETS_PER_USER};

#[derive(Clone)]
pub struct StatisticsService {
    repository: Repository,
}

impl StatisticsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Species-count leaderboard, paged server-side.
    pub async fn paged_species_count(
        &self,
        query: &SpeciesCountUserStatisticsQuery,
        skip: Option<usize>,
        take: Option<usize>,
        use_processed_index: bool,
        cancel: &CancellationToken,
    ) -> AppResult<PagedResult<UserStatisticsItem>> {
        if use_processed_index {
            self.repository
                .processed_observations
                .paged_species_count_search(query, skip, take, cancel)
                .await
        } else {
            self.repository
                .user_observations
                .paged_species_count_search(query, skip, take, cancel)
                .await
        }
    }

    /// Species-count leaderboard with per-area breakdowns, paged in
    /// memory once the full leaderboard is known.
    ///
    /// Single nested request when the restricted user universe keeps the
    /// worst-case bucket count under the engine ceiling; composite
    /// paging otherwise.
    pub async fn area_species_count(
        &self,
        query: &SpeciesCountUserStatisticsQuery,
        skip: Option<usize>,
        take: Option<usize>,
        use_processed_index: bool,
        force_composite: bool,
        cancel: &CancellationToken,
    ) -> AppResult<PagedResult<UserStatisticsItem>> {
        if query.area_type.is_none() {
            return Err(AppError::Validation(
                "areaType is required for area breakdown queries".into(),
            ));
        }

        let items = if Self::fits_single_request(query) && !force_composite {
            debug!("area breakdown via single nested request");
            if use_processed_index {
                self.repository
                    .processed_observations
                    .area_species_count_search(query, cancel)
                    .await?
            } else {
                self.repository
                    .user_observations
                    .area_species_count_search(query, cancel)
                    .await?
            }
        } else {
            debug!("area breakdown via composite paging");
            if use_processed_index {
                self.repository
                    .processed_observations
                    .area_species_count_search_composite(query, cancel)
                    .await?
            } else {
                self.repository
                    .user_observations
                    .area_species_count_search_composite(query, cancel)
                    .await?
            }
        };

        let total_count = items.len();
        let (skip, take) = resolve_paging(skip, take, total_count);
        let records: Vec<_> = items.into_iter().skip(skip).take(take).collect();
        Ok(PagedResult::new(skip, take, total_count, records))
    }

    /// A single user → area request is bounded by its worst case: every
    /// requested user touching the per-user area cap.
    fn fits_single_request(query: &SpeciesCountUserStatisticsQuery) -> bool {
        match query.user_ids.as_deref() {
            Some(ids) if !ids.is_empty() => {
                ids.len() * MAX_AREA_BUCKETS_PER_USER <= MAX_AGGREGATION_BUCKETS
            }
            _ => false,
        }
    }
}
