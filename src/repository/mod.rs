//! Repository layer for search-index statistics queries

pub mod merge;
pub mod processed_observations;
pub mod user_observations;

use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::{AppError, AppResult};
use crate::search::SearchClient;

/// Engine bucket keys arrive as i64; user ids in this system are i32.
/// An out-of-range key means the index holds data this system cannot
/// represent, which is an engine-data defect, not something to truncate.
pub(crate) fn user_id_from_key(key: i64) -> AppResult<i32> {
    i32::try_from(key)
        .map_err(|_| AppError::AggregationExecution(format!("user id {key} out of i32 range")))
}

/// Main repository struct holding the shared search client
#[derive(Clone)]
pub struct Repository {
    pub user_observations: user_observations::UserObservationStatisticsRepository,
    pub processed_observations: processed_observations::ProcessedObservationStatisticsRepository,
}

impl Repository {
    /// Create a new repository with the given search client
    pub fn new(client: Arc<dyn SearchClient>, config: &SearchConfig) -> Self {
        Self {
            user_observations: user_observations::UserObservationStatisticsRepository::new(
                client.clone(),
                config.user_observation_index.clone(),
                config.composite_page_size,
            ),
            processed_observations:
                processed_observations::ProcessedObservationStatisticsRepository::new(
                    client,
                    config.processed_observation_index.clone(),
                    config.composite_page_size,
                ),
        }
    }
}
