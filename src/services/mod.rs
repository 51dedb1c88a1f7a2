//! Business logic services

pub mod statistics;

use crate::repository::Repository;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub statistics: statistics::StatisticsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository) -> Self {
        Self {
            statistics: statistics::StatisticsService::new(repository),
        }
    }
}
