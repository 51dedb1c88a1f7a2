//! Domain models

pub mod paging;
pub mod user_statistics;

pub use paging::{resolve_paging, PagedResult, PagedUserStatistics};
pub use user_statistics::{AreaType, SpeciesCountUserStatisticsQuery, UserStatisticsItem};
