//! Search-engine boundary
//!
//! The statistics engine treats the search cluster as a black-box
//! query/aggregation executor behind the [`SearchClient`] trait. One
//! typed method per aggregation shape replaces stringly-typed bucket
//! dictionary lookups; the composite after-key cursor stays opaque.

pub mod elastic;
pub mod pager;
pub mod query_builder;
pub mod types;

pub use elastic::ElasticClient;
pub use pager::CompositeAggregationPager;
pub use types::{
    AreaBucket, CardinalityRequest, CompositeBucket, CompositeCursor, CompositePage,
    CompositePageRequest, CompositeSource, FilterPredicate, NestedUserAreaRequest, SortOrder,
    TermsLeaderboardRequest, UserAreaBuckets, UserBucket,
};

use async_trait::async_trait;

use crate::error::AppResult;

/// Engine-imposed ceiling on buckets a single aggregation may return.
pub const MAX_AGGREGATION_BUCKETS: usize = 65_535;

/// Default composite aggregation page size (buckets per request).
pub const DEFAULT_COMPOSITE_PAGE_SIZE: usize = 1_000;

/// Upper bound on distinct areas a single user can plausibly span; used
/// when sizing nested area sub-aggregations and when deciding whether a
/// user universe fits a single nested request.
pub const MAX_AREA_BUCKETS_PER_USER: usize = 1_000;

/// Black-box query/aggregation executor.
///
/// Every method is a single engine round-trip. Invalid engine responses
/// surface as [`crate::error::AppError::AggregationExecution`] carrying
/// the engine's diagnostic payload.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Distinct-value count of a field over the filtered document set.
    async fn cardinality(&self, request: CardinalityRequest) -> AppResult<i64>;

    /// Flat terms aggregation on the user field with a distinct-taxon
    /// metric, sorted server-side by that metric (bucket-sort with
    /// from/size).
    async fn terms_leaderboard(
        &self,
        request: TermsLeaderboardRequest,
    ) -> AppResult<Vec<UserBucket>>;

    /// One page of a composite aggregation with a distinct-metric
    /// sub-aggregation. Source fields must live at the document level:
    /// the engine's composite sources do not see values inside nested
    /// contexts, so a nested-mapped source field silently produces zero
    /// buckets.
    async fn composite_page(&self, request: CompositePageRequest) -> AppResult<CompositePage>;

    /// Doubly-nested user → area terms aggregation with per-level
    /// distinct metrics.
    async fn user_area_buckets(
        &self,
        request: NestedUserAreaRequest,
    ) -> AppResult<Vec<UserAreaBuckets>>;
}
