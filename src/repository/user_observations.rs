//! Statistics repository over the flat user-observation index

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{pin_mut, TryStreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::models::{
    resolve_paging, PagedResult, SpeciesCountUserStatisticsQuery, UserStatisticsItem,
};
use crate::repository::{merge, user_id_from_key};
use crate::search::query_builder::to_user_observation_query;
use crate::search::{
    CardinalityRequest, CompositeAggregationPager, CompositeSource, FilterPredicate,
    NestedUserAreaRequest, SearchClient, TermsLeaderboardRequest, MAX_AGGREGATION_BUCKETS,
    MAX_AREA_BUCKETS_PER_USER,
};

const USER_ID_FIELD: &str = "userId";
const TAXON_ID_FIELD: &str = "taxonId";

/// Composite source keys; also the after-key field names the engine
/// echoes back.
const USER_KEY: &str = "userId";
const FEATURE_KEY: &str = "featureId";

#[derive(Clone)]
pub struct UserObservationStatisticsRepository {
    client: Arc<dyn SearchClient>,
    index: String,
    composite_page_size: usize,
}

impl UserObservationStatisticsRepository {
    pub fn new(client: Arc<dyn SearchClient>, index: String, composite_page_size: usize) -> Self {
        Self {
            client,
            index,
            composite_page_size,
        }
    }

    /// Species-count leaderboard with server-side bucket-sort paging.
    ///
    /// The true user universe size comes from a separate cardinality
    /// query; skip/take are clamped against it before the bucket-sorted
    /// terms aggregation runs with the effective window.
    pub async fn paged_species_count_search(
        &self,
        filter: &SpeciesCountUserStatisticsQuery,
        skip: Option<usize>,
        take: Option<usize>,
        cancel: &CancellationToken,
    ) -> AppResult<PagedResult<UserStatisticsItem>> {
        let filters = to_user_observation_query(filter);

        let total_count = self
            .client
            .cardinality(CardinalityRequest {
                index: self.index.clone(),
                filters: filters.clone(),
                field: USER_ID_FIELD.to_string(),
                nested_path: None,
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
                user_field: USER_ID_FIELD.to_string(),
                nested_path: None,
                metric_field: TAXON_ID_FIELD.to_string(),
                from: skip,
                size: take,
                max_buckets: MAX_AGGREGATION_BUCKETS,
            })
            .await?;

        // Buckets arrive sorted by the engine: metric desc, key asc.
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

    /// Single-dimension pass: true per-user totals via the composite
    /// pager over the sole `userId` source.
    pub async fn species_count_search(
        &self,
        filter: &SpeciesCountUserStatisticsQuery,
        cancel: &CancellationToken,
    ) -> AppResult<HashMap<i32, UserStatisticsItem>> {
        let filters = to_user_observation_query(filter);

        let sources = vec![CompositeSource::asc(USER_KEY, USER_ID_FIELD)];
        let mut acc = HashMap::new();
        self.fold_composite(filters, sources, cancel, |bucket, acc| {
            let user_id = bucket
                .key_i64(USER_KEY)
                .ok_or_else(|| AppError::Internal("composite bucket missing user key".into()))?;
            merge::fold_user_bucket(acc, user_id_from_key(user_id)?, bucket.doc_count, bucket.metric);
            Ok(())
        }, &mut acc)
        .await?;
        Ok(acc)
    }

    /// Area breakdown in one nested user → area request. Only usable
    /// when the restricted user universe keeps the bucket count under
    /// the engine ceiling.
    pub async fn area_species_count_search(
        &self,
        filter: &SpeciesCountUserStatisticsQuery,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<UserStatisticsItem>> {
        let area_field = Self::area_field(filter)?;
        let filters = to_user_observation_query(filter);

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let buckets = self
            .client
            .user_area_buckets(NestedUserAreaRequest {
                index: self.index.clone(),
                filters,
                user_field: USER_ID_FIELD.to_string(),
                nested_path: None,
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
                    // Cross-area distinct metric, not a per-area sum.
                    species_count: bucket.metric,
                    species_count_by_feature_id: Some(by_feature),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(merge::sort_leaderboard(items))
    }

    /// Area breakdown via two-source composite paging, for universes too
    /// large for a single nested request. Per-user totals come from an
    /// independent single-dimension pass joined by user id.
    pub async fn area_species_count_search_composite(
        &self,
        filter: &SpeciesCountUserStatisticsQuery,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<UserStatisticsItem>> {
        let area_field = Self::area_field(filter)?;
        let filters = to_user_observation_query(filter);

        let sources = vec![
            CompositeSource::asc(USER_KEY, USER_ID_FIELD),
            CompositeSource::asc(FEATURE_KEY, area_field),
        ];
        let mut areas = HashMap::new();
        self.fold_composite(filters, sources, cancel, |bucket, acc| {
            let user_id = bucket
                .key_i64(USER_KEY)
                .ok_or_else(|| AppError::Internal("composite bucket missing user key".into()))?;
            let feature_id = bucket.key_string(FEATURE_KEY).ok_or_else(|| {
                AppError::Internal("composite bucket missing feature key".into())
            })?;
            merge::fold_user_area_bucket(acc, user_id_from_key(user_id)?, &feature_id, bucket.metric);
            Ok(())
        }, &mut areas)
        .await?;

        let totals = self.species_count_search(filter, cancel).await?;
        Ok(merge::join_area_breakdowns(totals, areas))
    }

    async fn fold_composite<F>(
        &self,
        filters: Vec<FilterPredicate>,
        sources: Vec<CompositeSource>,
        cancel: &CancellationToken,
        mut fold: F,
        acc: &mut HashMap<i32, UserStatisticsItem>,
    ) -> AppResult<()>
    where
        F: FnMut(crate::search::CompositeBucket, &mut HashMap<i32, UserStatisticsItem>) -> AppResult<()>,
    {
        let pager = CompositeAggregationPager::new(
            self.client.as_ref(),
            &self.index,
            self.composite_page_size,
        );
        let stream = pager.page_all(filters, sources, TAXON_ID_FIELD.to_string(), cancel.clone());
        pin_mut!(stream);
        while let Some(bucket) = stream.try_next().await? {
            fold(bucket, acc)?;
        }
        Ok(())
    }

    fn area_field(filter: &SpeciesCountUserStatisticsQuery) -> AppResult<&'static str> {
        filter
            .area_type
            .map(|area| area.user_observation_field())
            .ok_or_else(|| {
                AppError::Validation("areaType is required for area breakdown queries".into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    use crate::models::AreaType;
    use crate::search::{
        AreaBucket, CompositeBucket, CompositePage, MockSearchClient, UserAreaBuckets, UserBucket,
    };

    fn repo(client: MockSearchClient) -> UserObservationStatisticsRepository {
        UserObservationStatisticsRepository::new(
            Arc::new(client),
            "user-observation".to_string(),
            1000,
        )
    }

    fn user_bucket(user_id: i64, doc_count: i64, metric: i64) -> CompositeBucket {
        let mut keys = IndexMap::new();
        keys.insert(USER_KEY.to_string(), json!(user_id));
        CompositeBucket {
            keys,
            doc_count,
            metric,
        }
    }

    fn user_area_bucket(user_id: i64, feature: &str, doc_count: i64, metric: i64) -> CompositeBucket {
        let mut keys = IndexMap::new();
        keys.insert(USER_KEY.to_string(), json!(user_id));
        keys.insert(FEATURE_KEY.to_string(), json!(feature));
        CompositeBucket {
            keys,
            doc_count,
            metric,
        }
    }

    #[tokio::test]
    async fn leaderboard_keeps_engine_order_and_true_total() {
        let mut client = MockSearchClient::new();
        client.expect_cardinality().returning(|_| Ok(3));
        client
            .expect_terms_leaderboard()
            .withf(|req| req.from == 0 && req.size == 3)
            .returning(|_| {
                Ok(vec![
                    UserBucket { user_id: 5, doc_count: 10, metric: 4 },
                    UserBucket { user_id: 9, doc_count: 7, metric: 4 },
                    UserBucket { user_id: 2, doc_count: 3, metric: 3 },
                ])
            });

        let page = repo(client)
            .paged_species_count_search(
                &SpeciesCountUserStatisticsQuery::default(),
                None,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(page.total_count, 3);
        assert_eq!(page.count, 3);
        let ids: Vec<i32> = page.records.iter().map(|r| r.user_id).collect();
        assert_eq!(ids, vec![5, 9, 2]);
        assert_eq!(page.records[0].species_count, 4);
        assert_eq!(page.records[0].observation_count, 10);
        assert!(page.records[0].species_count_by_feature_id.is_none());
    }

    #[tokio::test]
    async fn skip_beyond_total_returns_empty_without_querying_buckets() {
        let mut client = MockSearchClient::new();
        client.expect_cardinality().returning(|_| Ok(3));
        // No terms_leaderboard expectation: a call would panic.

        let page = repo(client)
            .paged_species_count_search(
                &SpeciesCountUserStatisticsQuery::default(),
                Some(10),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(page.total_count, 3);
        assert_eq!(page.skip, 3);
        assert_eq!(page.take, 0);
        assert!(page.records.is_empty());
    }

    #[tokio::test]
    async fn empty_universe_yields_zero_total_and_no_records() {
        let mut client = MockSearchClient::new();
        client.expect_cardinality().returning(|_| Ok(0));

        let page = repo(client)
            .paged_species_count_search(
                &SpeciesCountUserStatisticsQuery::default(),
                None,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(page.total_count, 0);
        assert!(page.records.is_empty());
    }

    #[tokio::test]
    async fn engine_failure_surfaces_without_partial_records() {
        let mut client = MockSearchClient::new();
        client
            .expect_cardinality()
            .returning(|_| Err(AppError::AggregationExecution("engine unavailable".into())));

        let result = repo(client)
            .paged_species_count_search(
                &SpeciesCountUserStatisticsQuery::default(),
                None,
                None,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(AppError::AggregationExecution(_))));
    }

    #[tokio::test]
    async fn cancelled_request_aborts_before_the_bucket_query() {
        let mut client = MockSearchClient::new();
        client.expect_cardinality().returning(|_| Ok(3));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = repo(client)
            .paged_species_count_search(
                &SpeciesCountUserStatisticsQuery::default(),
                None,
                None,
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn single_request_area_search_reads_the_cross_area_metric_as_is() {
        let mut client = MockSearchClient::new();
        client
            .expect_user_area_buckets()
            .withf(|req| req.area_field == "provinceFeatureId")
            .returning(|_| {
                Ok(vec![UserAreaBuckets {
                    user_id: 5,
                    doc_count: 12,
                    metric: 4,
                    areas: vec![
                        AreaBucket { feature_id: "A".into(), doc_count: 8, metric: 2 },
                        AreaBucket { feature_id: "B".into(), doc_count: 4, metric: 3 },
                    ],
                }])
            });

        let query = SpeciesCountUserStatisticsQuery {
            area_type: Some(AreaType::Province),
            user_ids: Some(vec![5]),
            ..Default::default()
        };
        let items = repo(client)
            .area_species_count_search(&query, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].user_id, 5);
        assert_eq!(items[0].observation_count, 12);
        // Cross-area distinct count, not 2 + 3.
        assert_eq!(items[0].species_count, 4);
        let by_feature = items[0].species_count_by_feature_id.as_ref().unwrap();
        assert_eq!(by_feature.get("A"), Some(&2));
        assert_eq!(by_feature.get("B"), Some(&3));
    }

    #[tokio::test]
    async fn area_search_without_area_type_is_a_validation_error() {
        let client = MockSearchClient::new();
        let result = repo(client)
            .area_species_count_search(
                &SpeciesCountUserStatisticsQuery::default(),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn composite_area_search_joins_breakdowns_with_true_totals() {
        let mut client = MockSearchClient::new();
        client.expect_composite_page().returning(|req| {
            if req.sources.len() == 2 {
                // (user, area) pass
                Ok(CompositePage {
                    buckets: vec![
                        user_area_bucket(5, "A", 8, 2),
                        user_area_bucket(5, "B", 4, 3),
                    ],
                    after: None,
                })
            } else {
                // single-dimension totals pass
                Ok(CompositePage {
                    buckets: vec![user_bucket(5, 12, 4)],
                    after: None,
                })
            }
        });

        let query = SpeciesCountUserStatisticsQuery {
            area_type: Some(AreaType::Province),
            ..Default::default()
        };
        let items = repo(client)
            .area_species_count_search_composite(&query, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].user_id, 5);
        assert_eq!(items[0].observation_count, 12);
        assert_eq!(items[0].species_count, 4);
        let by_feature = items[0].species_count_by_feature_id.as_ref().unwrap();
        assert_eq!(by_feature.len(), 2);
        assert_eq!(by_feature.get("A"), Some(&2));
        assert_eq!(by_feature.get("B"), Some(&3));
    }

    #[tokio::test]
    async fn out_of_range_leaderboard_user_key_is_an_engine_data_error() {
        let mut client = MockSearchClient::new();
        client.expect_cardinality().returning(|_| Ok(1));
        client.expect_terms_leaderboard().returning(|_| {
            Ok(vec![UserBucket {
                user_id: i64::from(i32::MAX) + 1,
                doc_count: 1,
                metric: 1,
            }])
        });

        let result = repo(client)
            .paged_species_count_search(
                &SpeciesCountUserStatisticsQuery::default(),
                None,
                None,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(AppError::AggregationExecution(_))));
    }

    #[tokio::test]
    async fn composite_area_search_propagates_a_mid_stream_failure() {
        let mut client = MockSearchClient::new();
        client
            .expect_composite_page()
            .returning(|_| Err(AppError::AggregationExecution("shard failure".into())));

        let query = SpeciesCountUserStatisticsQuery {
            area_type: Some(AreaType::Province),
            ..Default::default()
        };
        let result = repo(client)
            .area_species_count_search_composite(&query, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(AppError::AggregationExecution(_))));
    }
}
