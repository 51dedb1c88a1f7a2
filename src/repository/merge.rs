//! Merging aggregation passes into per-user statistics records

use std::collections::HashMap;

use crate::models::UserStatisticsItem;

/// Fold one single-dimension (user-keyed) bucket into the accumulator.
///
/// The distinct-taxon metric arrives complete for the user's whole
/// filtered set, so it is assigned rather than summed; with `userId` as
/// the sole bucketing key each user appears in exactly one bucket.
pub fn fold_user_bucket(
    acc: &mut HashMap<i32, UserStatisticsItem>,
    user_id: i32,
    doc_count: i64,
    species_count: i64,
) {
    let item = acc
        .entry(user_id)
        .or_insert_with(|| UserStatisticsItem::new(user_id));
    item.observation_count += doc_count;
    item.species_count = species_count;
}

/// Fold one (user, area) composite bucket into the accumulator.
///
/// A duplicate pair across pages indicates a paging defect: debug builds
/// assert, release builds log and overwrite.
pub fn fold_user_area_bucket(
    acc: &mut HashMap<i32, UserStatisticsItem>,
    user_id: i32,
    feature_id: &str,
    species_count: i64,
) {
    let item = acc
        .entry(user_id)
        .or_insert_with(|| UserStatisticsItem::new(user_id));
    let by_feature = item
        .species_count_by_feature_id
        .get_or_insert_with(HashMap::new);
    let previous = by_feature.insert(feature_id.to_string(), species_count);
    debug_assert!(
        previous.is_none(),
        "duplicate (user, area) bucket: user {} feature {}",
        user_id,
        feature_id
    );
    if let Some(previous) = previous {
        tracing::warn!(
            user_id,
            feature_id,
            previous,
            replacement = species_count,
            "duplicate (user, area) bucket across composite pages, overwriting"
        );
    }
}

/// Join per-user totals from the single-dimension pass with the
/// area-keyed accumulators, by user id.
///
/// Totals win for `observation_count`/`species_count`: a user may span
/// several areas, so summing area buckets would double count shared
/// taxa. Returns a sorted leaderboard.
pub fn join_area_breakdowns(
    totals: HashMap<i32, UserStatisticsItem>,
    areas: HashMap<i32, UserStatisticsItem>,
) -> Vec<UserStatisticsItem> {
    let mut merged = totals;
    for (user_id, area_item) in areas {
        match merged.get_mut(&user_id) {
            Some(item) => {
                item.species_count_by_feature_id = area_item.species_count_by_feature_id;
            }
            None => {
                tracing::warn!(user_id, "area buckets for user absent from totals pass");
                merged.insert(user_id, area_item);
            }
        }
    }
    sort_leaderboard(merged.into_values().collect())
}

/// Deterministic leaderboard order: species count descending, ties
/// broken by ascending user id.
pub fn sort_leaderboard(mut items: Vec<UserStatisticsItem>) -> Vec<UserStatisticsItem> {
    items.sort_by(|a, b| {
        b.species_count
            .cmp(&a.species_count)
            .then(a.user_id.cmp(&b.user_id))
    });
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(user_id: i32, observation_count: i64, species_count: i64) -> UserStatisticsItem {
        UserStatisticsItem {
            user_id,
            observation_count,
            species_count,
            species_count_by_feature_id: None,
        }
    }

    #[test]
    fn user_bucket_fold_assigns_species_count() {
        let mut acc = HashMap::new();
        fold_user_bucket(&mut acc, 5, 10, 4);
        let entry = &acc[&5];
        assert_eq!(entry.observation_count, 10);
        assert_eq!(entry.species_count, 4);
    }

    #[test]
    fn area_breakdown_join_keeps_cross_area_total() {
        // User 5: 2 distinct taxa in area A, 3 in B, 4 overall (one
        // taxon shared between areas). The per-area values must not be
        // forced to sum to the overall total.
        let mut areas = HashMap::new();
        fold_user_area_bucket(&mut areas, 5, "A", 2);
        fold_user_area_bucket(&mut areas, 5, "B", 3);

        let mut totals = HashMap::new();
        fold_user_bucket(&mut totals, 5, 12, 4);

        let merged = join_area_breakdowns(totals, areas);
        assert_eq!(merged.len(), 1);
        let record = &merged[0];
        assert_eq!(record.species_count, 4);
        assert_eq!(record.observation_count, 12);
        let by_feature = record.species_count_by_feature_id.as_ref().unwrap();
        assert_eq!(by_feature["A"], 2);
        assert_eq!(by_feature["B"], 3);
    }

    #[test]
    #[should_panic(expected = "duplicate (user, area) bucket")]
    fn duplicate_user_area_pair_is_flagged_in_debug_builds() {
        let mut acc = HashMap::new();
        fold_user_area_bucket(&mut acc, 5, "A", 2);
        fold_user_area_bucket(&mut acc, 5, "A", 3);
    }

    #[test]
    fn leaderboard_sorts_by_species_desc_then_user_asc() {
        let sorted = sort_leaderboard(vec![item(9, 7, 4), item(2, 3, 3), item(5, 10, 4)]);
        let ids: Vec<i32> = sorted.iter().map(|r| r.user_id).collect();
        assert_eq!(ids, vec![5, 9, 2]);
    }

    #[test]
    fn leaderboard_sort_is_deterministic() {
        let input = vec![item(9, 7, 4), item(5, 10, 4), item(2, 3, 3)];
        assert_eq!(
            sort_leaderboard(input.clone()),
            sort_leaderboard(input)
        );
    }
}
