//! Paged result container and skip/take window resolution

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::UserStatisticsItem;

/// One page of an ordered result set.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[aliases(PagedUserStatistics = PagedResult<UserStatisticsItem>)]
pub struct PagedResult<T> {
    pub skip: usize,
    pub take: usize,
    /// Number of records actually returned (`records.len()`).
    pub count: usize,
    /// True total irrespective of paging.
    pub total_count: usize,
    pub records: Vec<T>,
}

impl<T> PagedResult<T> {
    pub fn new(skip: usize, take: usize, total_count: usize, records: Vec<T>) -> Self {
        Self {
            skip,
            take,
            count: records.len(),
            total_count,
            records,
        }
    }
}

/// Resolve a requested skip/take window against the known total.
///
/// `skip` defaults to 0 and is clamped to `total_count` (a skip beyond
/// the total yields an empty page, not an error). `take` defaults to
/// "the rest" and is clamped to what remains after the skip. Only called
/// once the true total is known.
pub fn resolve_paging(
    skip: Option<usize>,
    take: Option<usize>,
    total_count: usize,
) -> (usize, usize) {
    let skip = skip.unwrap_or(0).min(total_count);
    let remaining = total_count - skip;
    let take = match take {
        Some(take) => take.min(remaining),
        None => remaining,
    };
    (skip, take)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_whole_result_set() {
        assert_eq!(resolve_paging(None, None, 42), (0, 42));
    }

    #[test]
    fn take_is_clamped_to_what_remains() {
        assert_eq!(resolve_paging(Some(10), Some(100), 15), (10, 5));
    }

    #[test]
    fn skip_beyond_total_yields_empty_window() {
        assert_eq!(resolve_paging(Some(10), Some(5), 3), (3, 0));
        assert_eq!(resolve_paging(Some(10), None, 3), (3, 0));
    }

    #[test]
    fn zero_total_resolves_to_empty_window() {
        assert_eq!(resolve_paging(Some(4), Some(2), 0), (0, 0));
        assert_eq!(resolve_paging(None, None, 0), (0, 0));
    }

    #[test]
    fn clamp_law_holds_over_a_grid() {
        for total in 0..=20usize {
            for skip in 0..=25usize {
                for take in 0..=25usize {
                    let (s, t) = resolve_paging(Some(skip), Some(take), total);
                    assert!(s <= total);
                    assert!(s + t <= total, "skip={skip} take={take} total={total}");
                }
            }
        }
    }

    #[test]
    fn count_tracks_record_length() {
        let page = PagedResult::new(0, 2, 3, vec![1, 2]);
        assert_eq!(page.count, 2);
        assert_eq!(page.total_count, 3);
    }
}
