//! Composite aggregation paging over the opaque after-key protocol

use async_stream::try_stream;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::search::{
    CompositeBucket, CompositePageRequest, CompositeSource, FilterPredicate, SearchClient,
};

/// Drives repeated composite aggregation requests against the engine,
/// feeding each returned after-key into the next request until a page
/// comes back empty.
///
/// Pages are fetched strictly in cursor order; the engine's ascending
/// source ordering plus the after-key resume guarantees every key tuple
/// is visited exactly once (absent concurrent index mutation).
pub struct CompositeAggregationPager<'a> {
    client: &'a dyn SearchClient,
    index: &'a str,
    page_size: usize,
}

impl<'a> CompositeAggregationPager<'a> {
    pub fn new(client: &'a dyn SearchClient, index: &'a str, page_size: usize) -> Self {
        Self {
            client,
            index,
            page_size,
        }
    }

    /// Lazily stream every bucket of the composite aggregation.
    ///
    /// The cancellation token is checked between page fetches; a fired
    /// token aborts the stream with [`AppError::Cancelled`]. Engine
    /// failures abort with the page request's error.
    pub fn page_all(
        &self,
        filters: Vec<FilterPredicate>,
        sources: Vec<CompositeSource>,
        metric_field: String,
        cancel: CancellationToken,
    ) -> impl Stream<Item = AppResult<CompositeBucket>> + 'a {
        let client = self.client;
        let index = self.index.to_string();
        let page_size = self.page_size;

        try_stream! {
            let mut after = None;
            let mut pages = 0usize;
            loop {
                if cancel.is_cancelled() {
                    Err(AppError::Cancelled)?;
                }
                let page = client
                    .composite_page(CompositePageRequest {
                        index: index.clone(),
                        filters: filters.clone(),
                        sources: sources.clone(),
                        metric_field: metric_field.clone(),
                        size: page_size,
                        after: after.take(),
                    })
                    .await?;
                if page.buckets.is_empty() {
                    break;
                }
                pages += 1;
                tracing::debug!(
                    index = %index,
                    page = pages,
                    buckets = page.buckets.len(),
                    "composite aggregation page drained"
                );
                after = page.after;
                for bucket in page.buckets {
                    yield bucket;
                }
                if after.is_none() {
                    break;
                }
            }
        }
    }
}
