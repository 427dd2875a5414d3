//! Ranged block retrieval under a byte budget
//!
//! Headers are fetched window by window; consecutive blocks are grouped while
//! their summed size stays within `max_request_bytes` and each group is
//! fetched with one batched request. The result is all-or-nothing: a failing
//! sub-request or a cancellation discards everything accumulated so far.

use crate::core::{Block, BlockHeader};
use crate::daemon::{Daemon, DaemonError};
use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Sources
// =============================================================================

/// Minimal read access needed for ranged retrieval and tip polling
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Header of the chain tip
    async fn tip_header(&self) -> Result<BlockHeader, DaemonError>;

    /// Headers of heights `start..=end`
    async fn headers(&self, start: u64, end: u64) -> Result<Vec<BlockHeader>, DaemonError>;

    /// Blocks at `heights`, in the same order
    async fn blocks(&self, heights: &[u64]) -> Result<Vec<Block>, DaemonError>;
}

#[async_trait]
impl<D: Daemon + ?Sized> RangeSource for D {
    async fn tip_header(&self) -> Result<BlockHeader, DaemonError> {
        self.get_last_block_header().await
    }

    async fn headers(&self, start: u64, end: u64) -> Result<Vec<BlockHeader>, DaemonError> {
        self.get_block_headers_by_range(start, end).await
    }

    async fn blocks(&self, heights: &[u64]) -> Result<Vec<Block>, DaemonError> {
        self.get_blocks_by_height(heights).await
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Groups consecutive blocks into requests that fit the byte budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlanner {
    pub max_request_bytes: u64,
}

impl ChunkPlanner {
    pub fn new(max_request_bytes: u64) -> Self {
        Self { max_request_bytes }
    }

    /// Split `headers` (ascending heights) into height groups
    ///
    /// Groups preserve order and cover every header exactly once.
    pub fn plan(&self, headers: &[BlockHeader]) -> Result<Vec<Vec<u64>>, DaemonError> {
        let mut chunks = Vec::new();
        let mut current = Vec::new();
        let mut current_bytes = 0u64;

        for header in headers {
            let height = header
                .height
                .ok_or_else(|| DaemonError::InvalidResponse("header without height".to_string()))?;
            let size = header.size.ok_or_else(|| {
                DaemonError::InvalidResponse(format!("header at height {} has no size", height))
            })?;
            if size > self.max_request_bytes {
                return Err(DaemonError::BlockExceedsBudget {
                    height,
                    size,
                    budget: self.max_request_bytes,
                });
            }
            if !current.is_empty() && current_bytes + size > self.max_request_bytes {
                chunks.push(std::mem::take(&mut current));
                current_bytes = 0;
            }
            current.push(height);
            current_bytes += size;
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        Ok(chunks)
    }
}

// =============================================================================
// Fetching
// =============================================================================

/// Fetches block ranges from a [`RangeSource`]
#[derive(Debug, Clone, Copy)]
pub struct RangeFetcher {
    planner: ChunkPlanner,
    headers_per_request: u64,
}

impl RangeFetcher {
    pub fn new(max_request_bytes: u64, headers_per_request: u64) -> Self {
        Self {
            planner: ChunkPlanner::new(max_request_bytes),
            headers_per_request: headers_per_request.max(1),
        }
    }

    /// Blocks `start..=end` in height order
    pub async fn fetch<S: RangeSource + ?Sized>(
        &self,
        source: &S,
        start: u64,
        end: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Block>, DaemonError> {
        let mut blocks = Vec::new();
        if start > end {
            return Ok(blocks);
        }

        let mut window_start = start;
        loop {
            let window_end = window_start.saturating_add(self.headers_per_request - 1).min(end);
            log::debug!("Fetching headers {}..={}", window_start, window_end);

            let headers = guarded(cancel, source.headers(window_start, window_end))
                .await
                .map_err(|e| aborted(window_start, window_end, e))?;
            check_window(&headers, window_start, window_end)
                .map_err(|e| aborted(window_start, window_end, e))?;

            for chunk in self.planner.plan(&headers)? {
                let (first, last) = match (chunk.first(), chunk.last()) {
                    (Some(first), Some(last)) => (*first, *last),
                    _ => continue,
                };
                let fetched = guarded(cancel, source.blocks(&chunk))
                    .await
                    .map_err(|e| aborted(first, last, e))?;
                if fetched.len() != chunk.len() {
                    return Err(aborted(
                        first,
                        last,
                        DaemonError::InvalidResponse(format!(
                            "{} blocks returned for {} heights",
                            fetched.len(),
                            chunk.len()
                        )),
                    ));
                }
                blocks.extend(fetched);
            }

            if window_end >= end {
                break;
            }
            window_start = window_end + 1;
        }

        log::debug!("Fetched {} blocks for {}..={}", blocks.len(), start, end);
        Ok(blocks)
    }
}

/// Run `fut` unless `cancel` fires first
async fn guarded<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, DaemonError>
where
    F: Future<Output = Result<T, DaemonError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DaemonError::Cancelled),
        result = fut => result,
    }
}

/// Wrap a sub-request failure; cancellation passes through unchanged
fn aborted(start: u64, end: u64, error: DaemonError) -> DaemonError {
    match error {
        DaemonError::Cancelled => DaemonError::Cancelled,
        other => DaemonError::RangeFetchAborted {
            start,
            end,
            source: Box::new(other),
        },
    }
}

fn check_window(headers: &[BlockHeader], start: u64, end: u64) -> Result<(), DaemonError> {
    let heights_match = headers.len() as u64 == end - start + 1
        && headers
            .iter()
            .zip(start..=end)
            .all(|(h, expected)| h.height.map_or(true, |height| height == expected));
    if heights_match {
        Ok(())
    } else {
        Err(DaemonError::InvalidResponse(format!(
            "headers do not cover {}..={}",
            start, end
        )))
    }
}
