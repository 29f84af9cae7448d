//! Search task driver and gateway entry point.
//!
//! Responsibilities:
//! - walk one request through the task lifecycle
//!   `Created → Enqueued → PreExecuting → Executing → PostExecuting → Done|Failed`;
//! - validate and load-check before any shard RPC;
//! - drive dispatch with the single stale-leader retry;
//! - decode and merge partial results into the user answer.
//!
//! Retry semantics:
//! - only the stale-leader classification is recoverable, exactly once;
//! - the retry deprecates the cached shard-leader map so the re-read
//!   refreshes from the cluster coordinator;
//! - the remaining deadline is re-checked before re-entering dispatch.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use vgate_cluster::client::ShardClientPool;
use vgate_cluster::coordinator::ClusterCoordinator;
use vgate_cluster::meta::MetadataCache;
use vgate_cluster::policy::ShardSelectionPolicy;
use vgate_cluster::wire::{ResultData, Status, SubSearchResponse};
use vgate_common::metrics::global_metrics;
use vgate_common::{timestamp, GatewayConfig, Result, VgateError};

use crate::decode::decode_partial_result;
use crate::dispatch::dispatch_sub_searches;
use crate::load::check_fully_loaded;
use crate::reduce::{reduce_search_results, MergeParams};
use crate::request::{SearchRequest, SearchResults};
use crate::validate::{validate, NormalizedQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Lifecycle states of one search task.
pub enum TaskPhase {
    /// Task object exists but has not entered the pipeline.
    Created,
    /// Task accepted for execution.
    Enqueued,
    /// Validation and load checking.
    PreExecuting,
    /// Sub-searches in flight.
    Executing,
    /// Decoding and merging partial results.
    PostExecuting,
    /// Terminal success.
    Done,
    /// Terminal failure; nothing to clean up beyond dropped client leases.
    Failed,
}

/// One short-lived search task; owns all intermediate state for its request.
#[derive(Debug)]
pub struct SearchTask {
    request: SearchRequest,
    phase: TaskPhase,
}

impl SearchTask {
    /// Wrap a request into a fresh task.
    pub fn new(request: SearchRequest) -> Self {
        Self {
            request,
            phase: TaskPhase::Created,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    fn advance(&mut self, next: TaskPhase) {
        debug!(
            collection = %self.request.collection_name,
            from = ?self.phase,
            to = ?next,
            operator = "SearchTask",
            "task phase transition"
        );
        self.phase = next;
    }
}

/// Front-door coordinator for search requests.
///
/// Holds the injected collaborators; every request runs as its own task and
/// shares no mutable state with concurrent requests beyond the read-mostly
/// metadata cache and the shard-client pool.
pub struct SearchGateway {
    meta: Arc<MetadataCache>,
    coordinator: Arc<dyn ClusterCoordinator>,
    clients: ShardClientPool,
    policy: Arc<dyn ShardSelectionPolicy>,
    config: GatewayConfig,
}

impl SearchGateway {
    /// Build a gateway over the injected collaborators.
    pub fn new(
        meta: Arc<MetadataCache>,
        coordinator: Arc<dyn ClusterCoordinator>,
        clients: ShardClientPool,
        policy: Arc<dyn ShardSelectionPolicy>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            meta,
            coordinator,
            clients,
            policy,
            config,
        }
    }

    /// Execute one search request end to end.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResults> {
        let collection = request.collection_name.clone();
        let metrics = global_metrics();
        metrics.inc_search_requests(&collection);
        let started = Instant::now();

        let mut task = SearchTask::new(request);
        task.advance(TaskPhase::Enqueued);
        let outcome = self.drive(&mut task).await;
        match &outcome {
            Ok(results) => {
                task.advance(TaskPhase::Done);
                metrics.add_merged_rows(&collection, results.results.total_rows() as u64);
                info!(
                    collection = %collection,
                    rows = results.results.total_rows(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    operator = "SearchTask",
                    "search completed"
                );
            }
            Err(e) => {
                task.advance(TaskPhase::Failed);
                metrics.inc_search_failures(&collection, failure_reason(e));
                warn!(
                    collection = %collection,
                    error = %e,
                    operator = "SearchTask",
                    "search failed"
                );
            }
        }
        metrics.observe_search_seconds(&collection, started.elapsed().as_secs_f64());
        outcome
    }

    async fn drive(&self, task: &mut SearchTask) -> Result<SearchResults> {
        task.advance(TaskPhase::PreExecuting);
        let query = validate(&task.request, &self.meta, &self.config).await?;
        let loaded = check_fully_loaded(
            &self.meta,
            self.coordinator.as_ref(),
            &query.collection_name,
            query.collection_id,
            &query.partition_ids,
        )
        .await?;
        if !loaded {
            return Err(VgateError::CollectionNotLoaded(format!(
                "collection '{}' is not fully loaded",
                query.collection_name
            )));
        }

        task.advance(TaskPhase::Executing);
        let responses = self.execute_with_retry(&query).await?;

        task.advance(TaskPhase::PostExecuting);
        let merged = self.merge_responses(&query, &responses)?;
        Ok(SearchResults {
            status: Status::success(),
            results: merged,
        })
    }

    async fn execute_with_retry(&self, query: &NormalizedQuery) -> Result<Vec<SubSearchResponse>> {
        let mut retried = false;
        loop {
            let leaders = self.meta.get_shard_leaders(query.collection_id).await?;
            match dispatch_sub_searches(query, &leaders, self.policy.as_ref(), &self.clients).await
            {
                Err(e) if e.is_stale_shard_leaders() && !retried => {
                    retried = true;
                    self.meta.deprecate_shard_leaders(query.collection_id);
                    global_metrics().inc_shard_leader_retries(&query.collection_name);
                    if let Some(left) = timestamp::remaining_until(query.timeout_timestamp) {
                        if left.is_zero() {
                            return Err(VgateError::DeadlineExceeded(
                                "deadline expired before leader refresh".to_string(),
                            ));
                        }
                    }
                    warn!(
                        collection = %query.collection_name,
                        collection_id = %query.collection_id,
                        operator = "SearchTask",
                        "stale shard leaders; refreshing and re-dispatching once"
                    );
                }
                outcome => return outcome,
            }
        }
    }

    fn merge_responses(
        &self,
        query: &NormalizedQuery,
        responses: &[SubSearchResponse],
    ) -> Result<ResultData> {
        let mut partials = Vec::with_capacity(responses.len());
        for resp in responses {
            if resp.num_queries != query.nq {
                return Err(VgateError::MalformedResult(format!(
                    "partial answers {} queries, request asked {}",
                    resp.num_queries, query.nq
                )));
            }
            if !resp.sealed_segment_ids.is_empty() {
                debug!(
                    collection = %query.collection_name,
                    sealed_segments = resp.sealed_segment_ids.len(),
                    operator = "SearchTask",
                    "partial result covered sealed segments"
                );
            }
            if let Some(data) = decode_partial_result(resp)? {
                partials.push(data);
            }
        }
        reduce_search_results(
            &partials,
            &MergeParams {
                nq: query.nq,
                limit: query.top_k,
                offset: query.offset,
                metric_type: query.metric_type,
                round_decimal: query.round_decimal,
            },
        )
    }
}

impl std::fmt::Debug for SearchGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchGateway")
            .field("config", &self.config)
            .finish()
    }
}

/// Stable failure-reason label for metrics.
fn failure_reason(e: &VgateError) -> &'static str {
    match e {
        VgateError::Validation(_) => "validation",
        VgateError::CollectionNotExists(_) => "collection_not_exists",
        VgateError::CollectionNotLoaded(_) => "collection_not_loaded",
        VgateError::InsufficientShardLeaders(_) => "insufficient_shard_leaders",
        VgateError::InvalidShardLeaders(_) => "invalid_shard_leaders",
        VgateError::MalformedResult(_) => "malformed_result",
        VgateError::Transport(_) => "transport",
        VgateError::Unexpected(_) => "unexpected",
        VgateError::DeadlineExceeded(_) => "deadline_exceeded",
        VgateError::Canceled(_) => "canceled",
    }
}
