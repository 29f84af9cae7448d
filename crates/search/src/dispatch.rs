//! Concurrent sub-search dispatch to selected shard leaders.
//!
//! One request fans out to at most one sub-search per selected node (the
//! policy merges channels per node), all sub-searches run in parallel, and
//! the collector classifies every answer before anything is merged:
//! `NotShardLeader` anywhere turns the whole round into the recoverable
//! stale-leader classification, any transport or unexpected failure aborts
//! the remaining in-flight sub-searches and fails the request.

use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, warn};
use vgate_cluster::client::ShardClientPool;
use vgate_cluster::coordinator::{NodeInfo, ShardLeaderMap};
use vgate_cluster::policy::ShardSelectionPolicy;
use vgate_cluster::wire::{StatusCode, SubSearchRequest, SubSearchResponse};
use vgate_common::metrics::global_metrics;
use vgate_common::{timestamp, Result, VgateError};

use crate::validate::NormalizedQuery;

/// Fan a normalized query out to one leader per shard and collect every
/// successful partial result.
pub async fn dispatch_sub_searches(
    query: &NormalizedQuery,
    leaders: &ShardLeaderMap,
    policy: &dyn ShardSelectionPolicy,
    pool: &ShardClientPool,
) -> Result<Vec<SubSearchResponse>> {
    let selections = policy.select(leaders)?;
    let base = build_sub_request(query)?;

    let remaining = timestamp::remaining_until(query.timeout_timestamp);
    if let Some(left) = remaining {
        if left.is_zero() {
            return Err(VgateError::DeadlineExceeded(
                "deadline expired before dispatch".to_string(),
            ));
        }
    }

    debug!(
        collection_id = %query.collection_id,
        shards = leaders.len(),
        targets = selections.len(),
        operator = "SearchDispatch",
        "dispatching sub-searches"
    );

    let mut inflight = JoinSet::new();
    for selection in selections {
        let pool = pool.clone();
        let mut request = base.clone();
        request.channels = selection.channels;
        let node = selection.node;
        inflight.spawn(async move { run_sub_search(pool, node, request, remaining).await });
    }

    let mut partials = Vec::new();
    let mut stale_reason: Option<String> = None;
    while let Some(joined) = inflight.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                Err(VgateError::Canceled("sub-search aborted".to_string()))
            }
            Err(e) => Err(VgateError::Unexpected(format!("sub-search panicked: {e}"))),
        };
        match result {
            Ok(resp) => match resp.status.code {
                StatusCode::Success => partials.push(resp),
                StatusCode::NotShardLeader => {
                    warn!(
                        collection_id = %query.collection_id,
                        reason = %resp.status.reason,
                        operator = "SearchDispatch",
                        "shard leadership moved during dispatch"
                    );
                    stale_reason = Some(resp.status.reason);
                }
                StatusCode::CollectionNotExists => {
                    inflight.abort_all();
                    return Err(VgateError::CollectionNotExists(resp.status.reason));
                }
                StatusCode::CollectionNotLoaded => {
                    inflight.abort_all();
                    return Err(VgateError::CollectionNotLoaded(resp.status.reason));
                }
                StatusCode::UnexpectedError => {
                    inflight.abort_all();
                    return Err(VgateError::Unexpected(resp.status.reason));
                }
            },
            Err(e) => {
                inflight.abort_all();
                return Err(e);
            }
        }
    }

    if let Some(reason) = stale_reason {
        let reason = if reason.is_empty() {
            "shard leadership changed during dispatch".to_string()
        } else {
            reason
        };
        return Err(VgateError::InvalidShardLeaders(reason));
    }
    Ok(partials)
}

async fn run_sub_search(
    pool: ShardClientPool,
    node: NodeInfo,
    request: SubSearchRequest,
    remaining: Option<Duration>,
) -> Result<SubSearchResponse> {
    // The lease lives for the whole sub-search; drop releases the pooled
    // client on success, error, timeout, and abort alike.
    let lease = pool.acquire(&node).await?;
    global_metrics().inc_sub_searches(node.node_id.0);
    debug!(
        node_id = %node.node_id,
        address = %node.address,
        channels = request.channels.len(),
        operator = "SearchDispatch",
        "sub-search issued"
    );
    let fut = lease.client().search(request);
    match remaining {
        Some(left) => match timeout(left, fut).await {
            Ok(result) => result,
            Err(_) => Err(VgateError::DeadlineExceeded(format!(
                "sub-search to node {} timed out",
                node.node_id
            ))),
        },
        None => fut.await,
    }
}

fn build_sub_request(query: &NormalizedQuery) -> Result<SubSearchRequest> {
    Ok(SubSearchRequest {
        collection_id: query.collection_id,
        partition_ids: query.partition_ids.clone(),
        channels: Vec::new(),
        nq: query.nq,
        top_k: query.shard_top_k(),
        metric_type: query.metric_type,
        anns_field: query.anns_field.clone(),
        expr: query.expr.clone(),
        placeholder_group: query.placeholder_group.to_bytes()?,
        output_field_ids: query.output_field_ids.clone(),
        search_params: query.search_params.clone(),
        travel_timestamp: query.travel_timestamp,
        guarantee_timestamp: query.guarantee_timestamp,
        timeout_timestamp: query.timeout_timestamp,
    })
}
