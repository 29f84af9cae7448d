//! Load checking against the cluster coordinator.
//!
//! The search task fails fast when its target is not fully resident. A
//! cached loaded flag short-circuits the coordinator round trip; the flag is
//! set here once full residency is confirmed.

use tracing::{debug, warn};
use vgate_cluster::coordinator::ClusterCoordinator;
use vgate_cluster::meta::MetadataCache;
use vgate_cluster::wire::{Status, StatusCode};
use vgate_common::{CollectionId, PartitionId, Result, VgateError};

const FULLY_LOADED: i64 = 100;

/// Returns whether the collection (or the named partitions) is fully loaded.
///
/// `Ok(false)` means the coordinator explicitly reported incomplete
/// residency, including the collection being unknown to it; transport
/// failures and unexpected statuses are errors.
pub async fn check_fully_loaded(
    cache: &MetadataCache,
    coordinator: &dyn ClusterCoordinator,
    collection_name: &str,
    collection_id: CollectionId,
    partition_ids: &[PartitionId],
) -> Result<bool> {
    let info = cache.get_collection_info(collection_name).await?;
    if info.loaded {
        return Ok(true);
    }

    if !partition_ids.is_empty() {
        return check_partitions_loaded(coordinator, collection_id, partition_ids).await;
    }

    let resp = coordinator.show_collections(&[collection_id]).await?;
    if let Some(verdict) = gate_status(&resp.status, collection_id)? {
        return Ok(verdict);
    }
    let collection_percentage = resp
        .states
        .iter()
        .find(|s| s.collection_id == collection_id)
        .map(|s| s.in_memory_percentage);
    if collection_percentage == Some(FULLY_LOADED) {
        cache.set_loaded(collection_name, true);
        return Ok(true);
    }

    // The coordinator does not see the whole collection as resident; it may
    // still have loaded every partition individually.
    let resp = coordinator.show_partitions(collection_id, &[]).await?;
    if let Some(verdict) = gate_status(&resp.status, collection_id)? {
        return Ok(verdict);
    }
    let all_loaded = !resp.states.is_empty()
        && resp
            .states
            .iter()
            .all(|s| s.in_memory_percentage == FULLY_LOADED);
    if all_loaded {
        cache.set_loaded(collection_name, true);
        debug!(
            collection_id = %collection_id,
            partitions = resp.states.len(),
            operator = "SearchLoadCheck",
            "every partition resident; collection treated as loaded"
        );
        return Ok(true);
    }
    warn!(
        collection_id = %collection_id,
        operator = "SearchLoadCheck",
        "collection not fully loaded"
    );
    Ok(false)
}

async fn check_partitions_loaded(
    coordinator: &dyn ClusterCoordinator,
    collection_id: CollectionId,
    partition_ids: &[PartitionId],
) -> Result<bool> {
    let resp = coordinator
        .show_partitions(collection_id, partition_ids)
        .await?;
    if let Some(verdict) = gate_status(&resp.status, collection_id)? {
        return Ok(verdict);
    }
    for id in partition_ids {
        let loaded = resp
            .states
            .iter()
            .find(|s| s.partition_id == *id)
            .is_some_and(|s| s.in_memory_percentage == FULLY_LOADED);
        if !loaded {
            warn!(
                collection_id = %collection_id,
                partition_id = %id,
                operator = "SearchLoadCheck",
                "requested partition not fully loaded"
            );
            return Ok(false);
        }
    }
    Ok(true)
}

/// Interpret a coordinator status: `None` to continue, `Some(false)` for the
/// hard not-loaded answer, error otherwise.
fn gate_status(status: &Status, collection_id: CollectionId) -> Result<Option<bool>> {
    match status.code {
        StatusCode::Success => Ok(None),
        StatusCode::CollectionNotExists => {
            warn!(
                collection_id = %collection_id,
                operator = "SearchLoadCheck",
                "coordinator does not know the collection; treating as not loaded"
            );
            Ok(Some(false))
        }
        _ => Err(VgateError::Unexpected(format!(
            "load check failed: {}",
            status.reason
        ))),
    }
}
