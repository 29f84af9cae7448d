//! Cluster-coordinator contract: load states and shard leadership.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vgate_common::{CollectionId, NodeId, PartitionId, Result};

use crate::wire::Status;

/// One shard-leader candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Stable node id.
    pub node_id: NodeId,
    /// Dialable address of the node.
    pub address: String,
}

/// Shard channel name → preference-ordered live leaders.
///
/// Ordered map so selection policies iterate shards deterministically.
pub type ShardLeaderMap = BTreeMap<String, Vec<NodeInfo>>;

/// Load state of one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionLoadState {
    /// Collection the state describes.
    pub collection_id: CollectionId,
    /// Loaded fraction in percent; 100 means fully resident.
    pub in_memory_percentage: i64,
}

/// Load state of one partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionLoadState {
    /// Partition the state describes.
    pub partition_id: PartitionId,
    /// Loaded fraction in percent; 100 means fully resident.
    pub in_memory_percentage: i64,
}

/// Response of [`ClusterCoordinator::show_collections`].
#[derive(Debug, Clone)]
pub struct ShowCollectionsResponse {
    /// Call status.
    pub status: Status,
    /// Load state per requested collection.
    pub states: Vec<CollectionLoadState>,
}

/// Response of [`ClusterCoordinator::show_partitions`].
#[derive(Debug, Clone)]
pub struct ShowPartitionsResponse {
    /// Call status.
    pub status: Status,
    /// Load state per partition.
    pub states: Vec<PartitionLoadState>,
}

/// Response of [`ClusterCoordinator::get_shard_leaders`].
#[derive(Debug, Clone)]
pub struct GetShardLeadersResponse {
    /// Call status.
    pub status: Status,
    /// Current leader view.
    pub leaders: ShardLeaderMap,
}

#[async_trait]
/// Control-plane contract answered by the cluster coordinator.
///
/// Transport errors surface as `Err`; application-level failures travel in
/// each response's [`Status`].
pub trait ClusterCoordinator: Send + Sync {
    /// Report load states for the given collections.
    async fn show_collections(
        &self,
        collection_ids: &[CollectionId],
    ) -> Result<ShowCollectionsResponse>;

    /// Report load states for partitions of one collection.
    ///
    /// An empty `partition_ids` set means every partition of the collection.
    async fn show_partitions(
        &self,
        collection_id: CollectionId,
        partition_ids: &[PartitionId],
    ) -> Result<ShowPartitionsResponse>;

    /// Report the current shard-leader map of one collection.
    async fn get_shard_leaders(&self, collection_id: CollectionId)
        -> Result<GetShardLeadersResponse>;
}
