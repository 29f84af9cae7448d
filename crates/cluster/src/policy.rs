//! Shard-selection policies.
//!
//! A policy picks exactly one live leader per shard channel and merges the
//! channels chosen for the same node, so dispatch issues at most one
//! sub-search per selected node.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use vgate_common::{NodeId, Result, VgateError};

use crate::coordinator::{NodeInfo, ShardLeaderMap};

/// One dispatch target: a node and every channel it was selected for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSelection {
    /// Selected leader node.
    pub node: NodeInfo,
    /// Shard channels this node serves for the request.
    pub channels: Vec<String>,
}

/// Strategy for choosing one leader per shard.
pub trait ShardSelectionPolicy: Send + Sync {
    /// Choose leaders for every channel in `leaders`.
    ///
    /// Fails with [`VgateError::InsufficientShardLeaders`] when any channel
    /// has no live leader.
    fn select(&self, leaders: &ShardLeaderMap) -> Result<Vec<ShardSelection>>;
}

/// Round-robin selection with per-node channel merging.
///
/// A process-wide monotonic counter rotates the preferred leader across
/// requests, spreading read load over replicas while each single request
/// stays on one leader per shard.
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    next: AtomicU64,
}

impl RoundRobinPolicy {
    /// Build a policy starting at rotation offset zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShardSelectionPolicy for RoundRobinPolicy {
    fn select(&self, leaders: &ShardLeaderMap) -> Result<Vec<ShardSelection>> {
        let offset = self.next.fetch_add(1, Ordering::Relaxed) as usize;

        let mut by_node: BTreeMap<NodeId, ShardSelection> = BTreeMap::new();
        for (channel, candidates) in leaders {
            if candidates.is_empty() {
                return Err(VgateError::InsufficientShardLeaders(format!(
                    "channel '{channel}' has no live leader"
                )));
            }
            let picked = &candidates[offset % candidates.len()];
            by_node
                .entry(picked.node_id)
                .or_insert_with(|| ShardSelection {
                    node: picked.clone(),
                    channels: Vec::new(),
                })
                .channels
                .push(channel.clone());
        }
        Ok(by_node.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64) -> NodeInfo {
        NodeInfo {
            node_id: NodeId(id),
            address: format!("qn-{id}:21123"),
        }
    }

    fn leaders(spec: &[(&str, &[i64])]) -> ShardLeaderMap {
        spec.iter()
            .map(|(channel, ids)| {
                (
                    channel.to_string(),
                    ids.iter().copied().map(node).collect::<Vec<_>>(),
                )
            })
            .collect()
    }

    #[test]
    fn selects_one_leader_per_channel() {
        let policy = RoundRobinPolicy::new();
        let map = leaders(&[("ch-0", &[1]), ("ch-1", &[2])]);
        let picks = policy.select(&map).expect("select");
        assert_eq!(picks.len(), 2);
        let channels: Vec<_> = picks.iter().flat_map(|s| s.channels.clone()).collect();
        assert_eq!(channels, vec!["ch-0".to_string(), "ch-1".to_string()]);
    }

    #[test]
    fn merges_channels_for_a_shared_leader() {
        let policy = RoundRobinPolicy::new();
        let map = leaders(&[("ch-0", &[1]), ("ch-1", &[1]), ("ch-2", &[2])]);
        let picks = policy.select(&map).expect("select");
        assert_eq!(picks.len(), 2);
        assert_eq!(picks[0].node.node_id, NodeId(1));
        assert_eq!(picks[0].channels, vec!["ch-0", "ch-1"]);
        assert_eq!(picks[1].node.node_id, NodeId(2));
    }

    #[test]
    fn rotates_across_requests() {
        let policy = RoundRobinPolicy::new();
        let map = leaders(&[("ch-0", &[1, 2])]);
        let first = policy.select(&map).expect("first")[0].node.node_id;
        let second = policy.select(&map).expect("second")[0].node.node_id;
        assert_ne!(first, second);
    }

    #[test]
    fn channel_without_leader_is_insufficient() {
        let policy = RoundRobinPolicy::new();
        let map = leaders(&[("ch-0", &[1]), ("ch-1", &[])]);
        let err = policy.select(&map).unwrap_err();
        assert!(matches!(err, VgateError::InsufficientShardLeaders(_)));
    }
}
