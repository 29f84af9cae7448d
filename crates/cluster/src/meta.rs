//! Metadata cache: collection schemas, partition ids, shard leadership.
//!
//! The cache is a process-wide handle constructed at startup and injected
//! into tasks; there is no global singleton. Reads hand out immutable
//! snapshots (`Arc`), writers swap entries under internal synchronization,
//! and no lock is ever held across an await.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;
use vgate_common::{CollectionId, PartitionId, Result, VgateError};

use crate::coordinator::{ClusterCoordinator, ShardLeaderMap};
use crate::schema::CollectionSchema;
use crate::wire::StatusCode;

/// Collection description returned by the metadata service.
#[derive(Debug, Clone)]
pub struct DescribedCollection {
    /// Stable collection id.
    pub collection_id: CollectionId,
    /// Declared schema.
    pub schema: CollectionSchema,
}

#[async_trait]
/// Metadata-service contract the cache reads through on a miss.
pub trait MetaFetcher: Send + Sync {
    /// Describe a collection by name.
    ///
    /// An unknown name yields [`VgateError::CollectionNotExists`].
    async fn describe_collection(&self, name: &str) -> Result<DescribedCollection>;

    /// List `(name, id)` pairs for every partition of a collection.
    async fn list_partitions(
        &self,
        collection_id: CollectionId,
    ) -> Result<Vec<(String, PartitionId)>>;
}

/// Cached snapshot of one collection's metadata.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    /// Stable collection id.
    pub collection_id: CollectionId,
    /// Declared schema.
    pub schema: Arc<CollectionSchema>,
    /// Partition name → id.
    pub partitions: BTreeMap<String, PartitionId>,
    /// Whether a load check already confirmed the collection fully loaded.
    pub loaded: bool,
}

/// Read-mostly metadata cache over the metadata service and the cluster
/// coordinator.
///
/// Test hook: [`MetadataCache::set_loaded`] is the one sanctioned way to
/// flip a cached collection's loaded flag from outside the load checker.
pub struct MetadataCache {
    fetcher: Arc<dyn MetaFetcher>,
    coordinator: Arc<dyn ClusterCoordinator>,
    collections: RwLock<HashMap<String, Arc<CollectionInfo>>>,
    shard_leaders: RwLock<HashMap<CollectionId, Arc<ShardLeaderMap>>>,
}

impl MetadataCache {
    /// Build a cache over the given collaborators.
    pub fn new(fetcher: Arc<dyn MetaFetcher>, coordinator: Arc<dyn ClusterCoordinator>) -> Self {
        Self {
            fetcher,
            coordinator,
            collections: RwLock::new(HashMap::new()),
            shard_leaders: RwLock::new(HashMap::new()),
        }
    }

    /// Collection metadata snapshot, fetched through on a miss.
    pub async fn get_collection_info(&self, name: &str) -> Result<Arc<CollectionInfo>> {
        if let Some(info) = self
            .collections
            .read()
            .expect("collection cache poisoned")
            .get(name)
        {
            return Ok(Arc::clone(info));
        }

        let described = self.fetcher.describe_collection(name).await?;
        let partitions = self
            .fetcher
            .list_partitions(described.collection_id)
            .await?
            .into_iter()
            .collect::<BTreeMap<_, _>>();
        debug!(
            collection = %name,
            collection_id = %described.collection_id,
            partitions = partitions.len(),
            operator = "MetaCacheFill",
            "collection metadata cached"
        );
        let info = Arc::new(CollectionInfo {
            collection_id: described.collection_id,
            schema: Arc::new(described.schema),
            partitions,
            loaded: false,
        });
        let mut cache = self.collections.write().expect("collection cache poisoned");
        Ok(Arc::clone(cache.entry(name.to_string()).or_insert(info)))
    }

    /// Collection id by name.
    pub async fn get_collection_id(&self, name: &str) -> Result<CollectionId> {
        Ok(self.get_collection_info(name).await?.collection_id)
    }

    /// Collection schema snapshot by name.
    pub async fn get_collection_schema(&self, name: &str) -> Result<Arc<CollectionSchema>> {
        Ok(Arc::clone(&self.get_collection_info(name).await?.schema))
    }

    /// Resolve partition names to ids for one collection.
    ///
    /// An unknown partition name is a validation failure: partitions are
    /// caller-supplied, unlike collection existence which the metadata
    /// service arbitrates.
    pub async fn get_partition_ids(
        &self,
        collection: &str,
        partition_names: &[String],
    ) -> Result<Vec<PartitionId>> {
        let info = self.get_collection_info(collection).await?;
        partition_names
            .iter()
            .map(|name| {
                info.partitions.get(name).copied().ok_or_else(|| {
                    VgateError::Validation(format!(
                        "partition '{name}' not found in collection '{collection}'"
                    ))
                })
            })
            .collect()
    }

    /// Current shard-leader map, fetched from the coordinator on a miss.
    pub async fn get_shard_leaders(
        &self,
        collection_id: CollectionId,
    ) -> Result<Arc<ShardLeaderMap>> {
        if let Some(leaders) = self
            .shard_leaders
            .read()
            .expect("shard-leader cache poisoned")
            .get(&collection_id)
        {
            return Ok(Arc::clone(leaders));
        }

        let resp = self.coordinator.get_shard_leaders(collection_id).await?;
        match resp.status.code {
            StatusCode::Success => {}
            StatusCode::CollectionNotExists => {
                return Err(VgateError::CollectionNotExists(resp.status.reason));
            }
            _ => return Err(VgateError::Unexpected(resp.status.reason)),
        }
        debug!(
            collection_id = %collection_id,
            shards = resp.leaders.len(),
            operator = "MetaCacheShardLeaders",
            "shard-leader map cached"
        );
        let leaders = Arc::new(resp.leaders);
        let mut cache = self
            .shard_leaders
            .write()
            .expect("shard-leader cache poisoned");
        Ok(Arc::clone(cache.entry(collection_id).or_insert(leaders)))
    }

    /// Drop the cached shard-leader map so the next read refreshes from the
    /// coordinator. Called after a `NotShardLeader` answer.
    pub fn deprecate_shard_leaders(&self, collection_id: CollectionId) {
        self.shard_leaders
            .write()
            .expect("shard-leader cache poisoned")
            .remove(&collection_id);
    }

    /// Drop every cached entry for a collection.
    pub fn invalidate_collection(&self, name: &str) {
        let removed = self
            .collections
            .write()
            .expect("collection cache poisoned")
            .remove(name);
        if let Some(info) = removed {
            self.deprecate_shard_leaders(info.collection_id);
        }
    }

    /// Flip the cached loaded flag of a collection.
    ///
    /// Used by the load checker once the coordinator confirms full residency,
    /// and by tests as the sanctioned mutation hook. A name not yet cached is
    /// ignored.
    pub fn set_loaded(&self, name: &str, loaded: bool) {
        let mut cache = self.collections.write().expect("collection cache poisoned");
        if let Some(info) = cache.get_mut(name) {
            let mut updated = (**info).clone();
            updated.loaded = loaded;
            *info = Arc::new(updated);
        }
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::coordinator::{
        GetShardLeadersResponse, NodeInfo, ShowCollectionsResponse, ShowPartitionsResponse,
    };
    use crate::schema::{DataType, FieldSchema};
    use crate::wire::Status;
    use vgate_common::NodeId;

    struct CountingFetcher {
        describes: AtomicUsize,
    }

    #[async_trait]
    impl MetaFetcher for CountingFetcher {
        async fn describe_collection(&self, name: &str) -> Result<DescribedCollection> {
            self.describes.fetch_add(1, Ordering::SeqCst);
            if name != "docs" {
                return Err(VgateError::CollectionNotExists(name.to_string()));
            }
            Ok(DescribedCollection {
                collection_id: CollectionId(7),
                schema: CollectionSchema {
                    name: name.to_string(),
                    description: String::new(),
                    fields: vec![FieldSchema {
                        field_id: 100,
                        name: "id".to_string(),
                        data_type: DataType::Int64,
                        is_primary_key: true,
                        dim: None,
                    }],
                },
            })
        }

        async fn list_partitions(
            &self,
            _collection_id: CollectionId,
        ) -> Result<Vec<(String, PartitionId)>> {
            Ok(vec![("_default".to_string(), PartitionId(70))])
        }
    }

    struct CountingCoordinator {
        leader_calls: AtomicUsize,
    }

    #[async_trait]
    impl ClusterCoordinator for CountingCoordinator {
        async fn show_collections(
            &self,
            _collection_ids: &[CollectionId],
        ) -> Result<ShowCollectionsResponse> {
            Ok(ShowCollectionsResponse {
                status: Status::success(),
                states: Vec::new(),
            })
        }

        async fn show_partitions(
            &self,
            _collection_id: CollectionId,
            _partition_ids: &[PartitionId],
        ) -> Result<ShowPartitionsResponse> {
            Ok(ShowPartitionsResponse {
                status: Status::success(),
                states: Vec::new(),
            })
        }

        async fn get_shard_leaders(
            &self,
            _collection_id: CollectionId,
        ) -> Result<GetShardLeadersResponse> {
            self.leader_calls.fetch_add(1, Ordering::SeqCst);
            let mut leaders = ShardLeaderMap::new();
            leaders.insert(
                "ch-0".to_string(),
                vec![NodeInfo {
                    node_id: NodeId(1),
                    address: "qn-1:21123".to_string(),
                }],
            );
            Ok(GetShardLeadersResponse {
                status: Status::success(),
                leaders,
            })
        }
    }

    fn cache() -> (MetadataCache, Arc<CountingFetcher>, Arc<CountingCoordinator>) {
        let fetcher = Arc::new(CountingFetcher {
            describes: AtomicUsize::new(0),
        });
        let coordinator = Arc::new(CountingCoordinator {
            leader_calls: AtomicUsize::new(0),
        });
        (
            MetadataCache::new(Arc::clone(&fetcher) as _, Arc::clone(&coordinator) as _),
            fetcher,
            coordinator,
        )
    }

    #[tokio::test]
    async fn repeat_lookups_hit_the_cache() {
        let (cache, fetcher, _) = cache();
        let a = cache.get_collection_info("docs").await.expect("first");
        let b = cache.get_collection_info("docs").await.expect("second");
        assert_eq!(a.collection_id, b.collection_id);
        assert_eq!(fetcher.describes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_collection_propagates_not_exists() {
        let (cache, _, _) = cache();
        let err = cache.get_collection_info("ghost").await.unwrap_err();
        assert!(matches!(err, VgateError::CollectionNotExists(_)));
    }

    #[tokio::test]
    async fn unknown_partition_is_a_validation_error() {
        let (cache, _, _) = cache();
        let err = cache
            .get_partition_ids("docs", &["nope".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, VgateError::Validation(_)));
    }

    #[tokio::test]
    async fn deprecating_shard_leaders_forces_a_refresh() {
        let (cache, _, coordinator) = cache();
        cache.get_shard_leaders(CollectionId(7)).await.expect("fill");
        cache.get_shard_leaders(CollectionId(7)).await.expect("hit");
        assert_eq!(coordinator.leader_calls.load(Ordering::SeqCst), 1);

        cache.deprecate_shard_leaders(CollectionId(7));
        cache
            .get_shard_leaders(CollectionId(7))
            .await
            .expect("refetch");
        assert_eq!(coordinator.leader_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn set_loaded_flips_the_cached_flag() {
        let (cache, _, _) = cache();
        cache.get_collection_info("docs").await.expect("fill");
        cache.set_loaded("docs", true);
        assert!(cache.get_collection_info("docs").await.expect("hit").loaded);
    }
}
