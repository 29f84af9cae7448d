//! Cluster collaborator contracts and shard plumbing for vectorgate.
//!
//! Architecture role:
//! - defines the async contracts the coordinator reads through
//!   (metadata fetcher, cluster coordinator, query-node client)
//! - hosts the collection schema model and sub-search wire types
//! - provides the metadata cache, shard-client pool, and shard-selection
//!   policies the search task composes
//!
//! Key modules:
//! - [`schema`]
//! - [`wire`]
//! - [`meta`]
//! - [`coordinator`]
//! - [`client`]
//! - [`policy`]

pub mod client;
pub mod coordinator;
pub mod meta;
pub mod policy;
pub mod schema;
pub mod wire;

pub use client::{ClientLease, QueryNodeClient, QueryNodeConnector, ShardClientPool};
pub use coordinator::{
    ClusterCoordinator, CollectionLoadState, GetShardLeadersResponse, NodeInfo,
    PartitionLoadState, ShardLeaderMap, ShowCollectionsResponse, ShowPartitionsResponse,
};
pub use meta::{CollectionInfo, DescribedCollection, MetaFetcher, MetadataCache};
pub use policy::{RoundRobinPolicy, ShardSelection, ShardSelectionPolicy};
pub use schema::{CollectionSchema, DataType, FieldSchema};
pub use wire::{
    FieldColumn, IdKey, IdList, MetricType, PlaceholderGroup, QueryVector, ResultData,
    ScalarColumn, Status, StatusCode, SubSearchRequest, SubSearchResponse,
};
