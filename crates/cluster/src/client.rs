//! Query-node client contracts and the shard-client pool.
//!
//! The pool keeps one connection per node address, reference-counted by
//! outstanding leases. A lease releases its reference when dropped, so every
//! sub-search exit path (success, error, timeout, abort) returns the client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;
use vgate_common::Result;

use crate::coordinator::NodeInfo;
use crate::wire::{SubSearchRequest, SubSearchResponse};

#[async_trait]
/// Sub-search contract answered by one query node.
pub trait QueryNodeClient: Send + Sync {
    /// Execute one sub-search over the channels named in the request.
    async fn search(&self, request: SubSearchRequest) -> Result<SubSearchResponse>;
}

#[async_trait]
/// Factory that dials a query node by address.
pub trait QueryNodeConnector: Send + Sync {
    /// Open (or rebuild) a client for the node.
    async fn connect(&self, node: &NodeInfo) -> Result<Arc<dyn QueryNodeClient>>;
}

struct PooledClient {
    client: Arc<dyn QueryNodeClient>,
    refs: usize,
}

struct PoolInner {
    connector: Arc<dyn QueryNodeConnector>,
    clients: Mutex<HashMap<String, PooledClient>>,
}

/// Reference-counted client pool keyed by node address.
///
/// Cheap to clone; clones share the pooled connections.
#[derive(Clone)]
pub struct ShardClientPool {
    inner: Arc<PoolInner>,
}

impl ShardClientPool {
    /// Build a pool over the given connector.
    pub fn new(connector: Arc<dyn QueryNodeConnector>) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                connector,
                clients: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Lease the pooled client for `node`, dialing it on first use.
    ///
    /// Concurrent first acquisitions of the same address may dial twice; the
    /// loser adopts the pooled winner and drops its own connection.
    pub async fn acquire(&self, node: &NodeInfo) -> Result<ClientLease> {
        if let Some(client) = self.try_lease(&node.address) {
            return Ok(self.lease(node, client));
        }

        let dialed = self.inner.connector.connect(node).await?;
        let mut clients = self.inner.clients.lock().expect("client pool poisoned");
        let entry = clients
            .entry(node.address.clone())
            .or_insert_with(|| PooledClient {
                client: dialed,
                refs: 0,
            });
        entry.refs += 1;
        debug!(
            node_id = %node.node_id,
            address = %node.address,
            refs = entry.refs,
            operator = "ShardClientAcquire",
            "leased shard client"
        );
        let client = Arc::clone(&entry.client);
        drop(clients);
        Ok(self.lease(node, client))
    }

    /// Number of currently pooled connections.
    pub fn live_connections(&self) -> usize {
        self.inner.clients.lock().expect("client pool poisoned").len()
    }

    fn try_lease(&self, address: &str) -> Option<Arc<dyn QueryNodeClient>> {
        let mut clients = self.inner.clients.lock().expect("client pool poisoned");
        let entry = clients.get_mut(address)?;
        entry.refs += 1;
        Some(Arc::clone(&entry.client))
    }

    fn lease(&self, node: &NodeInfo, client: Arc<dyn QueryNodeClient>) -> ClientLease {
        ClientLease {
            pool: self.clone(),
            node: node.clone(),
            client,
        }
    }

    fn release(&self, address: &str) {
        let mut clients = self.inner.clients.lock().expect("client pool poisoned");
        if let Some(entry) = clients.get_mut(address) {
            entry.refs = entry.refs.saturating_sub(1);
            if entry.refs == 0 {
                clients.remove(address);
            }
        }
    }
}

impl std::fmt::Debug for ShardClientPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardClientPool")
            .field("live_connections", &self.live_connections())
            .finish()
    }
}

/// Scoped client reference; releases its pool slot on drop.
pub struct ClientLease {
    pool: ShardClientPool,
    node: NodeInfo,
    client: Arc<dyn QueryNodeClient>,
}

impl ClientLease {
    /// The leased client.
    pub fn client(&self) -> &Arc<dyn QueryNodeClient> {
        &self.client
    }

    /// The node this lease addresses.
    pub fn node(&self) -> &NodeInfo {
        &self.node
    }
}

impl Drop for ClientLease {
    fn drop(&mut self) {
        self.pool.release(&self.node.address);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::wire::{Status, SubSearchResponse};
    use vgate_common::NodeId;

    struct NullClient;

    #[async_trait]
    impl QueryNodeClient for NullClient {
        async fn search(&self, request: SubSearchRequest) -> Result<SubSearchResponse> {
            Ok(SubSearchResponse {
                status: Status::success(),
                metric_type: request.metric_type,
                num_queries: request.nq,
                top_k: request.top_k,
                sealed_segment_ids: Vec::new(),
                payload: Vec::new(),
            })
        }
    }

    struct CountingConnector {
        dials: AtomicUsize,
    }

    #[async_trait]
    impl QueryNodeConnector for CountingConnector {
        async fn connect(&self, _node: &NodeInfo) -> Result<Arc<dyn QueryNodeClient>> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullClient))
        }
    }

    fn node(id: i64, address: &str) -> NodeInfo {
        NodeInfo {
            node_id: NodeId(id),
            address: address.to_string(),
        }
    }

    #[tokio::test]
    async fn one_connection_per_address() {
        let connector = Arc::new(CountingConnector {
            dials: AtomicUsize::new(0),
        });
        let pool = ShardClientPool::new(Arc::clone(&connector) as _);

        let a = pool.acquire(&node(1, "qn-1:21123")).await.expect("lease a");
        let b = pool.acquire(&node(1, "qn-1:21123")).await.expect("lease b");
        assert_eq!(connector.dials.load(Ordering::SeqCst), 1);
        assert_eq!(pool.live_connections(), 1);

        drop(a);
        assert_eq!(pool.live_connections(), 1);
        drop(b);
        assert_eq!(pool.live_connections(), 0);
    }

    #[tokio::test]
    async fn distinct_addresses_get_distinct_connections() {
        let connector = Arc::new(CountingConnector {
            dials: AtomicUsize::new(0),
        });
        let pool = ShardClientPool::new(Arc::clone(&connector) as _);

        let _a = pool.acquire(&node(1, "qn-1:21123")).await.expect("lease a");
        let _b = pool.acquire(&node(2, "qn-2:21123")).await.expect("lease b");
        assert_eq!(connector.dials.load(Ordering::SeqCst), 2);
        assert_eq!(pool.live_connections(), 2);
    }
}
