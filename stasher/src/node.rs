//! The node façade: wires transport, routing table, local store, and the
//! RPC engine together behind one handle (spec.md §2, §5).
//!
//! Grounded on the teacher's `KademliaDht`/`KademliaNode` split in
//! `core/qnet-consensus/src/kademlia.rs`, but `Node` here is a thin
//! `Arc<NodeInner>` facade rather than a struct that owns its own
//! `UdpSocket` and background task directly — `start()`/`stop()` spawn and
//! tear down the reactor task explicitly instead.

use crate::bucket::RoutingTable;
use crate::config::StasherConfig;
use crate::error::StasherResult;
use crate::id::Identifier;
use crate::message::{MsgId, ReplyPayload};
use crate::peer::Peer;
use crate::rpc::{self, ping_all::PingAllReport};
use crate::store::LocalStore;
use crate::transport::Transport;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub(crate) type Binding = oneshot::Sender<(Peer, ReplyPayload)>;

/// Shared state behind every `Node` handle. Cloned as `Arc<NodeInner>` into
/// every spawned RPC future and into the reactor task.
pub struct NodeInner {
    pub(crate) config: StasherConfig,
    pub(crate) self_destination: Vec<u8>,
    pub(crate) self_id: Identifier,
    pub(crate) routing_table: Mutex<RoutingTable>,
    pub(crate) store: LocalStore,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) bindings: Mutex<HashMap<(Vec<u8>, MsgId), Binding>>,
    next_msg_id: AtomicU64,
    running: AtomicBool,
}

impl NodeInner {
    pub(crate) fn fresh_msg_id(&self) -> MsgId {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Construction-time parameters for a `Node`.
pub struct NodeOptions {
    pub config: StasherConfig,
}

impl NodeOptions {
    pub fn new(config: StasherConfig) -> Self {
        NodeOptions { config }
    }

    /// An isolated node backed by a throwaway rocksdb directory. Leaks the
    /// directory for the process's lifetime rather than cleaning it up —
    /// acceptable for short-lived test processes, never used outside tests.
    #[cfg(feature = "test-util")]
    pub fn ephemeral() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir for ephemeral node");
        let mut config = StasherConfig::default();
        config.data_dir = dir.path().to_string_lossy().into_owned();
        config.refresh_on_start = false;
        std::mem::forget(dir);
        NodeOptions { config }
    }

    /// Like [`NodeOptions::ephemeral`], but with millisecond RPC deadlines
    /// so timeout-path tests don't have to wait out real spec.md defaults.
    #[cfg(feature = "test-util")]
    pub fn ephemeral_fast_timeout() -> Self {
        let mut opts = Self::ephemeral();
        opts.config.t_ping = std::time::Duration::from_millis(50);
        opts.config.t_find_node = std::time::Duration::from_millis(50);
        opts.config.t_store = std::time::Duration::from_millis(50);
        opts
    }
}

/// A running (or not-yet-started) Stasher DHT node.
pub struct Node {
    inner: Arc<NodeInner>,
    reactor: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    pub fn new(transport: impl Transport + 'static, options: NodeOptions) -> StasherResult<Node> {
        let self_destination = transport.local_destination().to_vec();
        let self_id = Identifier::from_destination(&self_destination);
        let store = LocalStore::open(&options.config.data_dir)?;
        let routing_table = RoutingTable::new(self_id, options.config.k);
        let inner = Arc::new(NodeInner {
            config: options.config,
            self_destination,
            self_id,
            routing_table: Mutex::new(routing_table),
            store,
            transport: Box::new(transport),
            bindings: Mutex::new(HashMap::new()),
            next_msg_id: AtomicU64::new(1),
            running: AtomicBool::new(false),
        });
        Ok(Node {
            inner,
            reactor: Mutex::new(None),
        })
    }

    /// Load persisted noderefs, start the reactor task, and (unless
    /// disabled) kick off a self-lookup to warm the routing table
    /// (spec.md §4.4, §5).
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(refs) = self.inner.store.get_refs() {
            let mut rt = self.inner.routing_table.lock();
            for peer in refs {
                rt.just_seen(peer);
            }
        }
        info!(self_id = %self.inner.self_id, "node starting");
        let handle = crate::reactor::spawn(self.inner.clone());
        *self.reactor.lock() = Some(handle);

        if self.inner.config.refresh_on_start {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                let self_id = inner.self_id;
                rpc::find::find_node(inner, self_id, false).await;
            });
        }
    }

    /// Stop the reactor task and persist the current routing table.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.reactor.lock().take() {
            handle.abort();
        }
        let peers = self.inner.routing_table.lock().all_peers();
        if let Err(e) = self.inner.store.put_refs(&peers) {
            warn!(error = %e, "failed to persist noderefs on stop");
        }
    }

    pub fn self_id(&self) -> Identifier {
        self.inner.self_id
    }

    pub fn self_destination(&self) -> &[u8] {
        &self.inner.self_destination
    }

    /// PING a single destination (spec.md §4.5).
    pub async fn ping(&self, destination: Vec<u8>) -> bool {
        rpc::ping::ping(self.inner.clone(), destination).await
    }

    /// PING every peer currently in the routing table (spec.md §4.9).
    pub async fn ping_all(&self) -> PingAllReport {
        rpc::ping_all::ping_all(self.inner.clone()).await
    }

    /// FIND_NODE: the K peers closest to `target` (spec.md §4.6).
    pub async fn find_node(&self, target: Identifier, local_only: bool) -> Vec<Vec<u8>> {
        rpc::find::find_node(self.inner.clone(), target, local_only).await
    }

    /// GET: FIND_VALUE, checking the local store first (spec.md §4.7).
    /// `key` is the raw content key; it is hashed with SHA-1 here, the same
    /// way a transport destination becomes a node id.
    pub async fn get(&self, key: &[u8], local_only: bool) -> Option<Vec<u8>> {
        let key_id = Identifier::from_key(key);
        rpc::find::find_value(self.inner.clone(), key_id, local_only).await
    }

    pub fn get_with_callback(
        &self,
        key: &[u8],
        local_only: bool,
        callback: impl FnOnce(Option<Vec<u8>>) + Send + 'static,
    ) {
        let key_id = Identifier::from_key(key);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let result = rpc::find::find_value(inner, key_id, local_only).await;
            callback(result);
        });
    }

    /// PUT: store locally, then fan out to the closest peers (spec.md §4.8).
    /// `key` is the raw content key, hashed with SHA-1 here rather than by
    /// the caller. Rejects oversized values at this API boundary without
    /// touching the network.
    pub async fn put(&self, key: &[u8], value: Vec<u8>) -> bool {
        if value.len() > self.inner.config.max_value_len {
            warn!(len = value.len(), max = self.inner.config.max_value_len, "put rejected: value too large");
            return false;
        }
        let key_id = Identifier::from_key(key);
        rpc::store_rpc::store(self.inner.clone(), key_id, value).await
    }

    pub fn put_with_callback(&self, key: &[u8], value: Vec<u8>, callback: impl FnOnce(bool) + Send + 'static) {
        let key_id = Identifier::from_key(key);
        let inner = self.inner.clone();
        let max = inner.config.max_value_len;
        tokio::spawn(async move {
            if value.len() > max {
                warn!(len = value.len(), max, "put rejected: value too large");
                callback(false);
                return;
            }
            let ok = rpc::store_rpc::store(inner, key_id, value).await;
            callback(ok);
        });
    }

    /// Add a peer to the routing table, optionally pinging it first to
    /// confirm liveness before admitting it (spec.md §4.1).
    pub fn addref(&self, destination: Vec<u8>, ping_first: bool) {
        if !ping_first {
            let mut rt = self.inner.routing_table.lock();
            rt.just_seen(Peer::new(destination));
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move {
            if rpc::ping::ping(inner.clone(), destination.clone()).await {
                let mut rt = inner.routing_table.lock();
                rt.just_seen(Peer::new(destination));
            }
        });
    }
}
