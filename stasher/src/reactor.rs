//! The single receive loop that answers inbound datagrams and routes
//! replies back to their bound callers (spec.md §4.4).
//!
//! The teacher has no equivalent of this module — `kademlia.rs` never ran
//! its own receive loop, it only issued outbound RPCs over a socket driven
//! elsewhere. This is new code, grounded directly on spec.md's description
//! of the reactor: one task per node, polling its transport, dispatching
//! replies to bound channels and requests to inline local-state handlers,
//! with a periodic tick for housekeeping instead of a literal 1Hz
//! stateful-RPC sweep.

use crate::message::{Message, ReplyPayload, Request};
use crate::node::NodeInner;
use crate::peer::Peer;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

const POLL_BACKOFF: Duration = Duration::from_millis(5);

pub(crate) fn spawn(node: Arc<NodeInner>) -> JoinHandle<()> {
    tokio::spawn(run(node))
}

async fn run(node: Arc<NodeInner>) {
    let mut ticker = tokio::time::interval(node.config.tick_interval);
    loop {
        match node.transport.try_recv() {
            Some((from, payload)) => handle_datagram(&node, from, payload).await,
            None => {
                tokio::select! {
                    _ = tokio::time::sleep(POLL_BACKOFF) => {}
                    _ = ticker.tick() => persist_refs(&node),
                }
            }
        }
    }
}

fn persist_refs(node: &Arc<NodeInner>) {
    let peers = node.routing_table.lock().all_peers();
    if let Err(e) = node.store.put_refs(&peers) {
        warn!(error = %e, "periodic noderef checkpoint failed");
    }
}

async fn handle_datagram(node: &Arc<NodeInner>, from: Vec<u8>, payload: Vec<u8>) {
    let message = match Message::decode(&payload) {
        Ok(m) => m,
        Err(e) => {
            warn!(peer = ?from, error = %e, "dropping malformed datagram");
            return;
        }
    };

    let peer = Peer::new(from.clone());
    {
        let mut rt = node.routing_table.lock();
        rt.just_seen(peer.clone());
    }

    match message {
        Message::Reply { msg_id, payload } => {
            if let Some(tx) = node.bindings.lock().remove(&(from, msg_id)) {
                let _ = tx.send((peer, payload));
            }
        }
        Message::Request { msg_id, request } => {
            let reply_payload = handle_request(node, request);
            let reply = Message::Reply {
                msg_id,
                payload: reply_payload,
            };
            node.transport.send_to(&from, &reply.encode());
        }
    }
}

fn handle_request(node: &Arc<NodeInner>, request: Request) -> ReplyPayload {
    match request {
        Request::Ping => ReplyPayload::Ping,
        Request::FindNode { hash } => ReplyPayload::FindNode {
            nodes: closest_destinations(node, &hash),
        },
        Request::FindData { hash } => match node.store.get_value(&hash.to_hex()) {
            Ok(Some(value)) => ReplyPayload::FindValueData { value },
            _ => ReplyPayload::FindValueNodes {
                nodes: closest_destinations(node, &hash),
            },
        },
        Request::Store { key, value } => {
            if value.len() > node.config.max_value_len {
                ReplyPayload::Store { status: false }
            } else {
                let status = node.store.put_value(&key.to_hex(), &value).unwrap_or(false);
                ReplyPayload::Store { status }
            }
        }
    }
}

fn closest_destinations(node: &Arc<NodeInner>, target: &crate::id::Identifier) -> Vec<Vec<u8>> {
    node.routing_table
        .lock()
        .closest(target, node.config.k)
        .into_iter()
        .map(|p| p.destination)
        .collect()
}
