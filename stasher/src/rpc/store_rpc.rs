//! STORE RPC (spec.md §4.8)
//!
//! PUT always writes to the local store first, then fans out to the
//! `NumStore` nodes closest to the key as returned by a FIND_NODE lookup.
//! A peer that never replies is simply not counted; the local write alone
//! already makes the overall PUT a success, matching the original's
//! "storing locally always counts" behaviour.

use crate::id::Identifier;
use crate::message::{Message, ReplyPayload, Request};
use crate::node::NodeInner;
use crate::peer::Peer;
use std::sync::Arc;

/// Store `value` under `key`, locally and on the `num_store` closest peers.
/// Returns `true` once the local write has succeeded, regardless of how
/// many remote STORE replies arrive.
pub async fn store(node: Arc<NodeInner>, key: Identifier, value: Vec<u8>) -> bool {
    if node.store.put_value(&key.to_hex(), &value).is_err() {
        return false;
    }

    let targets = super::find::find_node(node.clone(), key, false).await;
    let num_store = node.config.num_store;
    let mut sends = Vec::new();
    for destination in targets.into_iter().take(num_store) {
        if destination == node.self_destination {
            continue;
        }
        let node_cl = node.clone();
        let value_cl = value.clone();
        sends.push(async move { store_one(node_cl, destination, key, value_cl).await });
    }
    futures::future::join_all(sends).await;
    true
}

async fn store_one(node: Arc<NodeInner>, destination: Vec<u8>, key: Identifier, value: Vec<u8>) -> bool {
    let msg_id = node.fresh_msg_id();
    let rx = super::bind(&node, destination.clone(), msg_id);
    node.routing_table.lock().just_seen(Peer::new(destination.clone()));
    node.transport.send_to(
        &destination,
        &Message::Request {
            msg_id,
            request: Request::Store { key, value },
        }
        .encode(),
    );
    let timeout = node.config.t_store;
    match super::await_reply(&node, destination, msg_id, rx, timeout).await {
        Some((_, ReplyPayload::Store { status })) => status,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::node::{Node, NodeOptions};
    use crate::transport::MemoryNetwork;

    #[tokio::test]
    async fn store_always_succeeds_locally_even_with_no_peers() {
        let net = MemoryNetwork::new();
        let a = Node::new(net.transport(b"a".to_vec()), NodeOptions::ephemeral()).unwrap();
        a.start();
        assert!(a.put(b"k", b"v".to_vec()).await);
        assert_eq!(a.get(b"k", true).await, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn store_fans_out_to_known_peer() {
        let net = MemoryNetwork::new();
        let a = Node::new(net.transport(b"a".to_vec()), NodeOptions::ephemeral()).unwrap();
        let b = Node::new(net.transport(b"b".to_vec()), NodeOptions::ephemeral()).unwrap();
        a.start();
        b.start();
        a.addref(b"b".to_vec(), false);
        b.addref(b"a".to_vec(), false);

        assert!(a.put(b"shared-key", b"payload".to_vec()).await);
        assert_eq!(b.get(b"shared-key", true).await, Some(b"payload".to_vec()));
    }
}
