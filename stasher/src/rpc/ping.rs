//! PING RPC (spec.md §4.5)

use crate::message::{Message, Request};
use crate::node::NodeInner;
use crate::peer::Peer;
use std::sync::Arc;

/// Ping `destination` and report whether it replied within `config.t_ping`.
pub async fn ping(node: Arc<NodeInner>, destination: Vec<u8>) -> bool {
    let msg_id = node.fresh_msg_id();
    let rx = super::bind(&node, destination.clone(), msg_id);
    node.routing_table.lock().just_seen(Peer::new(destination.clone()));
    node.transport.send_to(
        &destination,
        &Message::Request {
            msg_id,
            request: Request::Ping,
        }
        .encode(),
    );
    let timeout = node.config.t_ping;
    super::await_reply(&node, destination, msg_id, rx, timeout)
        .await
        .is_some()
}

#[cfg(test)]
mod tests {
    use crate::node::{Node, NodeOptions};
    use crate::transport::MemoryNetwork;

    #[tokio::test]
    async fn ping_live_peer_succeeds() {
        let net = MemoryNetwork::new();
        let a = Node::new(
            net.transport(b"a".to_vec()),
            NodeOptions::ephemeral(),
        )
        .unwrap();
        let b = Node::new(
            net.transport(b"b".to_vec()),
            NodeOptions::ephemeral(),
        )
        .unwrap();
        a.start();
        b.start();
        assert!(a.ping(b"b".to_vec()).await);
    }

    #[tokio::test]
    async fn ping_unknown_destination_times_out() {
        let net = MemoryNetwork::new();
        let a = Node::new(net.transport(b"a".to_vec()), NodeOptions::ephemeral_fast_timeout()).unwrap();
        a.start();
        assert!(!a.ping(b"nowhere".to_vec()).await);
    }
}
