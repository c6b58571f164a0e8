//! PING_ALL diagnostic (spec.md §4.9)
//!
//! Concurrently pings every peer currently in the routing table and
//! reports how many replied versus timed out. Purely a liveness probe:
//! it does not mutate the routing table beyond what an ordinary PING
//! reply already does through the reactor's inbound path.

use crate::node::NodeInner;
use std::sync::Arc;

pub struct PingAllReport {
    pub replied: usize,
    pub timed_out: usize,
}

pub async fn ping_all(node: Arc<NodeInner>) -> PingAllReport {
    let peers = {
        let rt = node.routing_table.lock();
        rt.all_peers()
    };
    let pings = peers
        .into_iter()
        .map(|peer| {
            let node_cl = node.clone();
            async move { super::ping::ping(node_cl, peer.destination).await }
        })
        .collect::<Vec<_>>();
    let results = futures::future::join_all(pings).await;
    let replied = results.iter().filter(|r| **r).count();
    let timed_out = results.len() - replied;
    PingAllReport { replied, timed_out }
}

#[cfg(test)]
mod tests {
    use crate::node::{Node, NodeOptions};
    use crate::transport::MemoryNetwork;

    #[tokio::test]
    async fn ping_all_counts_live_and_dead_peers() {
        let net = MemoryNetwork::new();
        let a = Node::new(net.transport(b"a".to_vec()), NodeOptions::ephemeral_fast_timeout()).unwrap();
        let b = Node::new(net.transport(b"b".to_vec()), NodeOptions::ephemeral_fast_timeout()).unwrap();
        a.start();
        b.start();
        a.addref(b"b".to_vec(), false);
        a.addref(b"ghost".to_vec(), false);

        let report = a.ping_all().await;
        assert_eq!(report.replied, 1);
        assert_eq!(report.timed_out, 1);
    }
}
