//! FIND_NODE and FIND_VALUE: the iterative lookup (spec.md §4.6, §4.7)
//!
//! The centrepiece of the RPC engine. A per-invocation query table tracks
//! each candidate peer through `start -> queried -> {replied, timeout}`,
//! then `{replied -> closest, recommended -> start}` at end-of-round,
//! exactly as spec.md §4.6 describes, rather than the teacher's flat
//! single-pass `iterative_find_node` loop.

use crate::bucket::sort_by_distance;
use crate::id::Identifier;
use crate::message::{Message, ReplyPayload, Request};
use crate::node::NodeInner;
use crate::peer::Peer;
use std::sync::Arc;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QueryState {
    Start,
    Queried,
    Replied,
    Timeout,
    Recommended,
    Closest,
    TooFar,
}

struct QueryRecord {
    peer: Peer,
    state: QueryState,
}

#[derive(Default)]
struct QueryTable {
    records: Vec<QueryRecord>,
}

impl QueryTable {
    fn new() -> Self {
        QueryTable::default()
    }

    /// Append, deduplicating by destination. Returns `false` if already present.
    fn append(&mut self, peer: Peer, state: QueryState) -> bool {
        if self.records.iter().any(|r| r.peer.destination == peer.destination) {
            return false;
        }
        self.records.push(QueryRecord { peer, state });
        true
    }

    fn select_by_state(&self, state: QueryState) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.state == state)
            .map(|(i, _)| i)
            .collect()
    }

    fn count_by_state(&self, state: QueryState) -> usize {
        self.records.iter().filter(|r| r.state == state).count()
    }

    fn set_state(&mut self, idx: usize, state: QueryState) {
        self.records[idx].state = state;
    }

    fn bulk_transition(&mut self, from: QueryState, to: QueryState) {
        for record in self.records.iter_mut() {
            if record.state == from {
                record.state = to;
            }
        }
    }

    fn sort_by_distance(&mut self, target: &Identifier) {
        self.records.sort_by(|a, b| {
            let da = a.peer.id.xor(target);
            let db = b.peer.id.xor(target);
            da.cmp(&db)
                .then_with(|| a.peer.destination.cmp(&b.peer.destination))
        });
    }
}

pub enum FindOutcome {
    Nodes(Vec<Vec<u8>>),
    Value(Vec<u8>),
}

/// FIND_NODE: find the K closest live peers to `target`.
pub async fn find_node(node: Arc<NodeInner>, target: Identifier, local_only: bool) -> Vec<Vec<u8>> {
    match lookup(node, target, local_only, false).await {
        FindOutcome::Nodes(dests) => dests,
        FindOutcome::Value(_) => unreachable!("find_node never asks for a value"),
    }
}

/// FIND_VALUE: check the local store first, then fall back to an
/// iterative lookup that may short-circuit on a value reply.
pub async fn find_value(node: Arc<NodeInner>, key: Identifier, local_only: bool) -> Option<Vec<u8>> {
    if let Ok(Some(value)) = node.store.get_value(&key.to_hex()) {
        return Some(value);
    }
    match lookup(node, key, local_only, true).await {
        FindOutcome::Value(value) => Some(value),
        FindOutcome::Nodes(_) => None,
    }
}

async fn lookup(node: Arc<NodeInner>, target: Identifier, local_only: bool, want_value: bool) -> FindOutcome {
    let k = node.config.k;
    let alpha = node.config.alpha;

    let seed = {
        let rt = node.routing_table.lock();
        rt.closest(&target, k)
    };
    if seed.is_empty() {
        return FindOutcome::Nodes(Vec::new());
    }
    if local_only {
        return FindOutcome::Nodes(seed.into_iter().map(|p| p.destination).collect());
    }

    let mut table = QueryTable::new();
    for peer in seed {
        table.append(peer, QueryState::Start);
    }

    loop {
        // Drain every Start-state peer in batches of at most `alpha`
        // concurrent in-flight queries, until none remain — this is "a
        // round" per spec.md §4.6.
        loop {
            let batch: Vec<usize> = table.select_by_state(QueryState::Start).into_iter().take(alpha).collect();
            if batch.is_empty() {
                break;
            }
            if let Some(value) = query_batch(&node, &mut table, &batch, target, want_value).await {
                return FindOutcome::Value(value);
            }
        }

        // End-of-round detection: no records remain in Start or Queried.
        debug_assert_eq!(table.count_by_state(QueryState::Start), 0);
        debug_assert_eq!(table.count_by_state(QueryState::Queried), 0);

        table.bulk_transition(QueryState::Replied, QueryState::Closest);
        table.bulk_transition(QueryState::Recommended, QueryState::Start);
        table.sort_by_distance(&target);

        let closest_idx = table.select_by_state(QueryState::Closest);
        if closest_idx.len() > k {
            for &idx in &closest_idx[k..] {
                table.set_state(idx, QueryState::TooFar);
            }
        }

        let closest_after = table.select_by_state(QueryState::Closest);
        let worst_distance = closest_after.last().map(|&i| table.records[i].peer.id.xor(&target));
        let next_round_candidates = table.select_by_state(QueryState::Start);

        // Nothing left to query means the lookup has exhausted every peer
        // it could ever learn of — stop even if fewer than k are closest
        // (a small network may never produce k results at all).
        let continue_lookup = !next_round_candidates.is_empty()
            && (closest_after.len() < k
                || match worst_distance {
                    Some(worst) => next_round_candidates
                        .iter()
                        .any(|&i| table.records[i].peer.id.xor(&target) < worst),
                    None => true,
                });

        if !continue_lookup {
            break;
        }
    }

    let mut closest: Vec<Peer> = table
        .select_by_state(QueryState::Closest)
        .into_iter()
        .map(|i| table.records[i].peer.clone())
        .collect();
    closest.push(Peer::new(node.self_destination.clone()));
    sort_by_distance(&mut closest, &target);
    closest.truncate(k);
    FindOutcome::Nodes(closest.into_iter().map(|p| p.destination).collect())
}

/// Send one batch of concurrent queries, mark each `Queried`, then await
/// all of them and fold the outcomes back into the table. Returns
/// `Some(value)` if a FIND_VALUE reply carried the value itself.
async fn query_batch(
    node: &Arc<NodeInner>,
    table: &mut QueryTable,
    batch: &[usize],
    target: Identifier,
    want_value: bool,
) -> Option<Vec<u8>> {
    let mut pending = Vec::with_capacity(batch.len());
    for &idx in batch {
        table.set_state(idx, QueryState::Queried);
        let destination = table.records[idx].peer.destination.clone();
        let msg_id = node.fresh_msg_id();
        let rx = super::bind(node, destination.clone(), msg_id);
        let request = if want_value {
            Request::FindData { hash: target }
        } else {
            Request::FindNode { hash: target }
        };
        node.routing_table.lock().just_seen(Peer::new(destination.clone()));
        node.transport
            .send_to(&destination, &Message::Request { msg_id, request }.encode());
        let node_cl = node.clone();
        let timeout = node.config.t_find_node;
        pending.push(async move {
            let reply = super::await_reply(&node_cl, destination, msg_id, rx, timeout).await;
            (idx, reply)
        });
    }

    let results = futures::future::join_all(pending).await;
    for (idx, reply) in results {
        match reply {
            Some((from_peer, payload)) => {
                table.set_state(idx, QueryState::Replied);
                {
                    let mut rt = node.routing_table.lock();
                    rt.just_seen(from_peer);
                }
                match payload {
                    ReplyPayload::FindNode { nodes } | ReplyPayload::FindValueNodes { nodes } => {
                        for destination in nodes {
                            if destination == node.self_destination {
                                continue;
                            }
                            table.append(Peer::new(destination), QueryState::Recommended);
                        }
                    }
                    ReplyPayload::FindValueData { value } => return Some(value),
                    _ => {}
                }
            }
            None => table.set_state(idx, QueryState::Timeout),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use crate::node::{Node, NodeOptions};
    use crate::transport::MemoryNetwork;

    #[tokio::test]
    async fn empty_seed_terminates_immediately() {
        let net = MemoryNetwork::new();
        let a = Node::new(net.transport(b"a".to_vec()), NodeOptions::ephemeral()).unwrap();
        a.start();
        let target = crate::id::Identifier::from_destination(b"target");
        let result = a.find_node(target, false).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn local_mode_skips_network() {
        let net = MemoryNetwork::new();
        let a = Node::new(net.transport(b"a".to_vec()), NodeOptions::ephemeral()).unwrap();
        a.addref(b"peer-1".to_vec(), false);
        let target = crate::id::Identifier::from_destination(b"target");
        let result = a.find_node(target, true).await;
        assert_eq!(result, vec![b"peer-1".to_vec()]);
    }

    #[tokio::test]
    async fn ring_of_nodes_converges_to_target() {
        let net = MemoryNetwork::new();
        let n = 10;
        let nodes: Vec<_> = (0..n)
            .map(|i| {
                let dest = format!("ring-{}", i).into_bytes();
                Node::new(net.transport(dest), NodeOptions::ephemeral()).unwrap()
            })
            .collect();
        for node in &nodes {
            node.start();
        }
        for i in 0..n {
            let next = format!("ring-{}", (i + 1) % n).into_bytes();
            nodes[i].addref(next, false);
        }
        let target_dest = format!("ring-{}", n - 1).into_bytes();
        let target_id = crate::id::Identifier::from_destination(&target_dest);
        let result = nodes[0].find_node(target_id, false).await;
        assert!(!result.is_empty());
        assert_eq!(result[0], target_dest);
    }
}
