//! K-buckets and the routing table (spec.md §3, §4.1)

use crate::id::{Identifier, ID_BITS};
use crate::peer::Peer;
use std::collections::VecDeque;

/// A single k-bucket: an insertion-ordered, capacity-bounded list of
/// peers. Head is least-recently-seen, tail is most-recently-seen.
#[derive(Debug)]
pub struct KBucket {
    nodes: VecDeque<Peer>,
    cap: usize,
}

impl KBucket {
    pub fn new(cap: usize) -> Self {
        KBucket {
            nodes: VecDeque::new(),
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.nodes.len() >= self.cap
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.nodes.iter()
    }

    /// Insertion discipline of spec.md §3:
    /// 1. present -> move to tail
    /// 2. room -> append
    /// 3. full -> stay full, return the head as an eviction candidate
    ///
    /// Returns `true` if `peer` now occupies a slot in this bucket.
    pub fn just_seen_peer(&mut self, mut peer: Peer) -> bool {
        if let Some(pos) = self.nodes.iter().position(|p| p.id == peer.id) {
            self.nodes.remove(pos);
            peer.just_seen();
            self.nodes.push_back(peer);
            return true;
        }
        if self.nodes.len() < self.cap {
            self.nodes.push_back(peer);
            return true;
        }
        false
    }

    /// The least-recently-seen peer, worth probing before evicting it in
    /// favour of a newly-seen peer that found the bucket full. Nothing in
    /// this crate invokes this automatically (see SPEC_FULL.md §5) — it's
    /// a seam for a death-row policy, not a policy itself.
    pub fn evict_candidate(&self) -> Option<&Peer> {
        self.nodes.front()
    }
}

/// Array of 160 k-buckets indexed by distance-to-self.
pub struct RoutingTable {
    self_id: Identifier,
    buckets: Vec<KBucket>,
    cap: usize,
}

impl RoutingTable {
    pub fn new(self_id: Identifier, cap: usize) -> Self {
        let buckets = (0..ID_BITS).map(|_| KBucket::new(cap)).collect();
        RoutingTable {
            self_id,
            buckets,
            cap,
        }
    }

    pub fn self_id(&self) -> Identifier {
        self.self_id
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// The only mutation path (spec.md §4.1): invoked on every inbound
    /// datagram and every outbound send. A peer equal to `self_id` is
    /// silently ignored — the local node never appears in its own table.
    pub fn just_seen(&mut self, peer: Peer) {
        if let Some(idx) = self.self_id.bucket_index(&peer.id) {
            self.buckets[idx as usize].just_seen_peer(peer);
        }
    }

    pub fn bucket(&self, index: u32) -> &KBucket {
        &self.buckets[index as usize]
    }

    /// Which bucket a peer with this id would land in.
    pub fn bucket_index_for(&self, id: &Identifier) -> Option<u32> {
        self.self_id.bucket_index(id)
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All known peers, for persistence / diagnostics.
    pub fn all_peers(&self) -> Vec<Peer> {
        self.buckets
            .iter()
            .flat_map(|b| b.iter().cloned())
            .collect()
    }

    /// The `count` peers closest to `target`, ascending by XOR distance,
    /// ties broken lexicographically on destination (spec.md §4.1).
    pub fn closest(&self, target: &Identifier, count: usize) -> Vec<Peer> {
        let mut all = self.all_peers();
        sort_by_distance(&mut all, target);
        all.truncate(count);
        all
    }
}

/// Shared sort used by the routing table and by FIND_NODE/FIND_VALUE
/// query tables: ascending XOR distance to `target`, ties on destination.
pub fn sort_by_distance(peers: &mut [Peer], target: &Identifier) {
    peers.sort_by(|a, b| {
        let da = a.id.xor(target);
        let db = b.id.xor(target);
        da.cmp(&db).then_with(|| a.destination.cmp(&b.destination))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RoutingTable {
        RoutingTable::new(Identifier::from_destination(b"self"), 20)
    }

    #[test]
    fn bucket_count_is_160() {
        let t = table();
        assert_eq!(t.buckets.len(), ID_BITS as usize);
    }

    #[test]
    fn peer_lands_in_its_computed_bucket() {
        let mut t = table();
        let peer = Peer::new(b"other".to_vec());
        let expected = t.self_id.bucket_index(&peer.id).unwrap();
        t.just_seen(peer.clone());
        assert!(t.bucket(expected).iter().any(|p| p.id == peer.id));
    }

    #[test]
    fn self_id_never_enters_table() {
        let mut t = table();
        let self_peer = Peer::new(b"self".to_vec());
        t.just_seen(self_peer);
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn bucket_never_exceeds_cap() {
        let mut t = RoutingTable::new(Identifier::from_destination(b"self"), 2);
        for i in 0..10 {
            let dest = format!("peer-{}", i).into_bytes();
            t.just_seen(Peer::new(dest));
        }
        for b in 0..ID_BITS {
            assert!(t.bucket(b).len() <= 2);
        }
    }

    #[test]
    fn just_seen_moves_existing_peer_to_tail() {
        let mut bucket = KBucket::new(20);
        let p1 = Peer::new(b"a".to_vec());
        let p2 = Peer::new(b"b".to_vec());
        bucket.just_seen_peer(p1.clone());
        bucket.just_seen_peer(p2.clone());
        bucket.just_seen_peer(p1.clone());
        let ids: Vec<_> = bucket.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![p2.id, p1.id]);
    }

    #[test]
    fn closest_sorted_ascending_by_xor_distance() {
        let mut t = table();
        for i in 0..30 {
            t.just_seen(Peer::new(format!("peer-{}", i).into_bytes()));
        }
        let target = Identifier::from_destination(b"target");
        let closest = t.closest(&target, 5);
        assert!(closest.len() <= 5);
        for w in closest.windows(2) {
            assert!(w[0].id.xor(&target) <= w[1].id.xor(&target));
        }
    }
}
