//! Peer records (spec.md §3 "Peer")

use crate::id::Identifier;
use std::time::Instant;

/// A known peer: its opaque transport destination, derived identifier,
/// and last-seen timestamp. Identifier is a pure function of destination;
/// two peers compare equal iff their identifiers match.
#[derive(Clone, Debug)]
pub struct Peer {
    pub destination: Vec<u8>,
    pub id: Identifier,
    pub last_seen: Instant,
}

impl Peer {
    pub fn new(destination: Vec<u8>) -> Self {
        let id = Identifier::from_destination(&destination);
        Peer {
            destination,
            id,
            last_seen: Instant::now(),
        }
    }

    /// Refresh `last_seen`; called whenever any message arrives from this peer.
    pub fn just_seen(&mut self) {
        self.last_seen = Instant::now();
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Peer {}

impl std::hash::Hash for Peer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_identifier() {
        let a = Peer::new(b"dest-a".to_vec());
        let b = Peer::new(b"dest-a".to_vec());
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_destinations_differ() {
        let a = Peer::new(b"dest-a".to_vec());
        let b = Peer::new(b"dest-b".to_vec());
        assert_ne!(a, b);
    }
}
