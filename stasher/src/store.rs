//! Local persistent store: `noderefs` and `values` (spec.md §3, §4.3, §6)
//!
//! Backed by `rocksdb`, the storage crate the teacher workspace already
//! depends on (`core/qnet-state`), using one column family per map instead
//! of `qnet-state`'s in-memory `HashMap` stub.

use crate::codec::Value;
use crate::error::{StasherError, StasherResult};
use crate::id::Identifier;
use crate::peer::Peer;
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

const CF_NODEREFS: &str = "noderefs";
const CF_VALUES: &str = "values";

pub struct LocalStore {
    db: DB,
}

impl LocalStore {
    pub fn open(path: impl AsRef<Path>) -> StasherResult<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_NODEREFS, Options::default()),
            ColumnFamilyDescriptor::new(CF_VALUES, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&db_opts, path, cfs)?;
        Ok(LocalStore { db })
    }

    fn cf_noderefs(&self) -> &rocksdb::ColumnFamily {
        self.db.cf_handle(CF_NODEREFS).expect("noderefs cf opened at startup")
    }

    fn cf_values(&self) -> &rocksdb::ColumnFamily {
        self.db.cf_handle(CF_VALUES).expect("values cf opened at startup")
    }

    /// Store a value under its 40-hex hashed key. Durable on success.
    pub fn put_value(&self, hashed_key: &str, bytes: &[u8]) -> StasherResult<bool> {
        self.db.put_cf(self.cf_values(), hashed_key.as_bytes(), bytes)?;
        Ok(true)
    }

    /// Look up a value by its 40-hex hashed key.
    pub fn get_value(&self, hashed_key: &str) -> StasherResult<Option<Vec<u8>>> {
        Ok(self.db.get_cf(self.cf_values(), hashed_key.as_bytes())?)
    }

    /// Record peers, keyed by `sha1(destination)`. Idempotent: re-adding a
    /// known destination just overwrites its record with itself.
    pub fn put_refs(&self, peers: &[Peer]) -> StasherResult<()> {
        for peer in peers {
            let key = Identifier::from_destination(&peer.destination).to_hex();
            let mut map = BTreeMap::new();
            map.insert(b"dest".to_vec(), Value::Bytes(peer.destination.clone()));
            let encoded = crate::codec::encode(&Value::Dict(map));
            self.db.put_cf(self.cf_noderefs(), key.as_bytes(), encoded)?;
        }
        Ok(())
    }

    /// All known noderefs. Corrupt records are skipped and logged, never
    /// fatal (spec.md §4.3).
    pub fn get_refs(&self) -> StasherResult<Vec<Peer>> {
        let mut out = Vec::new();
        let iter = self.db.iterator_cf(self.cf_noderefs(), rocksdb::IteratorMode::Start);
        for item in iter {
            let (key, raw) = item?;
            match crate::codec::decode(&raw) {
                Ok(value) => match value.as_dict().and_then(|d| d.get(b"dest".as_slice())).and_then(Value::as_bytes) {
                    Some(dest) => out.push(Peer::new(dest.to_vec())),
                    None => warn!(key = %String::from_utf8_lossy(&key), "noderef record missing dest field, skipping"),
                },
                Err(e) => warn!(key = %String::from_utf8_lossy(&key), error = %e, "corrupt noderef record, skipping"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn put_then_get_value_round_trips() {
        let (_dir, store) = temp_store();
        let key = Identifier::from_destination(b"hello").to_hex();
        assert!(store.put_value(&key, b"world").unwrap());
        assert_eq!(store.get_value(&key).unwrap(), Some(b"world".to_vec()));
    }

    #[test]
    fn get_value_missing_is_none() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get_value(&"0".repeat(40)).unwrap(), None);
    }

    #[test]
    fn put_refs_is_idempotent_on_destination() {
        let (_dir, store) = temp_store();
        let peer = Peer::new(b"peer-a".to_vec());
        store.put_refs(&[peer.clone()]).unwrap();
        store.put_refs(&[peer.clone()]).unwrap();
        let refs = store.get_refs().unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id, peer.id);
    }

    #[test]
    fn get_refs_reflects_all_prior_put_refs() {
        let (_dir, store) = temp_store();
        let peers: Vec<_> = (0..5).map(|i| Peer::new(format!("peer-{}", i).into_bytes())).collect();
        store.put_refs(&peers).unwrap();
        let refs = store.get_refs().unwrap();
        assert_eq!(refs.len(), 5);
    }

    #[test]
    fn values_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let key = Identifier::from_destination(b"k").to_hex();
        {
            let store = LocalStore::open(dir.path()).unwrap();
            store.put_value(&key, b"v").unwrap();
        }
        let store = LocalStore::open(dir.path()).unwrap();
        assert_eq!(store.get_value(&key).unwrap(), Some(b"v".to_vec()));
    }
}
