//! Block store interface and the in-memory implementation.

use crate::block::Block;
use crate::error::{Error, Result};
use crate::hash::{Codec, HashAlgorithm, compute_cid};
use crate::node;
use cid::Cid;
use ipld_core::ipld::Ipld;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A content-addressed block store.
///
/// There is no update or delete: changed bytes have a different CID.
/// Implementations must make `put_keyed` safe to call concurrently with the
/// same key.
pub trait Blockstore {
    /// Hash function `put` uses to compute CIDs.
    fn algorithm(&self) -> HashAlgorithm;

    /// Whether a block is present.
    fn has(&self, cid: &Cid) -> Result<bool>;

    /// Fetch a block's bytes, failing with `NotFound` if absent.
    fn get(&self, cid: &Cid) -> Result<Vec<u8>>;

    /// Store bytes under a CID the caller has already computed or verified.
    /// A no-op if the block is present.
    fn put_keyed(&self, cid: &Cid, data: &[u8]) -> Result<()>;

    /// Hash `data` with the store's algorithm, store it, and return its CID.
    fn put(&self, codec: Codec, data: &[u8]) -> Result<Cid> {
        let cid = compute_cid(codec, self.algorithm(), data);
        self.put_keyed(&cid, data)?;
        Ok(cid)
    }

    /// Store a block.
    fn put_block(&self, block: &Block) -> Result<()> {
        self.put_keyed(&block.cid, &block.data)
    }

    /// Fetch a block.
    fn get_block(&self, cid: &Cid) -> Result<Block> {
        Ok(Block {
            cid: *cid,
            data: self.get(cid)?,
        })
    }

    /// Encode a node and store it.
    fn put_node(&self, codec: Codec, node: &Ipld) -> Result<Cid> {
        self.put(codec, &node::encode(codec, node)?)
    }

    /// Fetch a block and decode it under the codec named by its CID.
    fn get_node(&self, cid: &Cid) -> Result<Ipld> {
        node::decode(Codec::of(cid)?, &self.get(cid)?)
    }
}

impl<T: Blockstore + ?Sized> Blockstore for &T {
    fn algorithm(&self) -> HashAlgorithm {
        (**self).algorithm()
    }

    fn has(&self, cid: &Cid) -> Result<bool> {
        (**self).has(cid)
    }

    fn get(&self, cid: &Cid) -> Result<Vec<u8>> {
        (**self).get(cid)
    }

    fn put_keyed(&self, cid: &Cid, data: &[u8]) -> Result<()> {
        (**self).put_keyed(cid, data)
    }
}

impl<T: Blockstore + ?Sized> Blockstore for Arc<T> {
    fn algorithm(&self) -> HashAlgorithm {
        (**self).algorithm()
    }

    fn has(&self, cid: &Cid) -> Result<bool> {
        (**self).has(cid)
    }

    fn get(&self, cid: &Cid) -> Result<Vec<u8>> {
        (**self).get(cid)
    }

    fn put_keyed(&self, cid: &Cid, data: &[u8]) -> Result<()> {
        (**self).put_keyed(cid, data)
    }
}

/// A block store held in memory.
#[derive(Debug, Default)]
pub struct MemoryBlockstore {
    algorithm: HashAlgorithm,
    blocks: RwLock<HashMap<Cid, Vec<u8>>>,
}

impl MemoryBlockstore {
    /// Create an empty store hashing with SHA2-256.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store hashing with `algorithm`.
    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            blocks: RwLock::default(),
        }
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    /// Whether no blocks are stored.
    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    /// All stored CIDs, in arbitrary order.
    pub fn cids(&self) -> Vec<Cid> {
        self.blocks.read().keys().copied().collect()
    }
}

impl Blockstore for MemoryBlockstore {
    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn has(&self, cid: &Cid) -> Result<bool> {
        Ok(self.blocks.read().contains_key(cid))
    }

    fn get(&self, cid: &Cid) -> Result<Vec<u8>> {
        self.blocks
            .read()
            .get(cid)
            .cloned()
            .ok_or_else(|| Error::not_found(*cid))
    }

    fn put_keyed(&self, cid: &Cid, data: &[u8]) -> Result<()> {
        self.blocks
            .write()
            .entry(*cid)
            .or_insert_with(|| data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_put_get_has() {
        let store = MemoryBlockstore::new();
        let cid = store.put(Codec::Raw, b"hello").unwrap();

        assert!(store.has(&cid).unwrap());
        assert_eq!(store.get(&cid).unwrap(), b"hello");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_idempotent() {
        let store = MemoryBlockstore::new();
        let a = store.put(Codec::Raw, b"same").unwrap();
        let b = store.put(Codec::Raw, b"same").unwrap();

        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_not_found() {
        let store = MemoryBlockstore::new();
        let cid = compute_cid(Codec::Raw, HashAlgorithm::Sha2_256, b"absent");

        assert!(!store.has(&cid).unwrap());
        assert!(matches!(store.get(&cid), Err(Error::NotFound { cid: c }) if c == cid));
    }

    #[test]
    fn test_algorithm_used_by_put() {
        let store = MemoryBlockstore::with_algorithm(HashAlgorithm::Blake3);
        let cid = store.put(Codec::Raw, b"data").unwrap();
        assert_eq!(cid.hash().code(), HashAlgorithm::Blake3.code());
    }

    #[test]
    fn test_put_get_node() {
        let store = MemoryBlockstore::new();
        let mut map = BTreeMap::new();
        map.insert("S".to_string(), Ipld::String("foo".into()));
        map.insert("I".to_string(), Ipld::Integer(100));
        map.insert("B".to_string(), Ipld::Bool(false));
        let node = Ipld::Map(map);

        let cid = store.put_node(Codec::DagCbor, &node).unwrap();
        assert_eq!(cid.codec(), Codec::DagCbor.code());
        assert_eq!(store.get_node(&cid).unwrap(), node);
    }

    #[test]
    fn test_blanket_impls() {
        fn count<S: Blockstore>(store: S, cid: &Cid) -> bool {
            store.has(cid).unwrap()
        }

        let store = Arc::new(MemoryBlockstore::new());
        let cid = (&*store).put(Codec::Raw, b"shared").unwrap();
        assert!(count(&*store, &cid));
        assert!(count(Arc::clone(&store), &cid));
    }

    #[test]
    fn test_concurrent_identical_puts() {
        let store = MemoryBlockstore::new();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for i in 0..50u8 {
                        store.put(Codec::Raw, &[i]).unwrap();
                    }
                });
            }
        });

        assert_eq!(store.len(), 50);
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            max_shrink_iters: 10000,
            ..ProptestConfig::default()
        })]

        /// Putting the same bytes twice yields one stored copy
        #[test]
        fn prop_put_idempotent(data: Vec<u8>) {
            let store = MemoryBlockstore::new();
            let a = store.put(Codec::Raw, &data)?;
            let b = store.put(Codec::Raw, &data)?;
            prop_assert_eq!(a, b);
            prop_assert_eq!(store.len(), 1);
            prop_assert_eq!(store.get(&a)?, data);
        }
    }
}
