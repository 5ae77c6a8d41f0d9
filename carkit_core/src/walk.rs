//! DAG traversal over a block store.

use crate::block::Block;
use crate::blockstore::Blockstore;
use crate::error::{Error, Result};
use crate::node;
use cid::Cid;
use std::collections::HashSet;

/// Depth-first, first-seen pre-order walk of the DAG under a list of roots.
///
/// Roots are walked in the order given and a block's links in
/// [`node::links_of`] order. Each reachable block is yielded exactly once.
/// The first error ends the walk.
pub struct DagWalker<'a, S: ?Sized> {
    store: &'a S,
    stack: Vec<Cid>,
    visited: HashSet<Cid>,
    failed: bool,
}

impl<'a, S: Blockstore + ?Sized> DagWalker<'a, S> {
    /// Start a walk from `roots`.
    pub fn new(store: &'a S, roots: impl IntoIterator<Item = Cid>) -> Self {
        let mut stack: Vec<Cid> = roots.into_iter().collect();
        stack.reverse();
        Self {
            store,
            stack,
            visited: HashSet::new(),
            failed: false,
        }
    }

    /// Number of distinct CIDs seen so far.
    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    fn visit(&mut self, cid: Cid) -> Result<Block> {
        let data = match self.store.get(&cid) {
            Ok(data) => data,
            Err(Error::NotFound { .. }) => return Err(Error::missing_block(cid)),
            Err(e) => return Err(e),
        };

        let links = node::block_links(&cid, &data)?;
        self.stack.extend(links.into_iter().rev());

        Ok(Block { cid, data })
    }
}

impl<S: Blockstore + ?Sized> Iterator for DagWalker<'_, S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        while let Some(cid) = self.stack.pop() {
            // Already visited
            if !self.visited.insert(cid) {
                continue;
            }

            let result = self.visit(cid);
            self.failed = result.is_err();
            return Some(result);
        }

        None
    }
}

/// Statistics from a completed DAG walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkStats {
    /// Number of distinct blocks reached.
    pub blocks: usize,
    /// Total bytes of block data reached.
    pub bytes: u64,
}

/// Walk every block reachable from `roots`, failing on the first one that
/// cannot be resolved or decoded.
pub fn walk_roots<S: Blockstore + ?Sized>(store: &S, roots: &[Cid]) -> Result<WalkStats> {
    let mut stats = WalkStats {
        blocks: 0,
        bytes: 0,
    };

    for block in DagWalker::new(store, roots.iter().copied()) {
        let block = block?;
        stats.blocks += 1;
        stats.bytes += block.data.len() as u64;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockstore::MemoryBlockstore;
    use crate::hash::{Codec, HashAlgorithm, compute_cid};
    use ipld_core::ipld::Ipld;
    use std::collections::BTreeMap;

    fn put_links(store: &MemoryBlockstore, name: &str, links: &[Cid]) -> Cid {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), Ipld::String(name.to_string()));
        map.insert(
            "links".to_string(),
            Ipld::List(links.iter().map(|c| Ipld::Link(*c)).collect()),
        );
        store.put_node(Codec::DagCbor, &Ipld::Map(map)).unwrap()
    }

    fn walk_order(store: &MemoryBlockstore, roots: &[Cid]) -> Vec<Cid> {
        DagWalker::new(store, roots.iter().copied())
            .map(|b| b.unwrap().cid)
            .collect()
    }

    #[test]
    fn test_walk_single_raw_block() {
        let store = MemoryBlockstore::new();
        let cid = store.put(Codec::Raw, b"leaf").unwrap();
        assert_eq!(walk_order(&store, &[cid]), vec![cid]);
    }

    #[test]
    fn test_walk_preorder_link_order() {
        let store = MemoryBlockstore::new();
        let c = store.put(Codec::Raw, b"c").unwrap();
        let d = store.put(Codec::Raw, b"d").unwrap();
        let b = put_links(&store, "b", &[c]);
        let a = put_links(&store, "a", &[b, d]);

        assert_eq!(walk_order(&store, &[a]), vec![a, b, c, d]);
    }

    #[test]
    fn test_walk_diamond_visits_shared_once() {
        let store = MemoryBlockstore::new();
        let shared = store.put(Codec::Raw, b"shared").unwrap();
        let left = put_links(&store, "left", &[shared]);
        let right = put_links(&store, "right", &[shared]);
        let top = put_links(&store, "top", &[left, right]);

        assert_eq!(walk_order(&store, &[top]), vec![top, left, shared, right]);
    }

    #[test]
    fn test_walk_multiple_roots_in_order() {
        let store = MemoryBlockstore::new();
        let shared = store.put(Codec::Raw, b"shared").unwrap();
        let r1 = put_links(&store, "r1", &[shared]);
        let r2 = put_links(&store, "r2", &[shared]);

        assert_eq!(walk_order(&store, &[r1, r2]), vec![r1, shared, r2]);
        assert_eq!(walk_order(&store, &[r2, r1]), vec![r2, shared, r1]);
        // Duplicate roots collapse
        assert_eq!(walk_order(&store, &[r1, r1]), vec![r1, shared]);
    }

    #[test]
    fn test_walk_missing_block() {
        let store = MemoryBlockstore::new();
        let absent = compute_cid(Codec::Raw, HashAlgorithm::Sha2_256, b"absent");
        let root = put_links(&store, "root", &[absent]);

        let mut walker = DagWalker::new(&store, [root]);
        assert_eq!(walker.next().unwrap().unwrap().cid, root);
        match walker.next() {
            Some(Err(Error::MissingBlock { cid })) => assert_eq!(cid, absent),
            other => panic!("expected MissingBlock, got {:?}", other),
        }
        assert!(walker.next().is_none());
    }

    #[test]
    fn test_walk_roots_stats() {
        let store = MemoryBlockstore::new();
        let leaf = store.put(Codec::Raw, b"12345").unwrap();
        let root = put_links(&store, "root", &[leaf]);

        let stats = walk_roots(&store, &[root]).unwrap();
        assert_eq!(stats.blocks, 2);
        assert_eq!(
            stats.bytes,
            5 + store.get(&root).unwrap().len() as u64
        );
    }

    #[test]
    fn test_walk_deep_chain() {
        let store = MemoryBlockstore::new();
        let mut head = store.put(Codec::Raw, b"tail").unwrap();
        for i in 0..5_000 {
            head = put_links(&store, &i.to_string(), &[head]);
        }

        let stats = walk_roots(&store, &[head]).unwrap();
        assert_eq!(stats.blocks, 5_001);
    }
}
