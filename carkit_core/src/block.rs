//! Blocks: a CID paired with the bytes it names.

use crate::error::{Error, Result};
use crate::hash::{Codec, HashAlgorithm, compute_cid, recompute_cid};
use crate::node;
use cid::Cid;
use ipld_core::ipld::Ipld;

/// A content-addressed block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Block {
    pub cid: Cid,
    pub data: Vec<u8>,
}

impl Block {
    /// Create a block, computing its CID from `data`.
    pub fn new(codec: Codec, algorithm: HashAlgorithm, data: Vec<u8>) -> Self {
        let cid = compute_cid(codec, algorithm, &data);
        Self { cid, data }
    }

    /// Encode a node and wrap the bytes in a block.
    pub fn encode(codec: Codec, algorithm: HashAlgorithm, node: &Ipld) -> Result<Self> {
        let data = node::encode(codec, node)?;
        Ok(Self::new(codec, algorithm, data))
    }

    /// Decode the block's bytes under the codec named by its CID.
    pub fn decode(&self) -> Result<Ipld> {
        node::decode(Codec::of(&self.cid)?, &self.data)
    }

    /// Links embedded in this block, in structural order.
    pub fn links(&self) -> Result<Vec<Cid>> {
        node::block_links(&self.cid, &self.data)
    }

    /// Check that the data hashes to the CID. `offset` is reported on mismatch.
    pub fn validate(&self, offset: u64) -> Result<()> {
        let actual = recompute_cid(&self.cid, &self.data)?;
        if actual != self.cid {
            return Err(Error::integrity_mismatch(self.cid, actual, offset));
        }
        Ok(())
    }

    /// Length of the block in a CAR frame body (CID bytes + data).
    pub fn encoded_len(&self) -> usize {
        self.cid.encoded_len() + self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_block_new_is_valid() {
        let block = Block::new(Codec::Raw, HashAlgorithm::Sha2_256, b"payload".to_vec());
        block.validate(0).unwrap();
        assert!(block.links().unwrap().is_empty());
    }

    #[test]
    fn test_block_validate_mismatch() {
        let mut block = Block::new(Codec::Raw, HashAlgorithm::Blake3, b"payload".to_vec());
        block.data[0] ^= 0xff;
        match block.validate(42) {
            Err(Error::IntegrityMismatch { cid, actual, offset }) => {
                assert_eq!(cid, block.cid);
                assert_ne!(actual, block.cid);
                assert_eq!(offset, 42);
            }
            other => panic!("expected IntegrityMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_block_encode_decode() {
        let target = Block::new(Codec::Raw, HashAlgorithm::Sha2_256, b"leaf".to_vec());
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), Ipld::String("root".into()));
        map.insert("child".to_string(), Ipld::Link(target.cid));
        let node = Ipld::Map(map);

        let block = Block::encode(Codec::DagCbor, HashAlgorithm::Sha2_256, &node).unwrap();
        assert_eq!(block.decode().unwrap(), node);
        assert_eq!(block.links().unwrap(), vec![target.cid]);
        assert_eq!(
            block.encoded_len(),
            block.cid.to_bytes().len() + block.data.len()
        );
    }
}
