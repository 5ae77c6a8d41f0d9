//! CARv1 container format.
//!
//! An archive is a concatenation of varint frames: an unsigned LEB128 body
//! length followed by the body.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────┐
//! │varint: len   │header: DAG-CBOR {roots: [CID], version: 1}
//! ├──────────────┼───────────┬──────────────────────────┤
//! │varint: len   │CID bytes  │block data                │
//! ├──────────────┼───────────┼──────────────────────────┤
//! │...           │...        │...                       │
//! └──────────────┴───────────┴──────────────────────────┘
//! ```
//!
//! CID bytes are self-describing (version, codec, multihash code, digest
//! length, digest), so a reader can check each block without any other
//! context. Block frames appear in the order the writer walked the DAG.

use crate::block::Block;
use crate::error::{Error, Result};
use cid::Cid;
use integer_encoding::VarInt;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// The only archive version this crate reads or writes.
pub const CAR_VERSION: u64 = 1;

/// Archive header: format version and the ordered root list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarHeader {
    #[serde(default)]
    pub roots: Vec<Cid>,
    pub version: u64,
}

impl CarHeader {
    /// Create a version 1 header.
    pub fn new(roots: Vec<Cid>) -> Self {
        Self {
            roots,
            version: CAR_VERSION,
        }
    }

    /// Encode the header as DAG-CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_ipld_dagcbor::to_vec(self)
            .map_err(|e| Error::codec(format!("header encode failed: {}", e)))
    }

    /// Decode and validate a header frame body.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header: CarHeader = serde_ipld_dagcbor::from_slice(bytes)
            .map_err(|e| Error::malformed_header(format!("cannot decode header: {}", e)))?;

        if header.version != CAR_VERSION {
            return Err(Error::malformed_header(format!(
                "unsupported version {} (expected {})",
                header.version, CAR_VERSION
            )));
        }

        if header.roots.is_empty() {
            return Err(Error::malformed_header("root list is empty"));
        }

        Ok(header)
    }
}

/// Summary of a written archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarSummary {
    /// Number of roots in the header.
    pub roots: usize,
    /// Number of block frames written.
    pub blocks: usize,
    /// Total archive size in bytes.
    pub bytes: u64,
}

/// Write one varint frame whose body is the concatenation of `parts`.
///
/// Returns the number of bytes written, prefix included.
pub(crate) fn write_frame<W: Write>(sink: &mut W, parts: &[&[u8]]) -> Result<u64> {
    let body_len: usize = parts.iter().map(|part| part.len()).sum();
    let prefix = (body_len as u64).encode_var_vec();

    sink.write_all(&prefix)?;
    for part in parts {
        sink.write_all(part)?;
    }

    Ok((prefix.len() + body_len) as u64)
}

/// Write a block frame.
pub(crate) fn write_block_frame<W: Write>(sink: &mut W, block: &Block) -> Result<u64> {
    write_frame(sink, &[&block.cid.to_bytes(), &block.data])
}

/// Split a block frame body into CID and data. `offset` is reported on error.
pub(crate) fn parse_block_frame(body: Vec<u8>, offset: u64) -> Result<Block> {
    if body.is_empty() {
        return Err(Error::malformed_entry(offset, "empty block frame"));
    }

    let mut cursor = std::io::Cursor::new(body.as_slice());
    let cid = Cid::read_bytes(&mut cursor)
        .map_err(|e| Error::malformed_entry(offset, format!("invalid CID: {}", e)))?;
    let cid_len = cursor.position() as usize;

    let mut data = body;
    data.drain(..cid_len);

    Ok(Block { cid, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{Codec, HashAlgorithm, compute_cid};
    use ipld_core::ipld::Ipld;
    use std::collections::BTreeMap;

    fn sample_cid(data: &[u8]) -> Cid {
        compute_cid(Codec::DagCbor, HashAlgorithm::Sha2_256, data)
    }

    #[test]
    fn test_header_roundtrip() {
        let header = CarHeader::new(vec![sample_cid(b"a"), sample_cid(b"b")]);
        let bytes = header.encode().unwrap();
        assert_eq!(CarHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_header_is_dag_cbor_map() {
        let root = sample_cid(b"root");
        let bytes = CarHeader::new(vec![root]).encode().unwrap();

        let node: Ipld = serde_ipld_dagcbor::from_slice(&bytes).unwrap();
        let mut expected = BTreeMap::new();
        expected.insert("roots".to_string(), Ipld::List(vec![Ipld::Link(root)]));
        expected.insert("version".to_string(), Ipld::Integer(1));
        assert_eq!(node, Ipld::Map(expected));
    }

    #[test]
    fn test_header_rejects_other_versions() {
        let mut header = CarHeader::new(vec![sample_cid(b"a")]);
        header.version = 2;
        let bytes = header.encode().unwrap();
        assert!(matches!(
            CarHeader::decode(&bytes),
            Err(Error::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_header_carv2_pragma_without_roots() {
        let mut map = BTreeMap::new();
        map.insert("version".to_string(), Ipld::Integer(2));
        let bytes = serde_ipld_dagcbor::to_vec(&Ipld::Map(map)).unwrap();
        match CarHeader::decode(&bytes) {
            Err(Error::MalformedHeader { reason }) => assert!(reason.contains("version 2")),
            other => panic!("expected MalformedHeader, got {:?}", other),
        }
    }

    #[test]
    fn test_header_rejects_empty_roots_and_garbage() {
        let bytes = CarHeader::new(vec![]).encode().unwrap();
        assert!(matches!(
            CarHeader::decode(&bytes),
            Err(Error::MalformedHeader { .. })
        ));
        assert!(matches!(
            CarHeader::decode(&[0x01, 0x02, 0x03]),
            Err(Error::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_block_frame_layout() {
        let block = Block::new(Codec::Raw, HashAlgorithm::Sha2_256, b"data".to_vec());
        let mut buf = Vec::new();
        let written = write_block_frame(&mut buf, &block).unwrap();
        assert_eq!(written as usize, buf.len());

        let (len, prefix_len) = u64::decode_var(&buf).unwrap();
        assert_eq!(len as usize, block.encoded_len());
        assert_eq!(prefix_len + block.encoded_len(), buf.len());

        let parsed = parse_block_frame(buf[prefix_len..].to_vec(), 0).unwrap();
        assert_eq!(parsed, block);
    }

    #[test]
    fn test_parse_block_frame_errors() {
        assert!(matches!(
            parse_block_frame(Vec::new(), 7),
            Err(Error::MalformedEntry { offset: 7, .. })
        ));
        assert!(matches!(
            parse_block_frame(vec![0xff, 0xff, 0xff], 9),
            Err(Error::MalformedEntry { offset: 9, .. })
        ));
    }
}
