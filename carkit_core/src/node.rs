//! Node codecs and link extraction.
//!
//! A node is the decoded view of a block. DAG-CBOR blocks decode to any
//! [`Ipld`] value; raw blocks decode to [`Ipld::Bytes`] and carry no links.

use crate::error::{Error, Result};
use crate::hash::Codec;
use cid::Cid;
use ipld_core::ipld::Ipld;

/// Decode block bytes under `codec`.
pub fn decode(codec: Codec, data: &[u8]) -> Result<Ipld> {
    match codec {
        Codec::Raw => Ok(Ipld::Bytes(data.to_vec())),
        Codec::DagCbor => serde_ipld_dagcbor::from_slice(data)
            .map_err(|e| Error::codec(format!("DAG-CBOR decode failed: {}", e))),
    }
}

/// Encode a node under `codec`.
///
/// Raw accepts only [`Ipld::Bytes`].
pub fn encode(codec: Codec, node: &Ipld) -> Result<Vec<u8>> {
    match (codec, node) {
        (Codec::Raw, Ipld::Bytes(bytes)) => Ok(bytes.clone()),
        (Codec::Raw, _) => Err(Error::codec("raw codec can only encode bytes")),
        (Codec::DagCbor, node) => serde_ipld_dagcbor::to_vec(node)
            .map_err(|e| Error::codec(format!("DAG-CBOR encode failed: {}", e))),
    }
}

/// Every link in `node`, in structural order.
///
/// Map values are visited in key order, list items in list order, nested
/// values before later siblings. Uses an explicit stack so deeply nested
/// nodes cannot exhaust the call stack.
pub fn links_of(node: &Ipld) -> Vec<Cid> {
    let mut links = Vec::new();
    let mut stack = vec![node];

    while let Some(current) = stack.pop() {
        match current {
            Ipld::Link(cid) => links.push(*cid),
            Ipld::List(items) => stack.extend(items.iter().rev()),
            Ipld::Map(map) => stack.extend(map.values().rev()),
            _ => {}
        }
    }

    links
}

/// Links of a block, decoded under the codec named by its CID.
pub fn block_links(cid: &Cid, data: &[u8]) -> Result<Vec<Cid>> {
    match Codec::of(cid)? {
        Codec::Raw => Ok(Vec::new()),
        codec => Ok(links_of(&decode(codec, data)?)),
    }
}
