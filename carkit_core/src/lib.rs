//! # Carkit Core
//!
//! Content-addressable archives (CARv1) over a content-addressed block store.
//!
//! Blocks are stored by CID. An archive is written by walking the DAG from a
//! list of root CIDs and streaming every reachable block once, and is read
//! back into any block store with every block rehashed on the way in.
//!
//! ## Features
//!
//! - Content identifiers with a closed set of codecs (raw, DAG-CBOR) and hash
//!   functions (SHA2-256, BLAKE3)
//! - In-memory and durable flat-file block stores behind one trait
//! - Link extraction and iterative DAG walking with deduplication
//! - Streaming archive writer and verifying reader
//!
//! ## Example
//!
//! ```no_run
//! use carkit_core::{Blockstore, Codec, FsBlockstore, HashAlgorithm, MemoryBlockstore};
//! use std::fs::File;
//! use std::io::{BufReader, BufWriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FsBlockstore::init("./blocks.in", HashAlgorithm::Sha2_256)?;
//! let root = store.put(Codec::Raw, b"hello")?;
//!
//! // Export everything reachable from the root
//! let out = BufWriter::new(File::create("example.car")?);
//! carkit_core::write_car(&store, &[root], out)?;
//!
//! // Load it into a fresh store
//! let fresh = MemoryBlockstore::new();
//! let roots = carkit_core::load_car(BufReader::new(File::open("example.car")?), &fresh)?;
//! carkit_core::walk_roots(&fresh, &roots)?;
//! # Ok(())
//! # }
//! ```

mod block;
mod blockstore;
mod car;
mod error;
mod hash;
pub mod node;
mod reader;
mod store;
mod walk;
mod writer;

pub use block::Block;
pub use blockstore::{Blockstore, MemoryBlockstore};
pub use car::{CAR_VERSION, CarHeader, CarSummary};
pub use error::{Error, Result};
pub use hash::{Codec, DAG_CBOR, HashAlgorithm, RAW, compute_cid, parse_cid, recompute_cid};
pub use reader::{CarEntry, CarReader, ReaderState, VerifyReport, load_car, verify_car};
pub use store::{FsBlockstore, StoreStats};
pub use walk::{DagWalker, WalkStats, walk_roots};
pub use writer::{CarWriter, write_car};

pub use cid::Cid;
pub use ipld_core::ipld::Ipld;
