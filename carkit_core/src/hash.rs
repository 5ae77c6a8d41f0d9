//! Content identifiers: codecs, hash functions and CID computation.

use crate::error::{Error, Result};
use cid::Cid;
use cid::multihash::Multihash;
use multihash_codetable::{Code, MultihashDigest};

/// Multicodec code for raw binary blocks.
pub const RAW: u64 = 0x55;

/// Multicodec code for DAG-CBOR blocks.
pub const DAG_CBOR: u64 = 0x71;

/// Block formats this crate can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Opaque bytes, no links.
    Raw,
    /// DAG-CBOR, links encoded as CBOR tag 42.
    DagCbor,
}

impl Codec {
    /// Returns the string representation of the codec.
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Raw => "raw",
            Codec::DagCbor => "dag-cbor",
        }
    }

    /// Parse codec from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(Codec::Raw),
            "dag-cbor" => Ok(Codec::DagCbor),
            _ => Err(Error::codec(format!("Unknown codec name: {}", s))),
        }
    }

    /// Returns the multicodec code.
    pub fn code(&self) -> u64 {
        match self {
            Codec::Raw => RAW,
            Codec::DagCbor => DAG_CBOR,
        }
    }

    /// Parse codec from its multicodec code.
    pub fn from_code(code: u64) -> Result<Self> {
        match code {
            RAW => Ok(Codec::Raw),
            DAG_CBOR => Ok(Codec::DagCbor),
            _ => Err(Error::UnsupportedCodec { code }),
        }
    }

    /// Codec of the given CID.
    pub fn of(cid: &Cid) -> Result<Self> {
        Self::from_code(cid.codec())
    }
}

/// Supported hash functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// SHA2 with 256-bit output.
    #[default]
    Sha2_256,
    /// BLAKE3 with 256-bit output.
    Blake3,
}

impl HashAlgorithm {
    /// Returns the string representation of the algorithm (for config files).
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha2_256 => "sha2-256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Parse algorithm from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "sha2-256" => Ok(HashAlgorithm::Sha2_256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            _ => Err(Error::codec(format!("Unknown hash function name: {}", s))),
        }
    }

    /// Returns the multihash code.
    pub fn code(&self) -> u64 {
        self.multihash_code().into()
    }

    /// Parse algorithm from its multihash code.
    pub fn from_code(code: u64) -> Result<Self> {
        match Code::try_from(code) {
            Ok(Code::Sha2_256) => Ok(HashAlgorithm::Sha2_256),
            Ok(Code::Blake3_256) => Ok(HashAlgorithm::Blake3),
            _ => Err(Error::UnsupportedHash { code }),
        }
    }

    fn multihash_code(&self) -> Code {
        match self {
            HashAlgorithm::Sha2_256 => Code::Sha2_256,
            HashAlgorithm::Blake3 => Code::Blake3_256,
        }
    }

    /// Hash raw bytes into a multihash.
    pub fn digest(&self, data: &[u8]) -> Multihash<64> {
        self.multihash_code().digest(data)
    }
}

/// Compute the CIDv1 of `data` under the given codec and hash function.
pub fn compute_cid(codec: Codec, algorithm: HashAlgorithm, data: &[u8]) -> Cid {
    Cid::new_v1(codec.code(), algorithm.digest(data))
}

/// Recompute the CID `cid` claims for `data`.
///
/// Keeps the CID's version and codec, rehashing with the hash function named
/// in its multihash. Codecs are not checked, so blocks in formats this crate
/// cannot decode can still be verified.
pub fn recompute_cid(cid: &Cid, data: &[u8]) -> Result<Cid> {
    let algorithm = HashAlgorithm::from_code(cid.hash().code())?;
    Ok(Cid::new(cid.version(), cid.codec(), algorithm.digest(data))?)
}

/// Parse a CID from its string form.
pub fn parse_cid(s: &str) -> Result<Cid> {
    Cid::try_from(s).map_err(|e| Error::invalid_cid(format!("{}: {}", s, e)))
}
