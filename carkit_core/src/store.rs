//! Durable flat-file block store.
//!
//! Layout under the store root:
//!
//! ```text
//! config                     version=1, algo=<hash function>
//! blocks/<shard>/<key>       raw block bytes
//! ```
//!
//! `<key>` is the hex encoding of the CID's binary form and `<shard>` is the
//! last two characters of the key.

use crate::blockstore::Blockstore;
use crate::error::{Error, Result};
use crate::hash::{HashAlgorithm, recompute_cid};
use cid::Cid;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Length of the shard directory name.
const SHARD_LEN: usize = 2;

/// A block store persisted as one file per block.
#[derive(Debug)]
pub struct FsBlockstore {
    root: PathBuf,
    algorithm: HashAlgorithm,
}

/// Counts reported by [`FsBlockstore::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of stored blocks.
    pub blocks: usize,
    /// Total bytes of block data.
    pub bytes: u64,
}

impl FsBlockstore {
    /// Initialize a new store at the given path.
    ///
    /// Creates the root directory, the `blocks/` directory and the `config`
    /// file. Initializing over an existing store rewrites its config.
    pub fn init<P: AsRef<Path>>(root: P, algorithm: HashAlgorithm) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("blocks"))?;

        let config_content = format!("version=1\nalgo={}\n", algorithm.as_str());
        fs::write(root.join("config"), config_content)?;

        Ok(Self { root, algorithm })
    }

    /// Open an existing store at the given path.
    ///
    /// Validates the store structure and reads the configuration.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            return Err(Error::invalid_store(&root, "directory does not exist"));
        }

        let config_path = root.join("config");
        if !config_path.exists() {
            return Err(Error::invalid_store(&root, "config file not found"));
        }

        let config_content = fs::read_to_string(&config_path)?;
        let algorithm = Self::parse_config(&config_content)
            .map_err(|reason| Error::invalid_store(&root, reason))?;

        if !root.join("blocks").is_dir() {
            return Err(Error::invalid_store(&root, "blocks directory missing"));
        }

        Ok(Self { root, algorithm })
    }

    /// Open the store at `root`, initializing it if it does not exist.
    pub fn open_or_init<P: AsRef<Path>>(root: P, algorithm: HashAlgorithm) -> Result<Self> {
        if root.as_ref().join("config").exists() {
            Self::open(root)
        } else {
            Self::init(root, algorithm)
        }
    }

    /// Parse the config file to extract the algorithm.
    fn parse_config(content: &str) -> std::result::Result<HashAlgorithm, String> {
        let mut version = None;
        let mut algo = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "version" => version = Some(value.trim()),
                    "algo" => algo = Some(value.trim()),
                    _ => {}
                }
            }
        }

        if version != Some("1") {
            return Err(format!("Unsupported config version: {:?}", version));
        }

        let algo_str = algo.ok_or_else(|| "Missing algo in config".to_string())?;
        HashAlgorithm::parse(algo_str).map_err(|e| e.to_string())
    }

    /// Get the root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the path to a block file given its CID.
    ///
    /// Returns: `blocks/{shard}/{key}`
    pub fn block_path(&self, cid: &Cid) -> PathBuf {
        let key = hex::encode(cid.to_bytes());
        let shard = &key[key.len() - SHARD_LEN..];
        self.root.join("blocks").join(shard).join(&key)
    }

    /// List every stored CID, sorted by key.
    pub fn list(&self) -> Result<Vec<Cid>> {
        let mut cids = Vec::new();
        self.for_each_block(|cid, _| cids.push(cid))?;
        cids.sort_by_key(|cid| cid.to_bytes());
        Ok(cids)
    }

    /// Count blocks and bytes on disk.
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats {
            blocks: 0,
            bytes: 0,
        };
        self.for_each_block(|_, len| {
            stats.blocks += 1;
            stats.bytes += len;
        })?;
        Ok(stats)
    }

    /// Visit every block file whose name parses as a CID.
    fn for_each_block(&self, mut f: impl FnMut(Cid, u64)) -> Result<()> {
        let blocks_dir = self.root.join("blocks");

        for shard_entry in fs::read_dir(&blocks_dir)? {
            let shard_path = shard_entry?.path();
            if !shard_path.is_dir() {
                continue;
            }

            for block_entry in fs::read_dir(&shard_path)? {
                let block_entry = block_entry?;
                let name = block_entry.file_name();
                let Some(cid) = name
                    .to_str()
                    .and_then(|n| hex::decode(n).ok())
                    .and_then(|bytes| Cid::try_from(bytes.as_slice()).ok())
                else {
                    // Leftover temp files or foreign entries
                    continue;
                };
                f(cid, block_entry.metadata()?.len());
            }
        }

        Ok(())
    }

    /// Write a block atomically using tempfile.
    fn write_block_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::invalid_store(&self.root, "block path has no parent"))?;
        fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(data)?;
        temp_file.flush()?;

        // Rename over any concurrent writer; the bytes are identical
        temp_file.persist(path)?;

        Ok(())
    }
}

impl Blockstore for FsBlockstore {
    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn has(&self, cid: &Cid) -> Result<bool> {
        Ok(self.block_path(cid).is_file())
    }

    fn get(&self, cid: &Cid) -> Result<Vec<u8>> {
        let path = self.block_path(cid);

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(*cid));
            }
            Err(e) => return Err(e.into()),
        };

        // Corruption detection
        let actual = recompute_cid(cid, &data)?;
        if actual != *cid {
            return Err(Error::corrupted_block(
                &path,
                format!("Hash mismatch: expected {}, got {}", cid, actual),
            ));
        }

        Ok(data)
    }

    fn put_keyed(&self, cid: &Cid, data: &[u8]) -> Result<()> {
        let path = self.block_path(cid);

        // Deduplication
        if path.exists() {
            trace!(%cid, "block already present");
            return Ok(());
        }

        self.write_block_atomic(&path, data)?;
        trace!(%cid, len = data.len(), "stored block");

        Ok(())
    }
}
