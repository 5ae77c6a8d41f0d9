//! Archive reading and loading.

use crate::block::Block;
use crate::blockstore::Blockstore;
use crate::car::{CarHeader, parse_block_frame};
use crate::error::{Error, Result};
use cid::Cid;
use integer_encoding::VarInt;
use std::collections::HashSet;
use std::io::{self, BufRead, BufReader, Read};
use tracing::{debug, trace};

/// Where a [`CarReader`] is in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Header parsed, block frames may follow.
    HeaderParsed,
    /// Clean end of input after a whole frame.
    Done,
    /// A frame failed to parse or verify; nothing more is read.
    Failed,
}

/// A block frame together with its position in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarEntry {
    /// Byte offset of the frame's length prefix.
    pub offset: u64,
    pub block: Block,
}

/// Streaming archive reader.
///
/// Parses the header on construction, then yields verified blocks in archive
/// order. Every block is rehashed before it is returned; the first failure
/// moves the reader to [`ReaderState::Failed`] and ends iteration.
pub struct CarReader<R> {
    reader: BufReader<R>,
    header: CarHeader,
    offset: u64,
    state: ReaderState,
}

impl<R: Read> CarReader<R> {
    /// Read and validate the header from `source`.
    pub fn new(source: R) -> Result<Self> {
        let mut reader = BufReader::new(source);

        let (len, prefix_len) = match read_frame_len(&mut reader) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Err(Error::malformed_header("archive is empty")),
            Err(PrefixError::CutShort) => {
                return Err(Error::malformed_header("header length cut short"));
            }
            Err(PrefixError::Invalid) => {
                return Err(Error::malformed_header("header length is not a valid varint"));
            }
            Err(PrefixError::Io(e)) => return Err(e.into()),
        };

        if len == 0 {
            return Err(Error::malformed_header("header frame is empty"));
        }

        let body = read_body(&mut reader, len)?;
        if (body.len() as u64) < len {
            return Err(Error::malformed_header(format!(
                "header cut short: expected {} bytes, got {}",
                len,
                body.len()
            )));
        }

        let header = CarHeader::decode(&body)?;
        debug!(roots = header.roots.len(), "parsed archive header");

        Ok(Self {
            reader,
            header,
            offset: prefix_len + len,
            state: ReaderState::HeaderParsed,
        })
    }

    /// Root CIDs in header order.
    pub fn roots(&self) -> &[Cid] {
        &self.header.roots
    }

    /// The parsed archive header.
    pub fn header(&self) -> &CarHeader {
        &self.header
    }

    /// Current position in the reader state machine.
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next block frame, or `None` at the end of the archive.
    pub fn next_entry(&mut self) -> Result<Option<CarEntry>> {
        if self.state != ReaderState::HeaderParsed {
            return Ok(None);
        }

        let result = self.read_entry();
        match &result {
            Ok(Some(_)) => {}
            Ok(None) => self.state = ReaderState::Done,
            Err(_) => self.state = ReaderState::Failed,
        }
        result
    }

    fn read_entry(&mut self) -> Result<Option<CarEntry>> {
        let offset = self.offset;

        let (len, prefix_len) = match read_frame_len(&mut self.reader) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(None),
            // Varint cut short: at least one more byte was needed
            Err(PrefixError::CutShort) => return Err(Error::truncated(offset, 1, 0)),
            Err(PrefixError::Invalid) => {
                return Err(Error::malformed_entry(
                    offset,
                    "length prefix is not a valid varint",
                ));
            }
            Err(PrefixError::Io(e)) => return Err(e.into()),
        };

        let body_offset = offset + prefix_len;
        let body = read_body(&mut self.reader, len)?;
        if (body.len() as u64) < len {
            return Err(Error::truncated(body_offset, len, body.len() as u64));
        }
        self.offset = body_offset + len;

        let block = parse_block_frame(body, offset)?;
        block.validate(offset)?;
        trace!(cid = %block.cid, offset, len = block.data.len(), "read block");

        Ok(Some(CarEntry { offset, block }))
    }
}

impl<R: Read> Iterator for CarReader<R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry()
            .transpose()
            .map(|entry| entry.map(|e| e.block))
    }
}

/// Longest varint that can hold a `u64`.
const MAX_PREFIX_LEN: usize = 10;

/// Ways a frame length prefix can fail to read.
#[derive(Debug)]
enum PrefixError {
    /// Input ended inside the prefix.
    CutShort,
    /// No terminating byte within `MAX_PREFIX_LEN`, or the value overflows.
    Invalid,
    Io(io::Error),
}

impl From<io::Error> for PrefixError {
    fn from(e: io::Error) -> Self {
        PrefixError::Io(e)
    }
}

/// Read a frame length prefix. `None` on a clean end of input.
///
/// Returns the length and the number of prefix bytes consumed, which is
/// larger than the minimal encoding when the prefix is padded.
fn read_frame_len<R: BufRead>(
    reader: &mut R,
) -> std::result::Result<Option<(u64, u64)>, PrefixError> {
    let mut prefix = Vec::with_capacity(MAX_PREFIX_LEN);
    loop {
        let Some(&byte) = reader.fill_buf()?.first() else {
            return if prefix.is_empty() {
                Ok(None)
            } else {
                Err(PrefixError::CutShort)
            };
        };
        reader.consume(1);
        prefix.push(byte);

        if byte & 0x80 == 0 {
            break;
        }
        if prefix.len() == MAX_PREFIX_LEN {
            return Err(PrefixError::Invalid);
        }
    }

    let (len, consumed) = u64::decode_var(&prefix).ok_or(PrefixError::Invalid)?;
    Ok(Some((len, consumed as u64)))
}

/// Read up to `len` bytes; a short result means the input ended early.
fn read_body<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    reader.take(len).read_to_end(&mut body)?;
    Ok(body)
}

/// Load every block of an archive into `store` and return the header roots.
///
/// Aborts on the first malformed, truncated or tampered frame; blocks read
/// before that point stay in the store. Roots are returned unchanged and not
/// checked for presence, see [`crate::walk::walk_roots`].
#[tracing::instrument(level = "debug", skip_all)]
pub fn load_car<R, S>(source: R, store: &S) -> Result<Vec<Cid>>
where
    R: Read,
    S: Blockstore + ?Sized,
{
    let mut reader = CarReader::new(source)?;

    let mut blocks = 0usize;
    for block in &mut reader {
        store.put_block(&block?)?;
        blocks += 1;
    }

    debug!(blocks, bytes = reader.offset(), "loaded archive");
    Ok(reader.roots().to_vec())
}

/// Result of [`verify_car`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Roots in header order.
    pub roots: Vec<Cid>,
    /// Number of block frames.
    pub blocks: usize,
    /// Total archive size in bytes.
    pub bytes: u64,
    /// CIDs referenced by a root or a block but absent from the archive,
    /// in first-referenced order.
    pub missing: Vec<Cid>,
}

impl VerifyReport {
    /// Every referenced block is present.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Check an archive without loading it anywhere.
///
/// Beyond integrity, requires in-order DAG layout: each block must be a root
/// or linked from an earlier block, otherwise `UnexpectedBlock`. Blocks that
/// are referenced but never appear are reported in
/// [`VerifyReport::missing`].
#[tracing::instrument(level = "debug", skip_all)]
pub fn verify_car<R: Read>(source: R) -> Result<VerifyReport> {
    let mut reader = CarReader::new(source)?;

    let mut referenced: Vec<Cid> = Vec::new();
    let mut expected: HashSet<Cid> = HashSet::new();
    for root in reader.roots() {
        if expected.insert(*root) {
            referenced.push(*root);
        }
    }

    let mut seen: HashSet<Cid> = HashSet::new();
    let mut blocks = 0usize;

    while let Some(CarEntry { offset, block }) = reader.next_entry()? {
        if !expected.contains(&block.cid) {
            return Err(Error::unexpected_block(block.cid, offset));
        }
        seen.insert(block.cid);
        blocks += 1;

        for link in block.links()? {
            if expected.insert(link) {
                referenced.push(link);
            }
        }
    }

    let missing: Vec<Cid> = referenced
        .into_iter()
        .filter(|cid| !seen.contains(cid))
        .collect();

    debug!(blocks, missing = missing.len(), "verified archive");
    Ok(VerifyReport {
        roots: reader.roots().to_vec(),
        blocks,
        bytes: reader.offset(),
        missing,
    })
}
