//! Archive writing.

use crate::block::Block;
use crate::blockstore::Blockstore;
use crate::car::{CarHeader, CarSummary, write_block_frame, write_frame};
use crate::error::{Error, Result};
use crate::walk::DagWalker;
use cid::Cid;
use std::io::Write;
use tracing::{debug, trace};

/// Low-level archive writer: writes the header on creation, then block
/// frames in the order they are given.
///
/// No reachability or duplicate checks are made here; [`write_car`] is the
/// DAG-aware entry point.
pub struct CarWriter<W: Write> {
    sink: W,
    roots: usize,
    blocks: usize,
    bytes: u64,
}

impl<W: Write> CarWriter<W> {
    /// Write the header for `roots` to `sink`.
    pub fn new(mut sink: W, roots: &[Cid]) -> Result<Self> {
        if roots.is_empty() {
            return Err(Error::EmptyRoots);
        }

        let header = CarHeader::new(roots.to_vec()).encode()?;
        let bytes = write_frame(&mut sink, &[&header])?;

        Ok(Self {
            sink,
            roots: roots.len(),
            blocks: 0,
            bytes,
        })
    }

    /// Append a block frame.
    pub fn write_block(&mut self, block: &Block) -> Result<()> {
        self.bytes += write_block_frame(&mut self.sink, block)?;
        self.blocks += 1;
        trace!(cid = %block.cid, len = block.data.len(), "wrote block");
        Ok(())
    }

    /// Flush the sink and report what was written.
    pub fn finish(mut self) -> Result<CarSummary> {
        self.sink.flush()?;
        Ok(CarSummary {
            roots: self.roots,
            blocks: self.blocks,
            bytes: self.bytes,
        })
    }
}

/// Write every block reachable from `roots` in `store` as an archive.
///
/// Blocks are written once each, in depth-first pre-order from the roots
/// in their given order. Fails with `MissingBlock` if a reachable CID is not
/// in `store`; the sink is then left holding a partial archive.
#[tracing::instrument(level = "debug", skip_all, fields(roots = roots.len()))]
pub fn write_car<S, W>(store: &S, roots: &[Cid], sink: W) -> Result<CarSummary>
where
    S: Blockstore + ?Sized,
    W: Write,
{
    let mut writer = CarWriter::new(sink, roots)?;

    for block in DagWalker::new(store, roots.iter().copied()) {
        writer.write_block(&block?)?;
    }

    let summary = writer.finish()?;
    debug!(blocks = summary.blocks, bytes = summary.bytes, "wrote archive");
    Ok(summary)
}
