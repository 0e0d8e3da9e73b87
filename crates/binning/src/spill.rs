//! Spill streams of completed spatial bins.
//!
//! A stream is a sequence of spatial bin records terminated by the key `-1`:
//!
//! ```text
//! ┌───────────┬────────────┬─────────────┬──────────────────┐
//! │ index:i64 │ numObs:i32 │ numElems:i32│ numElems × f32   │  ... repeated
//! └───────────┴────────────┴─────────────┴──────────────────┘
//! ┌───────────┐
//! │    -1     │  end of stream
//! └───────────┘
//! ```
//!
//! All values are big-endian. Bin contexts are not persisted, so only bins
//! that went through `complete_spatial` may be spilled.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use bytes::{Buf, BytesMut};
use tracing::debug;

use crate::bin::{SpatialBin, UNSET_INDEX};
use crate::error::{BinningError, Result};

/// Key that terminates a spill stream.
pub const END_OF_STREAM: i64 = UNSET_INDEX;

/// Writes spatial bin records to a byte sink.
#[derive(Debug)]
pub struct SpillWriter<W: Write> {
    inner: W,
    scratch: BytesMut,
    count: usize,
}

impl<W: Write> SpillWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            scratch: BytesMut::with_capacity(256),
            count: 0,
        }
    }

    /// Append one bin; its index must be non-negative.
    pub fn write_bin(&mut self, bin: &SpatialBin) -> Result<()> {
        if bin.index < 0 {
            return Err(BinningError::InvalidBinIndex(bin.index));
        }
        self.scratch.clear();
        bin.write(&mut self.scratch);
        self.inner.write_all(&self.scratch)?;
        self.count += 1;
        Ok(())
    }

    /// Number of bins written so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Write the end-of-stream key, flush and return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.inner.write_all(&END_OF_STREAM.to_be_bytes())?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Iterates the spatial bins of a spill stream.
///
/// A stream that ends without the end-of-stream key yields a
/// [`BinningError::Truncated`] error. Iteration stops after the first error.
#[derive(Debug)]
pub struct SpillReader<R: Read> {
    inner: R,
    done: bool,
}

impl<R: Read> SpillReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, done: false }
    }

    fn read_bin(&mut self) -> Result<Option<SpatialBin>> {
        let mut key = [0u8; 8];
        self.inner.read_exact(&mut key).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                BinningError::truncated("spill stream ended without end-of-stream key")
            }
            _ => e.into(),
        })?;
        let index = i64::from_be_bytes(key);
        if index == END_OF_STREAM {
            return Ok(None);
        }
        if index < 0 {
            return Err(BinningError::corrupt(format!("invalid spill key {}", index)));
        }

        let mut header = [0u8; 8];
        self.inner.read_exact(&mut header)?;
        let num_elems = (&header[4..]).get_i32();
        if num_elems < 0 {
            return Err(BinningError::corrupt(format!(
                "spatial bin {}: negative feature count {}",
                index, num_elems
            )));
        }

        // Sized by the bytes read, not by the declared count
        let body_len = 4 * num_elems as u64;
        let mut record = header.to_vec();
        let read = (&mut self.inner).take(body_len).read_to_end(&mut record)?;
        if (read as u64) < body_len {
            return Err(BinningError::truncated(format!(
                "spatial bin {}: {} feature bytes declared, {} present",
                index, body_len, read
            )));
        }
        SpatialBin::read_body(index, &mut record.as_slice()).map(Some)
    }
}

impl<R: Read> Iterator for SpillReader<R> {
    type Item = Result<SpatialBin>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_bin() {
            Ok(Some(bin)) => Some(Ok(bin)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Receives completed spatial bins until they are merged into temporal bins.
pub trait SpatialBinCollector {
    /// Take ownership of completed bins of one pass.
    fn consume(&mut self, bins: Vec<SpatialBin>) -> Result<()>;

    /// Number of bins consumed so far.
    fn bin_count(&self) -> usize;

    /// Hand every collected bin to `sink` in collection order and reset the
    /// collector.
    fn replay(&mut self, sink: &mut dyn FnMut(SpatialBin) -> Result<()>) -> Result<()>;
}

/// Keeps all bins in memory.
#[derive(Debug, Default)]
pub struct MemoryBinCollector {
    bins: Vec<SpatialBin>,
    consumed: usize,
}

impl MemoryBinCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpatialBinCollector for MemoryBinCollector {
    fn consume(&mut self, bins: Vec<SpatialBin>) -> Result<()> {
        self.consumed += bins.len();
        self.bins.extend(bins);
        Ok(())
    }

    fn bin_count(&self) -> usize {
        self.consumed
    }

    fn replay(&mut self, sink: &mut dyn FnMut(SpatialBin) -> Result<()>) -> Result<()> {
        self.consumed = 0;
        for bin in self.bins.drain(..) {
            sink(bin)?;
        }
        Ok(())
    }
}

/// Buffers bins in memory and spills them to an anonymous temporary file
/// once more than `threshold` bins are buffered.
#[derive(Debug)]
pub struct FileBackedBinCollector {
    threshold: usize,
    dir: Option<PathBuf>,
    buffer: Vec<SpatialBin>,
    spill: Option<SpillWriter<BufWriter<File>>>,
    consumed: usize,
}

impl FileBackedBinCollector {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            dir: None,
            buffer: Vec::new(),
            spill: None,
            consumed: 0,
        }
    }

    /// Create spill files in `dir` instead of the system temp directory.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Number of bins currently written to the spill file.
    pub fn spilled_count(&self) -> usize {
        self.spill.as_ref().map_or(0, |w| w.count())
    }

    fn spill_buffer(&mut self) -> Result<()> {
        if self.spill.is_none() {
            let file = match &self.dir {
                Some(dir) => tempfile::tempfile_in(dir)?,
                None => tempfile::tempfile()?,
            };
            self.spill = Some(SpillWriter::new(BufWriter::new(file)));
        }
        if let Some(writer) = self.spill.as_mut() {
            for bin in self.buffer.drain(..) {
                writer.write_bin(&bin)?;
            }
            debug!(spilled = writer.count(), "Spilled spatial bins to disk");
        }
        Ok(())
    }
}

impl SpatialBinCollector for FileBackedBinCollector {
    fn consume(&mut self, bins: Vec<SpatialBin>) -> Result<()> {
        self.consumed += bins.len();
        self.buffer.extend(bins);
        if self.buffer.len() > self.threshold {
            self.spill_buffer()?;
        }
        Ok(())
    }

    fn bin_count(&self) -> usize {
        self.consumed
    }

    fn replay(&mut self, sink: &mut dyn FnMut(SpatialBin) -> Result<()>) -> Result<()> {
        self.consumed = 0;
        if let Some(writer) = self.spill.take() {
            let mut file = writer
                .finish()?
                .into_inner()
                .map_err(|e| BinningError::from(e.into_error()))?;
            file.seek(SeekFrom::Start(0))?;
            for bin in SpillReader::new(BufReader::new(file)) {
                sink(bin?)?;
            }
        }
        for bin in self.buffer.drain(..) {
            sink(bin)?;
        }
        Ok(())
    }
}
