// IPS decoder: byte stream to an ordered sequence of patches.
//
// Records are read one at a time with fresh buffers per field. The EOF
// marker shares the offset slot with real records, so it is only taken as
// the terminator when the following length read finds end-of-stream with
// no bytes; otherwise the record is decoded as usual.
//
// Two front ends share the record parser:
//   - PatchReader: synchronous pull iterator over `Result<Patch>`
//   - PatchStream: background producer feeding a bounded channel, with the
//     terminal status collected by `finish()` after the patches are drained

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use log::{debug, trace};

use super::error::{IpsError, Result};
use super::patch::{EOF_MARKER, IPS_MAGIC, Patch};

/// Channel depth between the background decoder and its consumer.
pub const STREAM_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// Synchronous reader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Records,
    Complete,
    Failed,
}

/// Lazily decodes IPS records from a byte stream.
///
/// Yields each patch in file order. After the EOF marker, or after the first
/// `Err`, the iterator is fused and returns `None`.
pub struct PatchReader<R: Read> {
    reader: R,
    state: State,
    records: u64,
    position: u64,
}

impl<R: Read> PatchReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: State::Header,
            records: 0,
            position: 0,
        }
    }

    /// Records successfully decoded so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Bytes consumed from the underlying reader.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// True once the EOF marker has been reached without error.
    pub fn is_complete(&self) -> bool {
        self.state == State::Complete
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read until `buf` is full or the stream ends. Returns bytes filled.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }

    fn fill_field(&mut self, buf: &mut [u8], field: &'static str) -> Result<()> {
        if self.fill(buf)? < buf.len() {
            return Err(IpsError::Truncated {
                record: self.records,
                field,
            });
        }
        Ok(())
    }

    fn read_header(&mut self) -> Result<()> {
        let mut magic = [0u8; 5];
        let n = self.fill(&mut magic)?;
        if n < magic.len() || magic != IPS_MAGIC {
            return Err(IpsError::NotIps);
        }
        Ok(())
    }

    /// Decode the next record, or `None` at the EOF marker.
    fn read_record(&mut self) -> Result<Option<Patch>> {
        let mut offset = [0u8; 3];
        match self.fill(&mut offset)? {
            0 => {
                return Err(IpsError::MissingEof {
                    record: self.records,
                });
            }
            3 => {}
            _ => {
                return Err(IpsError::Truncated {
                    record: self.records,
                    field: "offset",
                });
            }
        }

        let mut len = [0u8; 2];
        let n = self.fill(&mut len)?;
        // The marker ends the stream whenever the length read runs out,
        // including a lone stray byte after it.
        if n < len.len() && offset == EOF_MARKER {
            if n > 0 {
                debug!("ignoring {n} trailing byte after EOF marker");
            }
            return Ok(None);
        }
        if n < len.len() {
            return Err(IpsError::Truncated {
                record: self.records,
                field: "length",
            });
        }

        let location = u32::from_be_bytes([0, offset[0], offset[1], offset[2]]);
        let declared = u16::from_be_bytes(len);

        let patch = if declared == 0 {
            let mut run = [0u8; 2];
            self.fill_field(&mut run, "run length")?;
            let mut value = [0u8; 1];
            self.fill_field(&mut value, "fill value")?;
            let run = u16::from_be_bytes(run);
            if run == 0 {
                return Err(IpsError::InvalidPatch(format!(
                    "zero-length RLE run in record {} at {location:06X}",
                    self.records
                )));
            }
            Patch::rle(location, run, value[0])?
        } else {
            let mut payload = vec![0u8; declared as usize];
            self.fill_field(&mut payload, "payload")?;
            Patch::literal(location, payload)?
        };

        trace!("record {}: {patch}", self.records);
        self.records += 1;
        Ok(Some(patch))
    }
}

impl<R: Read> Iterator for PatchReader<R> {
    type Item = Result<Patch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Header {
            if let Err(e) = self.read_header() {
                self.state = State::Failed;
                return Some(Err(e));
            }
            self.state = State::Records;
        }
        if self.state != State::Records {
            return None;
        }

        match self.read_record() {
            Ok(Some(patch)) => Some(Ok(patch)),
            Ok(None) => {
                self.state = State::Complete;
                debug!(
                    "IPS stream complete: {} records, {} bytes",
                    self.records, self.position
                );
                None
            }
            Err(e) => {
                self.state = State::Failed;
                debug!("IPS decode stopped after {} records: {e}", self.records);
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for PatchReader<R> {}

// ---------------------------------------------------------------------------
// Background stream
// ---------------------------------------------------------------------------

/// Decodes on a background thread, handing patches over a bounded channel.
///
/// Iterate to receive patches in file order, then call [`PatchStream::finish`]
/// for the decode result. Dropping the stream early disconnects the channel
/// and the producer stops at its next send.
pub struct PatchStream {
    rx: Receiver<Patch>,
    handle: JoinHandle<Result<u64>>,
}

impl PatchStream {
    /// Spawn a decoder with the default channel depth.
    pub fn spawn<R: Read + Send + 'static>(reader: R) -> io::Result<Self> {
        Self::with_capacity(reader, STREAM_CAPACITY)
    }

    /// Spawn a decoder whose producer may run `capacity` patches ahead.
    pub fn with_capacity<R: Read + Send + 'static>(reader: R, capacity: usize) -> io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let handle = thread::Builder::new()
            .name("ips-decoder".into())
            .spawn(move || {
                let mut patches = PatchReader::new(reader);
                for item in patches.by_ref() {
                    if tx.send(item?).is_err() {
                        debug!("patch consumer went away, stopping decode");
                        break;
                    }
                }
                Ok(patches.records_read())
            })?;
        Ok(Self { rx, handle })
    }

    /// Drain any remaining patches, join the producer and return the number
    /// of records decoded or the decode error.
    pub fn finish(self) -> Result<u64> {
        let Self { rx, handle } = self;
        let mut discarded = 0u64;
        while rx.recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("discarded {discarded} undelivered patches");
        }
        match handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl Iterator for PatchStream {
    type Item = Patch;

    fn next(&mut self) -> Option<Patch> {
        self.rx.recv().ok()
    }
}

// ---------------------------------------------------------------------------
// Convenience functions
// ---------------------------------------------------------------------------

/// Decode every patch from `reader`.
pub fn read_patches<R: Read>(reader: R) -> Result<Vec<Patch>> {
    PatchReader::new(reader).collect()
}

/// Decode an in-memory IPS file.
pub fn decode_memory(data: &[u8]) -> Result<Vec<Patch>> {
    read_patches(data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
