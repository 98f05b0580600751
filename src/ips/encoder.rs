// IPS encoder: ordered patches back to wire bytes.
//
// Output is "PATCH", each record in order, then "EOF". The byte layout is
// the exact inverse of the decoder for every stream it accepts.

use std::borrow::Borrow;
use std::io::Write;

use log::trace;

use super::error::Result;
use super::patch::{EOF_MARKER, IPS_MAGIC, Patch};

// ---------------------------------------------------------------------------
// Incremental writer
// ---------------------------------------------------------------------------

/// Writes an IPS stream one patch at a time.
///
/// The magic is written before the first patch (or by `finish` for an empty
/// stream); `finish` appends the EOF marker and flushes.
pub struct PatchWriter<W: Write> {
    writer: W,
    header_written: bool,
    patches_written: u64,
    bytes_written: u64,
}

impl<W: Write> PatchWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
            patches_written: 0,
            bytes_written: 0,
        }
    }

    fn write_header(&mut self) -> Result<()> {
        if !self.header_written {
            self.writer.write_all(&IPS_MAGIC)?;
            self.header_written = true;
            self.bytes_written += IPS_MAGIC.len() as u64;
        }
        Ok(())
    }

    /// Append one record.
    pub fn write_patch(&mut self, patch: &Patch) -> Result<()> {
        self.write_header()?;
        patch.encode(&mut self.writer)?;
        trace!("encoded {patch}");
        self.patches_written += 1;
        self.bytes_written += patch.encoded_len() as u64;
        Ok(())
    }

    /// Records written so far.
    pub fn patches_written(&self) -> u64 {
        self.patches_written
    }

    /// Bytes written so far, including the magic.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Write the EOF marker, flush and return the inner writer.
    pub fn finish(mut self) -> Result<W> {
        self.write_header()?;
        self.writer.write_all(&EOF_MARKER)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

// ---------------------------------------------------------------------------
// One-shot encoding
// ---------------------------------------------------------------------------

/// Encode a complete IPS stream and return the number of records written.
///
/// A write failure stops record emission, but the EOF marker is still
/// attempted; the first error encountered is the one returned.
pub fn encode_patches<W, I>(writer: &mut W, patches: I) -> Result<u64>
where
    W: Write + ?Sized,
    I: IntoIterator,
    I::Item: Borrow<Patch>,
{
    let header = writer.write_all(&IPS_MAGIC);

    let mut body = Ok(());
    let mut written = 0u64;
    if header.is_ok() {
        for patch in patches {
            if let Err(e) = patch.borrow().encode(&mut *writer) {
                body = Err(e);
                break;
            }
            written += 1;
        }
    }

    let trailer = writer.write_all(&EOF_MARKER);

    header?;
    body?;
    trailer?;
    Ok(written)
}

/// Encode patches into a fresh buffer.
pub fn encode_to_vec<I>(patches: I) -> Result<Vec<u8>>
where
    I: IntoIterator,
    I::Item: Borrow<Patch>,
{
    let mut out = Vec::new();
    encode_patches(&mut out, patches)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
