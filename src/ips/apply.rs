// Patch application onto random-access targets.
//
// A target only needs "write N bytes at absolute offset O". In-memory
// buffers are fixed-size: writes past the end fail and leave the buffer
// untouched. Files and other seekable writers grow as the writer allows.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};

use super::error::Result;
use super::patch::Patch;

// ---------------------------------------------------------------------------
// Target trait
// ---------------------------------------------------------------------------

/// A byte-addressable destination supporting writes at arbitrary offsets.
pub trait PatchTarget {
    /// Write all of `buf` starting at absolute offset `offset`.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;
}

impl PatchTarget for [u8] {
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let size = self.len();
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(buf.len())?))
            .filter(|r| r.end <= size)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!(
                        "write of {} bytes at offset {offset:#X} exceeds target size {size}",
                        buf.len()
                    ),
                )
            })?;
        self[range].copy_from_slice(buf);
        Ok(())
    }
}

impl PatchTarget for Vec<u8> {
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.as_mut_slice().write_at(offset, buf)
    }
}

impl PatchTarget for File {
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(buf)
    }
}

impl<T: PatchTarget + ?Sized> PatchTarget for &mut T {
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        (**self).write_at(offset, buf)
    }
}

/// Adapts any `Write + Seek` (e.g. `Cursor<Vec<u8>>`, `BufWriter<File>`)
/// into a [`PatchTarget`].
#[derive(Debug)]
pub struct SeekTarget<W> {
    inner: W,
}

impl<W: Write + Seek> SeekTarget<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek> PatchTarget for SeekTarget<W> {
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.write_all(buf)
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters accumulated while applying a patch sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Total patches applied.
    pub patches: u64,
    /// Literal patches applied.
    pub literal_patches: u64,
    /// RLE patches applied.
    pub rle_patches: u64,
    /// Target bytes written (overlapping writes counted each time).
    pub bytes_written: u64,
    /// Highest `location + len` seen; the minimum target size.
    pub max_end: u64,
}

impl ApplyStats {
    pub fn record(&mut self, patch: &Patch) {
        self.patches += 1;
        if patch.is_rle() {
            self.rle_patches += 1;
        } else {
            self.literal_patches += 1;
        }
        self.bytes_written += patch.len() as u64;
        self.max_end = self.max_end.max(patch.end());
    }
}

// ---------------------------------------------------------------------------
// Apply loops
// ---------------------------------------------------------------------------

/// Apply a single patch. Equivalent to [`Patch::apply`].
pub fn apply_patch<T: PatchTarget + ?Sized>(patch: &Patch, target: &mut T) -> Result<()> {
    patch.apply(target)
}

/// Apply decoded patches in order, stopping at the first decode or apply
/// error.
///
/// `on_applied` is called after each successful write with the 1-based
/// patch index. Patches applied before a failure stay applied.
pub fn apply_all<I, T, F>(patches: I, target: &mut T, mut on_applied: F) -> Result<ApplyStats>
where
    I: IntoIterator<Item = Result<Patch>>,
    T: PatchTarget + ?Sized,
    F: FnMut(u64, &Patch),
{
    let mut stats = ApplyStats::default();
    for patch in patches {
        let patch = patch?;
        patch.apply(target)?;
        stats.record(&patch);
        on_applied(stats.patches, &patch);
    }
    Ok(stats)
}

/// Apply an in-memory patch list in order.
pub fn apply_patches<T: PatchTarget + ?Sized>(patches: &[Patch], target: &mut T) -> Result<ApplyStats> {
    let mut stats = ApplyStats::default();
    for patch in patches {
        patch.apply(target)?;
        stats.record(patch);
    }
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
