// File-level helpers for applying and rewriting IPS patches.
//
// `apply_file()` performs the copy-then-patch-in-place workflow: the source
// is duplicated to the output path, then every decoded patch is written into
// the copy at its offset. Decoding runs on a background `PatchStream` while
// patches are applied in file order. Optionally computes a SHA-256 of the
// patched output (feature-gated behind `file-io`).

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use crate::ips::{
    ApplyStats, IpsError, Patch, PatchStream, STREAM_CAPACITY, decode_memory, encode_patches,
    encode_to_vec, read_patches,
};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for [`apply_file`].
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Overwrite an existing output file.
    pub force: bool,
    /// Patches the background decoder may buffer ahead of the applier.
    pub stream_capacity: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            force: false,
            stream_capacity: STREAM_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `apply_file()`.
#[derive(Debug, Clone)]
pub struct ApplyFileStats {
    /// Source file size in bytes.
    pub source_size: u64,
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// Patched output size in bytes.
    pub output_size: u64,
    /// Per-patch counters.
    pub applied: ApplyStats,
    /// SHA-256 of the patched output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `recode_file()`.
#[derive(Debug, Clone)]
pub struct RecodeStats {
    pub input_size: u64,
    pub output_size: u64,
    pub patches: u64,
    /// Re-encoded bytes equal the input bytes.
    pub identical: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file-level operations.
#[derive(Debug, Error)]
pub enum FileError {
    /// File open, create, copy, read or write failure.
    #[error("{context}: {}: {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Output exists and `force` was not set.
    #[error("output file exists, use -f to overwrite: {}", .0.display())]
    OutputExists(PathBuf),

    /// The patch stream is malformed.
    #[error("decode error: {0}")]
    Decode(#[from] IpsError),

    /// The output path names one of the input files.
    #[error("output would overwrite input file: {}", .0.display())]
    SameFile(PathBuf),

    /// Writing a patch into the output failed; earlier patches stay applied.
    #[error("applying patch {index}: {source}")]
    Apply {
        index: u64,
        #[source]
        source: IpsError,
    },
}

fn io_err(context: &'static str, path: &Path) -> impl FnOnce(io::Error) -> FileError {
    let path = path.to_path_buf();
    move |source| FileError::Io {
        context,
        path,
        source,
    }
}

fn check_output(path: &Path, force: bool) -> Result<(), FileError> {
    if path.exists() && !force {
        return Err(FileError::OutputExists(path.to_path_buf()));
    }
    Ok(())
}

/// Reject an output path that resolves to `input`. A missing output never
/// matches.
fn check_distinct(input: &Path, output: &Path) -> Result<(), FileError> {
    let Ok(output) = fs::canonicalize(output) else {
        return Ok(());
    };
    let input = fs::canonicalize(input).map_err(io_err("input file", input))?;
    if input == output {
        return Err(FileError::SameFile(input));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// apply_file
// ---------------------------------------------------------------------------

/// Copy `source_path` to `output_path` and apply the IPS file at `patch_path`
/// to the copy.
///
/// `on_applied` is called after each patch is written with its 1-based index.
/// The first decode or apply error aborts the run; the output is left
/// partially patched and no rollback is attempted.
pub fn apply_file<F>(
    patch_path: &Path,
    source_path: &Path,
    output_path: &Path,
    opts: &ApplyOptions,
    mut on_applied: F,
) -> Result<ApplyFileStats, FileError>
where
    F: FnMut(u64, &Patch),
{
    check_output(output_path, opts.force)?;
    check_distinct(source_path, output_path)?;
    check_distinct(patch_path, output_path)?;

    // Open the patch and start decoding before touching the output.
    let patch_file = File::open(patch_path).map_err(io_err("patch file", patch_path))?;
    let patch_size = patch_file
        .metadata()
        .map_err(io_err("patch file", patch_path))?
        .len();
    let reader = BufReader::with_capacity(BUF_SIZE, patch_file);
    let mut stream = PatchStream::with_capacity(reader, opts.stream_capacity)
        .map_err(io_err("starting decoder for", patch_path))?;

    // A bad header or an empty patch is settled before the output exists.
    let (mut next, stream) = match stream.next() {
        Some(patch) => (Some(patch), Some(stream)),
        None => {
            stream.finish()?;
            (None, None)
        }
    };

    let source_size = fs::copy(source_path, output_path).map_err(io_err("copying", source_path))?;

    let mut output = OpenOptions::new()
        .write(true)
        .open(output_path)
        .map_err(io_err("output file", output_path))?;

    let mut applied = ApplyStats::default();
    if let Some(mut stream) = stream {
        while let Some(patch) = next.take() {
            if let Err(source) = patch.apply(&mut output) {
                let index = applied.patches + 1;
                if let Err(e) = stream.finish() {
                    warn!("patch stream also failed to decode: {e}");
                }
                return Err(FileError::Apply { index, source });
            }
            applied.record(&patch);
            on_applied(applied.patches, &patch);
            next = stream.next();
        }
        stream.finish()?;
    }

    output.flush().map_err(io_err("output file", output_path))?;
    drop(output);

    let output_size = fs::metadata(output_path)
        .map_err(io_err("output file", output_path))?
        .len();
    let output_sha256 = output_digest(output_path)?;

    info!(
        "applied {} patches ({} RLE) to {}",
        applied.patches,
        applied.rle_patches,
        output_path.display()
    );

    Ok(ApplyFileStats {
        source_size,
        patch_size,
        output_size,
        applied,
        output_sha256,
    })
}

#[cfg(feature = "file-io")]
fn output_digest(path: &Path) -> Result<Option<[u8; 32]>, FileError> {
    use sha2::Digest;

    let file = File::open(path).map_err(io_err("hashing", path))?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);
    let mut hasher = sha2::Sha256::new();
    io::copy(&mut reader, &mut hasher).map_err(io_err("hashing", path))?;
    Ok(Some(hasher.finalize().into()))
}

#[cfg(not(feature = "file-io"))]
fn output_digest(_path: &Path) -> Result<Option<[u8; 32]>, FileError> {
    Ok(None)
}

// ---------------------------------------------------------------------------
// Patch file read/write
// ---------------------------------------------------------------------------

/// Decode every patch in an IPS file.
pub fn read_patch_file(path: &Path) -> Result<Vec<Patch>, FileError> {
    let file = File::open(path).map_err(io_err("patch file", path))?;
    Ok(read_patches(BufReader::with_capacity(BUF_SIZE, file))?)
}

/// Write `patches` as an IPS file, replacing any existing file.
pub fn write_patch_file(path: &Path, patches: &[Patch]) -> Result<u64, FileError> {
    let file = File::create(path).map_err(io_err("output file", path))?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, file);
    let written = encode_patches(&mut writer, patches)?;
    writer.flush().map_err(io_err("output file", path))?;
    Ok(written)
}

/// Decode `input_path` and re-encode it to `output_path`.
///
/// A well-formed IPS file re-encodes to identical bytes, so this doubles as
/// a round-trip check.
pub fn recode_file(
    input_path: &Path,
    output_path: &Path,
    force: bool,
) -> Result<RecodeStats, FileError> {
    check_output(output_path, force)?;

    let input = fs::read(input_path).map_err(io_err("input file", input_path))?;
    let patches = decode_memory(&input)?;
    let encoded = encode_to_vec(&patches)?;
    fs::write(output_path, &encoded).map_err(io_err("output file", output_path))?;

    Ok(RecodeStats {
        input_size: input.len() as u64,
        output_size: encoded.len() as u64,
        patches: patches.len() as u64,
        identical: input == encoded,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
