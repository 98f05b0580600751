// IPS patch format implementation.
//
// # Modules
//
// - `patch`   : Literal and RLE records, describe/apply/encode per record
// - `error`   : Format and I/O error taxonomy
// - `decoder` : Stream to patches (pull iterator and background stream)
// - `encoder` : Patches to stream
// - `apply`   : Random-access write targets and apply loops

pub mod apply;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod patch;

// Re-export key types for convenience.
pub use apply::{ApplyStats, PatchTarget, SeekTarget, apply_all, apply_patch, apply_patches};
pub use decoder::{PatchReader, PatchStream, STREAM_CAPACITY, decode_memory, read_patches};
pub use encoder::{PatchWriter, encode_patches, encode_to_vec};
pub use error::{IpsError, Result};
pub use patch::{EOF_MARKER, IPS_MAGIC, LiteralPatch, MAX_LOCATION, MAX_RECORD_LEN, Patch, RlePatch};
