// IPS patch model: literal and RLE records.
//
// Both variants are immutable once built. Constructors validate the
// format's invariants so every `Patch` value can be encoded losslessly.

use std::fmt;
use std::io::Write;

use super::apply::PatchTarget;
use super::error::{IpsError, Result};

// ---------------------------------------------------------------------------
// Wire constants
// ---------------------------------------------------------------------------

/// File magic at the start of every IPS stream.
pub const IPS_MAGIC: [u8; 5] = *b"PATCH";

/// Terminator occupying the offset slot after the last record.
pub const EOF_MARKER: [u8; 3] = *b"EOF";

/// Largest offset expressible in the 3-byte offset field.
pub const MAX_LOCATION: u32 = 0x00FF_FFFF;

/// Largest payload or run length expressible in a 2-byte length field.
pub const MAX_RECORD_LEN: usize = u16::MAX as usize;

/// Size of the offset + length prefix shared by both record kinds.
pub const RECORD_PREFIX_LEN: usize = 5;

/// Size of an RLE record on the wire.
pub const RLE_RECORD_LEN: usize = 8;

fn check_location(location: u32) -> Result<()> {
    if location > MAX_LOCATION {
        return Err(IpsError::InvalidPatch(format!(
            "offset {location:#X} exceeds 24 bits"
        )));
    }
    Ok(())
}

#[inline]
fn offset_bytes(location: u32) -> [u8; 3] {
    let b = location.to_be_bytes();
    [b[1], b[2], b[3]]
}

// ---------------------------------------------------------------------------
// Literal patch
// ---------------------------------------------------------------------------

/// Explicit replacement bytes written at `location`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralPatch {
    location: u32,
    values: Vec<u8>,
}

impl LiteralPatch {
    pub fn location(&self) -> u32 {
        self.location
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }
}

// ---------------------------------------------------------------------------
// RLE patch
// ---------------------------------------------------------------------------

/// `length` copies of `value` written at `location`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RlePatch {
    location: u32,
    length: u16,
    value: u8,
}

impl RlePatch {
    pub fn location(&self) -> u32 {
        self.location
    }

    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// A single IPS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    Literal(LiteralPatch),
    Rle(RlePatch),
}

impl Patch {
    /// Build a literal patch.
    ///
    /// Fails if `location` does not fit in 24 bits or `values` is empty or
    /// longer than 65535 bytes.
    pub fn literal(location: u32, values: impl Into<Vec<u8>>) -> Result<Self> {
        check_location(location)?;
        let values = values.into();
        if values.is_empty() {
            return Err(IpsError::InvalidPatch(format!(
                "empty literal patch at {location:06X}"
            )));
        }
        if values.len() > MAX_RECORD_LEN {
            return Err(IpsError::InvalidPatch(format!(
                "literal patch at {location:06X} is {} bytes, max {MAX_RECORD_LEN}",
                values.len()
            )));
        }
        Ok(Self::Literal(LiteralPatch { location, values }))
    }

    /// Build a run-length patch.
    ///
    /// Fails if `location` does not fit in 24 bits or `length` is zero.
    pub fn rle(location: u32, length: u16, value: u8) -> Result<Self> {
        check_location(location)?;
        if length == 0 {
            return Err(IpsError::InvalidPatch(format!(
                "zero-length RLE patch at {location:06X}"
            )));
        }
        Ok(Self::Rle(RlePatch {
            location,
            length,
            value,
        }))
    }

    /// Target offset of the first byte written.
    pub fn location(&self) -> u32 {
        match self {
            Self::Literal(p) => p.location,
            Self::Rle(p) => p.location,
        }
    }

    /// Number of target bytes the patch writes. Never zero.
    pub fn len(&self) -> usize {
        match self {
            Self::Literal(p) => p.values.len(),
            Self::Rle(p) => p.length as usize,
        }
    }

    /// Patches are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// One past the last target offset written.
    pub fn end(&self) -> u64 {
        self.location() as u64 + self.len() as u64
    }

    pub fn is_rle(&self) -> bool {
        matches!(self, Self::Rle(_))
    }

    /// Size of this record on the wire.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Literal(p) => RECORD_PREFIX_LEN + p.values.len(),
            Self::Rle(_) => RLE_RECORD_LEN,
        }
    }

    /// Human-readable one-line summary used for progress output.
    pub fn describe(&self) -> String {
        self.to_string()
    }

    /// Write the payload onto `target` at this patch's location.
    pub fn apply<T: PatchTarget + ?Sized>(&self, target: &mut T) -> Result<()> {
        let offset = self.location() as u64;
        match self {
            Self::Literal(p) => target.write_at(offset, &p.values)?,
            Self::Rle(p) => {
                let run = vec![p.value; p.length as usize];
                target.write_at(offset, &run)?;
            }
        }
        Ok(())
    }

    /// Write this patch's wire fragment (record without the file framing).
    pub fn encode<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        match self {
            Self::Literal(p) => {
                let mut prefix = [0u8; RECORD_PREFIX_LEN];
                prefix[..3].copy_from_slice(&offset_bytes(p.location));
                prefix[3..].copy_from_slice(&(p.values.len() as u16).to_be_bytes());
                w.write_all(&prefix)?;
                w.write_all(&p.values)?;
            }
            Self::Rle(p) => {
                let mut record = [0u8; RLE_RECORD_LEN];
                record[..3].copy_from_slice(&offset_bytes(p.location));
                // record[3..5] stays zero: the RLE discriminator.
                record[5..7].copy_from_slice(&p.length.to_be_bytes());
                record[7] = p.value;
                w.write_all(&record)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(p) => write!(
                f,
                "{:06X}: Patch of length {}",
                p.location,
                p.values.len()
            ),
            Self::Rle(p) => write!(
                f,
                "{:06X}: RLE Patch of length {}, value {:02X}",
                p.location, p.length, p.value
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_validation() {
        assert!(Patch::literal(0, vec![1]).is_ok());
        assert!(Patch::literal(MAX_LOCATION, vec![1]).is_ok());
        assert!(Patch::literal(MAX_LOCATION + 1, vec![1]).is_err());
        assert!(Patch::literal(0, Vec::new()).is_err());
        assert!(Patch::literal(0, vec![0u8; MAX_RECORD_LEN]).is_ok());
        assert!(Patch::literal(0, vec![0u8; MAX_RECORD_LEN + 1]).is_err());
    }

    #[test]
    fn rle_validation() {
        assert!(Patch::rle(0x10, 1, 0xFF).is_ok());
        assert!(Patch::rle(0x10, 0, 0xFF).is_err());
        assert!(Patch::rle(0x0100_0000, 1, 0).is_err());
    }

    #[test]
    fn describe_literal() {
        let p = Patch::literal(0xFE, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(p.describe(), "0000FE: Patch of length 4");
    }

    #[test]
    fn describe_rle() {
        let p = Patch::rle(0x15, 14, 0x07).unwrap();
        assert_eq!(p.describe(), "000015: RLE Patch of length 14, value 07");
    }

    #[test]
    fn encode_literal_fragment() {
        let p = Patch::literal(0x010203, vec![0xAA, 0xBB]).unwrap();
        let mut out = Vec::new();
        p.encode(&mut out).unwrap();
        assert_eq!(out, [0x01, 0x02, 0x03, 0x00, 0x02, 0xAA, 0xBB]);
        assert_eq!(out.len(), p.encoded_len());
    }

    #[test]
    fn encode_rle_fragment() {
        let p = Patch::rle(0x100, 256, 0xFE).unwrap();
        let mut out = Vec::new();
        p.encode(&mut out).unwrap();
        assert_eq!(out, [0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0xFE]);
        assert_eq!(out.len(), p.encoded_len());
    }

    #[test]
    fn apply_literal_to_zeroed_buffer() {
        let p = Patch::literal(10, vec![1, 2, 3]).unwrap();
        let mut buf = vec![0u8; 20];
        p.apply(&mut buf).unwrap();
        let mut expected = vec![0u8; 10];
        expected.extend_from_slice(&[1, 2, 3]);
        expected.extend_from_slice(&[0u8; 7]);
        assert_eq!(buf, expected);
    }

    #[test]
    fn apply_rle_fills_run() {
        let p = Patch::rle(2, 3, 0x7F).unwrap();
        let mut buf = vec![0u8; 6];
        p.apply(&mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0x7F, 0x7F, 0x7F, 0]);
    }

    #[test]
    fn extent_accessors() {
        let p = Patch::rle(0xFF_FFFF, u16::MAX, 0).unwrap();
        assert_eq!(p.len(), 65535);
        assert_eq!(p.end(), 0xFF_FFFF + 65535);
        assert!(p.is_rle());
        assert!(!p.is_empty());
    }
}
