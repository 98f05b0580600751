//! ipspatch: IPS binary patch decoding, encoding and application.
//!
//! The crate provides:
//! - The IPS codec and applier (`ips`)
//! - File-oriented helpers for the copy-then-patch workflow (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use ipspatch::ips::{self, Patch};
//!
//! let patches = vec![
//!     Patch::literal(0x10, vec![0xDE, 0xAD]).unwrap(),
//!     Patch::rle(0x20, 4, 0xFF).unwrap(),
//! ];
//! let bytes = ips::encode_to_vec(&patches).unwrap();
//! assert_eq!(ips::decode_memory(&bytes).unwrap(), patches);
//!
//! let mut rom = vec![0u8; 0x40];
//! ips::apply_patches(&patches, &mut rom).unwrap();
//! assert_eq!(&rom[0x10..0x12], &[0xDE, 0xAD]);
//! ```

pub mod io;
pub mod ips;

#[cfg(feature = "cli")]
pub mod cli;
