// Error taxonomy for IPS decoding, encoding and application.

use std::io;

use thiserror::Error;

/// Convenience alias used throughout the `ips` module.
pub type Result<T> = std::result::Result<T, IpsError>;

/// Errors produced by the IPS codec.
///
/// Every variant other than [`IpsError::Io`] describes malformed patch data
/// and is reported by [`IpsError::is_format`].
#[derive(Debug, Error)]
pub enum IpsError {
    /// Underlying read or write failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream does not start with the `PATCH` magic.
    #[error("not a valid IPS file")]
    NotIps,

    /// The stream ended where the next record's offset was expected.
    #[error("missing EOF marker after {record} records")]
    MissingEof { record: u64 },

    /// The stream ended in the middle of a record field.
    #[error("truncated {field} in record {record}")]
    Truncated { record: u64, field: &'static str },

    /// A patch value violates the format's invariants.
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
}

impl IpsError {
    /// True for malformed input, false for I/O failures.
    pub fn is_format(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_classification() {
        assert!(IpsError::NotIps.is_format());
        assert!(IpsError::MissingEof { record: 3 }.is_format());
        assert!(
            IpsError::Truncated {
                record: 0,
                field: "payload"
            }
            .is_format()
        );
        assert!(!IpsError::Io(io::Error::other("disk full")).is_format());
    }

    #[test]
    fn messages() {
        assert_eq!(IpsError::NotIps.to_string(), "not a valid IPS file");
        let e = IpsError::Truncated {
            record: 2,
            field: "offset",
        };
        assert_eq!(e.to_string(), "truncated offset in record 2");
    }
}
