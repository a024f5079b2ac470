// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Low-level bounds-checked buffer cursors shared by the block codec ([`crate::core::block`]).

pub mod cursor;

pub use cursor::{Cursor, CursorMut};

use std::fmt;

/// Serialization error used within `core::ser` and `core::block`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerError {
    WriteFailed { offset: usize, reason: String },
    ReadFailed { offset: usize, reason: String },
    InvalidData { reason: String },
}

impl fmt::Display for SerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerError::WriteFailed { offset, reason } => {
                write!(f, "write failed at offset {offset}: {reason}")
            }
            SerError::ReadFailed { offset, reason } => {
                write!(f, "read failed at offset {offset}: {reason}")
            }
            SerError::InvalidData { reason } => write!(f, "invalid data: {reason}"),
        }
    }
}

impl std::error::Error for SerError {}

pub type SerResult<T> = core::result::Result<T, SerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_variants() {
        let err = SerError::WriteFailed {
            offset: 12,
            reason: "buffer too small".into(),
        };
        assert_eq!(format!("{err}"), "write failed at offset 12: buffer too small");
    }
}
