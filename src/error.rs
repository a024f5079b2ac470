// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy, bound to the PROFINET 4-tuple result code
//! `(error_code, error_decode, error_code_1, error_code_2)`.
//!
//! One flat, section-grouped enum; `Display` via the textual PROFINET
//! category names; no panics anywhere in the crate on malformed wire input.

use std::fmt;

/// Top-level PROFINET error class (`error_code`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok,
    Connect,
    Release,
    DControl,
    CControl,
    ReadWrite,
    Alarm,
    Rta,
}

/// `error_decode` — which of the two following bytes is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDecode {
    Pnio,
    Pnorpc,
}

/// The PROFINET 4-tuple result code carried in every RPC response and alarm
/// reason field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PnioStatus {
    pub error_code: ErrorCode,
    pub error_decode: ErrorDecode,
    pub error_code_1: u8,
    pub error_code_2: u8,
}

impl ErrorCode {
    fn to_u8(self) -> u8 {
        match self {
            ErrorCode::Ok => 0x00,
            ErrorCode::Connect => 0x01,
            ErrorCode::Release => 0x02,
            ErrorCode::DControl => 0x03,
            ErrorCode::CControl => 0x04,
            ErrorCode::ReadWrite => 0x05,
            ErrorCode::Alarm => 0x06,
            ErrorCode::Rta => 0x07,
        }
    }
}

impl ErrorDecode {
    fn to_u8(self) -> u8 {
        match self {
            ErrorDecode::Pnio => 0x80,
            ErrorDecode::Pnorpc => 0x81,
        }
    }
}

impl PnioStatus {
    pub const OK: PnioStatus = PnioStatus {
        error_code: ErrorCode::Ok,
        error_decode: ErrorDecode::Pnio,
        error_code_1: 0,
        error_code_2: 0,
    };

    pub fn new(error_code: ErrorCode, decode: ErrorDecode, code_1: u8, code_2: u8) -> Self {
        Self {
            error_code,
            error_decode: decode,
            error_code_1: code_1,
            error_code_2: code_2,
        }
    }

    pub fn is_ok(self) -> bool {
        matches!(self.error_code, ErrorCode::Ok)
    }

    /// Wire encoding of the 4-tuple, `(error_code, error_decode,
    /// error_code_1, error_code_2)`, one byte each.
    pub fn to_bytes(self) -> [u8; 4] {
        [
            self.error_code.to_u8(),
            self.error_decode.to_u8(),
            self.error_code_1,
            self.error_code_2,
        ]
    }
}

/// well-known `error_code_1` values for the `CMRPC` decode.
pub mod error_code_1 {
    pub const CMRPC: u8 = 0xC0;
    pub const APP: u8 = 0xC1;
}

/// well-known `error_code_2` values under the `CMRPC` `error_code_1`.
pub mod cmrpc_error_code_2 {
    pub const ARGSLENGTH_INVALID: u8 = 0x40;
    pub const UNKNOWN_BLOCKS: u8 = 0x42;
    pub const NO_AR_RESOURCES: u8 = 0x17;
    pub const STATE_CONFLICT: u8 = 0x0B;
}

/// well-known `error_code_2` values under a `ReadWrite` (`PNIORW`) decode.
pub mod pniorw_error_code_2 {
    pub const ACC_INVALID_INDEX: u8 = 0xB0;
    pub const ACC_INVALID_SLOT: u8 = 0xB2;
    pub const ACC_INVALID_SUBSLOT: u8 = 0xB3;
    pub const ACC_DENIED: u8 = 0xB5;
}

/// well-known `error_code_2` values for AR-fatal transport conditions.
pub mod transport_error_code_2 {
    pub const CONSUMER_DHT_EXPIRED: u8 = 0x21;
    pub const ALARM_ACK_TIMEOUT: u8 = 0x22;
}

/// Crate-wide error type. Every fallible public operation returns
/// `Result<T, PnetError>` — parse/resource/state/access/transport failures
/// as the PROFINET error taxonomy categorizes them, plus the escape hatch for an
/// application-callback failure passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PnetError {
    /// Malformed buffer, length mismatch, unknown block type.
    Parse(PnioStatus),
    /// Out of AR slots / sessions / diag items / send buffers.
    Resource(PnioStatus),
    /// Operation invalid in the current state-machine state.
    StateConflict(PnioStatus),
    /// Unknown index, wrong slot/subslot, write to read-only.
    Access(PnioStatus),
    /// Alarm unacknowledged, CPM data-hold expired, transport-fatal.
    Transport(PnioStatus),
    /// The application callback rejected the operation; the code it
    /// returned is passed through unchanged.
    Application(PnioStatus),
}

impl PnetError {
    pub fn status(&self) -> PnioStatus {
        match self {
            PnetError::Parse(s)
            | PnetError::Resource(s)
            | PnetError::StateConflict(s)
            | PnetError::Access(s)
            | PnetError::Transport(s)
            | PnetError::Application(s) => *s,
        }
    }

    pub fn args_length_invalid() -> Self {
        PnetError::Parse(PnioStatus::new(
            ErrorCode::Connect,
            ErrorDecode::Pnio,
            error_code_1::CMRPC,
            cmrpc_error_code_2::ARGSLENGTH_INVALID,
        ))
    }

    pub fn unknown_blocks() -> Self {
        PnetError::Parse(PnioStatus::new(
            ErrorCode::Connect,
            ErrorDecode::Pnio,
            error_code_1::CMRPC,
            cmrpc_error_code_2::UNKNOWN_BLOCKS,
        ))
    }

    pub fn no_ar_resources() -> Self {
        PnetError::Resource(PnioStatus::new(
            ErrorCode::Connect,
            ErrorDecode::Pnio,
            error_code_1::CMRPC,
            cmrpc_error_code_2::NO_AR_RESOURCES,
        ))
    }

    pub fn state_conflict() -> Self {
        PnetError::StateConflict(PnioStatus::new(
            ErrorCode::Connect,
            ErrorDecode::Pnio,
            error_code_1::CMRPC,
            cmrpc_error_code_2::STATE_CONFLICT,
        ))
    }

    pub fn invalid_index() -> Self {
        PnetError::Access(PnioStatus::new(
            ErrorCode::ReadWrite,
            ErrorDecode::Pnio,
            error_code_1::APP,
            pniorw_error_code_2::ACC_INVALID_INDEX,
        ))
    }

    pub fn consumer_dht_expired() -> Self {
        PnetError::Transport(PnioStatus::new(
            ErrorCode::Alarm,
            ErrorDecode::Pnio,
            error_code_1::CMRPC,
            transport_error_code_2::CONSUMER_DHT_EXPIRED,
        ))
    }

    pub fn alarm_ack_timeout() -> Self {
        PnetError::Transport(PnioStatus::new(
            ErrorCode::Alarm,
            ErrorDecode::Pnio,
            error_code_1::CMRPC,
            transport_error_code_2::ALARM_ACK_TIMEOUT,
        ))
    }
}

impl fmt::Display for PnetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.status();
        write!(
            f,
            "{:?}/{:?} code1={:#04x} code2={:#04x}",
            s.error_code, s.error_decode, s.error_code_1, s.error_code_2
        )
    }
}

impl std::error::Error for PnetError {}

pub type Result<T> = core::result::Result<T, PnetError>;

impl From<crate::core::ser::SerError> for PnetError {
    fn from(_: crate::core::ser::SerError) -> Self {
        PnetError::args_length_invalid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_codes() {
        let e = PnetError::no_ar_resources();
        let s = format!("{e}");
        assert!(s.contains("Resource") == false); // Display shows error_code, not variant name
        assert!(s.contains("Connect"));
    }

    #[test]
    fn ok_status_is_ok() {
        assert!(PnioStatus::OK.is_ok());
        assert!(!PnetError::state_conflict().status().is_ok());
    }
}
