// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DCP TLV blocks (`Option`/`Suboption`/`DCPBlockLength`/value, padded to an
//! even length).

use crate::core::ser::cursor::Endian;
use crate::core::{BlockReader, BlockWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcpOption {
    Ip { suboption: u8 },
    DeviceProperties { suboption: u8 },
    DhcpOption { suboption: u8 },
    Control { suboption: u8 },
    AllSelector,
}

impl DcpOption {
    fn as_codes(self) -> (u8, u8) {
        match self {
            DcpOption::Ip { suboption } => (1, suboption),
            DcpOption::DeviceProperties { suboption } => (2, suboption),
            DcpOption::DhcpOption { suboption } => (3, suboption),
            DcpOption::Control { suboption } => (5, suboption),
            DcpOption::AllSelector => (0xFF, 0xFF),
        }
    }

    fn from_codes(option: u8, suboption: u8) -> Option<Self> {
        match option {
            1 => Some(DcpOption::Ip { suboption }),
            2 => Some(DcpOption::DeviceProperties { suboption }),
            3 => Some(DcpOption::DhcpOption { suboption }),
            5 => Some(DcpOption::Control { suboption }),
            0xFF if suboption == 0xFF => Some(DcpOption::AllSelector),
            _ => None,
        }
    }
}

/// Well-known `DeviceProperties` suboptions.
pub mod device_properties {
    pub const NAME_OF_STATION: u8 = 2;
    pub const DEVICE_ID: u8 = 3;
    pub const DEVICE_ROLE: u8 = 4;
    pub const DEVICE_OPTIONS: u8 = 1;
    pub const ALIAS_NAME: u8 = 6;
}

/// Well-known `Control` suboptions.
pub mod control {
    pub const START_TRANSACTION: u8 = 1;
    pub const END_TRANSACTION: u8 = 2;
    pub const SIGNAL: u8 = 3;
    pub const RESPONSE: u8 = 4;
    pub const FACTORY_RESET: u8 = 5;
}

/// Well-known `Ip` suboptions.
pub mod ip {
    pub const MAC_ADDRESS: u8 = 1;
    pub const IP_PARAMETER: u8 = 2;
}

#[derive(Debug, Clone)]
pub struct DcpBlock<'a> {
    pub option: DcpOption,
    pub block_qualifier: Option<u16>,
    pub value: &'a [u8],
}

/// Parse one block (option/suboption/length/value, value padded to even
/// length). `block_qualifier`, where present, is the first two value bytes
/// of blocks that carry one (Name-of-station, IP parameter, ...); the caller
/// decides per-option whether to peel it off.
pub fn parse_block<'a>(r: &mut BlockReader<'a>) -> Option<DcpBlock<'a>> {
    let option = r.u8();
    let suboption = r.u8();
    let length = r.u16();
    if !r.is_ok() {
        return None;
    }
    let value = r.bytes(length as usize);
    if length % 2 == 1 {
        let _ = r.bytes(1); // odd-length padding byte
    }
    if !r.is_ok() {
        return None;
    }
    let option = DcpOption::from_codes(option, suboption)?;
    Some(DcpBlock {
        option,
        block_qualifier: None,
        value,
    })
}

pub fn write_block(w: &mut BlockWriter<'_>, option: DcpOption, value: &[u8]) {
    let (opt, sub) = option.as_codes();
    w.u8(opt);
    w.u8(sub);
    w.u16(value.len() as u16);
    w.bytes(value);
    if value.len() % 2 == 1 {
        w.u8(0);
    }
}
