// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cyclic (real-time) data exchange: the provider side (PPM, C9) and the
//! consumer side (CPM, C10).

pub mod cpm;
pub mod ppm;

pub use cpm::{Cpm, CpmState};
pub use ppm::Ppm;

/// `DataStatus` bits carried in the last byte of every cyclic frame
///.
pub mod data_status {
    pub const STATE_RUN: u8 = 0x01;
    pub const REDUNDANCY_PRIMARY: u8 = 0x02;
    pub const PROVIDER_STATE_RUN: u8 = 0x04;
    pub const DATA_VALID: u8 = 0x08;
    pub const STATION_PROBLEM_INDICATOR: u8 = 0x10;
    pub const IGNORE: u8 = 0x20;
}
