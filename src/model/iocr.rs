// SPDX-License-Identifier: Apache-2.0 OR MIT

//! IO Communication Relations — the cyclic-data contract negotiated
//! per AR at Connect.

use crate::types::Mac;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IocrDirection {
    Input,
    Output,
}

/// One IO data object (one submodule's worth of cyclic data) placed at a
/// fixed offset within the IOCR's frame.
#[derive(Debug, Clone)]
pub struct IoDataObject {
    pub slot: u16,
    pub subslot: u16,
    pub frame_offset: u16,
    pub length: u16,
    /// `IOPS`/`IOCS` offset for this object, one byte each.
    pub iops_offset: u16,
    pub iocs_offset: u16,
}

/// One IO Communication Relation: the wire contract for one direction of
/// cyclic data exchange between controller and device.
pub struct Iocr {
    pub crep: u16,
    pub frame_id: u16,
    pub direction: IocrDirection,
    pub send_clock_factor: u16,
    pub reduction_ratio: u16,
    pub phase: u16,
    pub data_hold_factor: u16,
    pub watchdog_factor: u16,
    pub vlan_id: Option<u16>,
    pub peer_mac: Mac,
    pub data_objects: Vec<IoDataObject>,
    /// Offset of the trailing `DataStatus` byte in the frame.
    pub data_status_offset: u16,
    /// Total cyclic frame length, including IOxS bytes and data status.
    pub frame_length: u16,
}

impl Iocr {
    /// Send interval in microseconds: `send_clock_factor * 31.25us * reduction_ratio`
    ///.
    pub fn send_interval_us(&self) -> u64 {
        (self.send_clock_factor as u64) * 3125 * (self.reduction_ratio as u64) / 100
    }

    /// Data Hold Time in microseconds — how long CPM keeps the last good
    /// frame before declaring it stale.
    pub fn data_hold_time_us(&self) -> u64 {
        self.send_interval_us() * self.data_hold_factor as u64
    }
}
