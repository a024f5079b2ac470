// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Provider (producer) side of cyclic data exchange.
//!
//! One [`Ppm`] per output IOCR. [`Ppm::tick`] is called every scheduler
//! pass; it fires (returns `Some(frame)`) once `send_interval_us` has
//! elapsed since the last transmission, paced off the caller's monotonic
//! clock rather than its own timer thread.

use super::data_status;
use crate::model::Iocr;

pub struct Ppm {
    cycle_counter: u16,
    next_due_us: u64,
    send_interval_us: u64,
    frame: Vec<u8>,
}

impl Ppm {
    pub fn new(iocr: &Iocr, now_us: u64) -> Self {
        Self {
            cycle_counter: 0,
            next_due_us: now_us + iocr.send_interval_us(),
            send_interval_us: iocr.send_interval_us(),
            frame: vec![0u8; iocr.frame_length as usize],
        }
    }

    pub fn cycle_counter(&self) -> u16 {
        self.cycle_counter
    }

    /// Copy a data object's bytes plus its IOPS/IOCS quality byte into the
    /// frame buffer at the offsets [`crate::model::iocr::IoDataObject`]
    /// declares. Call this (for every data object whose application data
    /// changed) any time before the next `tick` fires; `tick` always sends
    /// whatever is currently staged.
    pub fn stage(&mut self, frame_offset: u16, data: &[u8], iops_offset: u16, iops_good: bool) {
        let start = frame_offset as usize;
        if start + data.len() <= self.frame.len() {
            self.frame[start..start + data.len()].copy_from_slice(data);
        }
        let iops_pos = iops_offset as usize;
        if iops_pos < self.frame.len() {
            self.frame[iops_pos] = if iops_good { 0x80 } else { 0x00 };
        }
    }

    /// Advance the send clock. Returns the frame to transmit (with the
    /// cycle counter and data status backfilled) once due, `None`
    /// otherwise. `run` reflects the AR's CMDEV state; `station_problem`
    /// reflects the device's diagnosis rollup.
    pub fn tick(&mut self, now_us: u64, run: bool, station_problem: bool, data_status_offset: u16) -> Option<&[u8]> {
        if now_us < self.next_due_us {
            return None;
        }
        self.next_due_us += self.send_interval_us;
        self.cycle_counter = self.cycle_counter.wrapping_add(1);

        let mut status = data_status::DATA_VALID | data_status::PROVIDER_STATE_RUN | data_status::REDUNDANCY_PRIMARY;
        if run {
            status |= data_status::STATE_RUN;
        }
        if station_problem {
            status |= data_status::STATION_PROBLEM_INDICATOR;
        }
        let pos = data_status_offset as usize;
        if pos < self.frame.len() {
            self.frame[pos] = status;
        }
        Some(&self.frame)
    }
}
