// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnosis.
//!
//! Bridges the intrusive per-subslot diagnosis lists in
//! [`crate::model::topology`] to the alarm engine: `APPEARS`/`DISAPPEARS`
//! raise an alarm, `ALL_DISAPPEARS` collapses a whole subslot's outstanding
//! diagnosis into a single alarm rather than one per entry, and every
//! mutation feeds the station problem indicator rollup the PPM reads each
//! cycle.

use crate::alarm::{AlarmEngine, AlarmPriority, AlarmType};
use crate::model::topology::{DiagItem, Severity, Slot};
use crate::core::{BlockWriter};
use crate::core::ser::cursor::Endian;

fn severity_to_priority(severity: Severity) -> AlarmPriority {
    match severity {
        Severity::Fault => AlarmPriority::High,
        Severity::Maintenance | Severity::Diagnosis => AlarmPriority::Low,
    }
}

fn encode_channel_diagnosis(slot: u16, subslot: u16, item: &DiagItem) -> Vec<u8> {
    let mut buf = vec![0u8; 16];
    let n = {
        let mut w = BlockWriter::new(&mut buf, Endian::Big);
        w.u16(slot);
        w.u16(subslot);
        w.u16(item.channel_number);
        match item.kind {
            crate::model::topology::DiagKind::Standard { channel_error_type } => {
                w.u16(channel_error_type);
                w.u16(0);
            }
            crate::model::topology::DiagKind::Extended { usi } => {
                w.u16(0);
                w.u16(usi);
            }
        }
        w.offset()
    };
    buf.truncate(n);
    buf
}

/// Raise `APPEARS` for a new (or replaced) diagnosis entry on `subslot`
/// within `slot`, queuing the corresponding alarm.
pub fn appears(slot_number: u16, slot: &mut Slot, subslot_number: u16, item: DiagItem, alarms: &mut AlarmEngine) {
    let Some(subslot) = slot.subslot_mut(subslot_number) else {
        log::debug!("[diag] appears on unknown subslot {subslot_number}, ignored");
        return;
    };
    let priority = severity_to_priority(item.severity);
    let payload = encode_channel_diagnosis(slot_number, subslot_number, &item);
    subslot.diag_appears(item);
    alarms.push(AlarmType::Diagnosis, priority, slot_number, subslot_number, payload);
}

/// Raise `DISAPPEARS` for one diagnosis entry. If that was the last entry on
/// the subslot this degrades to the same wire alarm (PROFINET doesn't
/// distinguish the two at the alarm level, only at the list-management
/// level: `DIS_OTHERS_REMAIN` vs the implicit "subslot now clean").
pub fn disappears(
    slot_number: u16,
    slot: &mut Slot,
    subslot_number: u16,
    channel_number: u16,
    kind: crate::model::topology::DiagKind,
    alarms: &mut AlarmEngine,
) {
    let Some(subslot) = slot.subslot_mut(subslot_number) else {
        return;
    };
    if let Some(removed) = subslot
        .diag_items
        .iter()
        .find(|d| d.channel_number == channel_number && d.kind == kind)
        .cloned()
    {
        subslot.diag_disappears(channel_number, kind);
        let priority = severity_to_priority(removed.severity);
        let payload = encode_channel_diagnosis(slot_number, subslot_number, &removed);
        alarms.push(AlarmType::Diagnosis, priority, slot_number, subslot_number, payload);
    }
}

/// `ALL_DISAPPEARS`: clear every outstanding diagnosis entry on a subslot
/// (e.g. on submodule pull) as a single alarm instead of one per entry.
pub fn all_disappears(slot_number: u16, slot: &mut Slot, subslot_number: u16, alarms: &mut AlarmEngine) {
    let Some(subslot) = slot.subslot_mut(subslot_number) else {
        return;
    };
    let cleared = subslot.clear_all_diag();
    if cleared.is_empty() {
        return;
    }
    let priority = cleared
        .iter()
        .map(|d| severity_to_priority(d.severity))
        .find(|p| *p == AlarmPriority::High)
        .unwrap_or(AlarmPriority::Low);
    let mut buf = vec![0u8; 4];
    {
        let mut w = BlockWriter::new(&mut buf, Endian::Big);
        w.u16(slot_number);
        w.u16(subslot_number);
    }
    alarms.push(AlarmType::Diagnosis, priority, slot_number, subslot_number, buf);
}

/// Station problem indicator: set only while some slot has a FAULT-severity
/// diagnosis outstanding. The PPM reads this every cycle to set
/// `DataStatus.StationProblemIndicator`.
pub fn station_problem_indicator(slots: &[Slot]) -> bool {
    slots.iter().any(Slot::has_fault)
}
