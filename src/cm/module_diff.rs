// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Module/submodule diff: compares a Connect request's expected plug-in
//! list against the actual topology, producing the `ModuleDiffBlock` a
//! Connect response (or an `AR_MOD_DIFF` record read) carries back when
//! they disagree.
//!
//! `Application::exp_module_ind`/`exp_submodule_ind` get the final say per
//! slot/subslot — the topology comparison alone only narrows candidates,
//! the application can still reject an ident-number match (or accept a
//! substitute) the way real plant configuration sometimes requires.

use std::collections::BTreeMap;

use crate::application::Application;
use crate::core::BlockWriter;
use crate::model::topology::Slot;

/// `ModuleState`/`SubmoduleState` wire values this stack distinguishes.
/// PROFINET defines more (`PLUG_WRONG`, `PLUG_SUBSTITUTE`, ...); anything
/// this stack can't actually tell apart from "missing" is reported as such.
pub mod state {
    pub const GOOD: u16 = 1;
    pub const MISSING: u16 = 4;
}

pub struct SubmoduleDiff {
    pub subslot_number: u16,
    pub submodule_ident_number: u32,
    pub state: u16,
}

pub struct ModuleDiff {
    pub slot_number: u16,
    pub module_ident_number: u32,
    pub state: u16,
    pub submodules: Vec<SubmoduleDiff>,
}

/// Compare the Connect request's expected `(slot, subslot, submodule_ident)`
/// entries against the currently plugged topology. Returns one entry per
/// slot that doesn't fully match; a Connect that matches exactly yields an
/// empty `Vec`, in which case no `ModuleDiffBlock` should be emitted.
pub fn compute(expected: &[(u16, u16, u32)], slots: &[Slot], app: &dyn Application) -> Vec<ModuleDiff> {
    let mut by_slot: BTreeMap<u16, Vec<(u16, u32)>> = BTreeMap::new();
    for &(slot, subslot, submodule_ident_number) in expected {
        by_slot.entry(slot).or_default().push((subslot, submodule_ident_number));
    }

    let mut diffs = Vec::new();
    for (slot_number, expected_subs) in by_slot {
        let actual_slot = slots.iter().find(|s| s.slot_number == slot_number);
        let actual_module_ident = actual_slot.map_or(0, |s| s.module_ident_number);
        let module_ok = actual_slot.is_some() && app.exp_module_ind(slot_number, actual_module_ident);

        let mut submodule_diffs = Vec::new();
        for (subslot_number, expected_submodule_ident) in expected_subs {
            let actual_subslot = actual_slot.and_then(|s| s.subslot(subslot_number));
            let matches = actual_subslot.map_or(false, |sub| {
                sub.plugged
                    && sub.submodule_ident_number == expected_submodule_ident
                    && app.exp_submodule_ind(slot_number, subslot_number, sub.submodule_ident_number)
            });
            if !matches {
                submodule_diffs.push(SubmoduleDiff {
                    subslot_number,
                    submodule_ident_number: actual_subslot.map_or(0, |s| s.submodule_ident_number),
                    state: state::MISSING,
                });
            }
        }

        if !module_ok || !submodule_diffs.is_empty() {
            diffs.push(ModuleDiff {
                slot_number,
                module_ident_number: actual_module_ident,
                state: if module_ok { state::GOOD } else { state::MISSING },
                submodules: submodule_diffs,
            });
        }
    }
    diffs
}

/// Encode the single-API `ModuleDiffBlock` body: `nbr_api_diffs=1, api=0`
/// (multi-API devices aren't modeled here), then `nbr_module_diffs` followed
/// by each module's `(slot, module_ident, state, nbr_submodule_diffs,
/// [subslot, submodule_ident, state]...)`.
pub fn encode_module_diff_block(diffs: &[ModuleDiff], w: &mut BlockWriter<'_>) {
    w.u16(1); // nbr_api_diffs
    w.u32(0); // api
    w.u16(diffs.len() as u16);
    for diff in diffs {
        w.u16(diff.slot_number);
        w.u32(diff.module_ident_number);
        w.u16(diff.state);
        w.u16(diff.submodules.len() as u16);
        for sub in &diff.submodules {
            w.u16(sub.subslot_number);
            w.u32(sub.submodule_ident_number);
            w.u16(sub.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_double::RecordingApplication;
    use crate::model::topology::Subslot;

    fn plugged_slot(slot_number: u16, module_ident: u32, subslot_number: u16, submodule_ident: u32) -> Slot {
        let mut slot = Slot::new(slot_number, module_ident);
        slot.subslots.push(Subslot::new(subslot_number, submodule_ident));
        slot
    }

    #[test]
    fn matching_topology_yields_no_diff() {
        let slots = vec![plugged_slot(1, 0x100, 1, 0x1000)];
        let expected = [(1, 1, 0x1000)];
        let app = RecordingApplication::default();
        assert!(compute(&expected, &slots, &app).is_empty());
    }

    #[test]
    fn missing_slot_reports_module_and_submodule_as_missing() {
        let slots: Vec<Slot> = Vec::new();
        let expected = [(1, 1, 0x1000)];
        let app = RecordingApplication::default();
        let diffs = compute(&expected, &slots, &app);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].slot_number, 1);
        assert_eq!(diffs[0].state, state::MISSING);
        assert_eq!(diffs[0].submodules.len(), 1);
        assert_eq!(diffs[0].submodules[0].state, state::MISSING);
    }

    #[test]
    fn wrong_submodule_ident_reports_submodule_diff_only() {
        let slots = vec![plugged_slot(1, 0x100, 1, 0x9999)];
        let expected = [(1, 1, 0x1000)];
        let app = RecordingApplication::default();
        let diffs = compute(&expected, &slots, &app);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].state, state::GOOD);
        assert_eq!(diffs[0].submodules.len(), 1);
        assert_eq!(diffs[0].submodules[0].submodule_ident_number, 0x9999);
    }

    #[test]
    fn encode_module_diff_block_carries_one_api_and_every_module() {
        let diffs = vec![ModuleDiff {
            slot_number: 1,
            module_ident_number: 0x100,
            state: state::MISSING,
            submodules: vec![SubmoduleDiff {
                subslot_number: 1,
                submodule_ident_number: 0,
                state: state::MISSING,
            }],
        }];
        let mut buf = vec![0u8; 64];
        let n = {
            let mut w = BlockWriter::new(&mut buf, crate::core::ser::cursor::Endian::Big);
            encode_module_diff_block(&diffs, &mut w);
            w.offset()
        };
        buf.truncate(n);
        assert_eq!(&buf[0..2], &1u16.to_be_bytes()); // nbr_api_diffs
        assert_eq!(&buf[6..8], &1u16.to_be_bytes()); // nbr_module_diffs
    }
}
