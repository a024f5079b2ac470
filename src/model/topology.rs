// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Device slot/subslot topology and per-subslot diagnosis.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDirection {
    Input,
    Output,
    Bidirectional,
    Manufacturer,
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelProperties {
    pub direction: ChannelDirection,
    pub maintenance_required: bool,
    pub maintenance_demanded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Diagnosis,
    Maintenance,
    Fault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagKind {
    /// Standard PROFINET channel diagnosis (ChannelNumber/ChannelErrorType).
    Standard { channel_error_type: u16 },
    /// Vendor-defined diagnosis carried under a USI (User Structure
    /// Identifier) other than the standard-format reserved values.
    Extended { usi: u16 },
}

/// One outstanding diagnosis entry for a subslot. Subslots
/// hold these in an intrusive, head-insertion-order list so that
/// `ALL_DISAPPEARS` can walk and clear them without a separate index.
#[derive(Debug, Clone)]
pub struct DiagItem {
    pub channel_number: u16,
    pub kind: DiagKind,
    pub severity: Severity,
    pub properties: ChannelProperties,
}

/// One subslot within a [`Slot`].
pub struct Subslot {
    pub subslot_number: u16,
    pub submodule_ident_number: u32,
    /// Most recently inserted diagnosis is at the front.
    pub diag_items: Vec<DiagItem>,
    pub plugged: bool,
}

impl Subslot {
    pub fn new(subslot_number: u16, submodule_ident_number: u32) -> Self {
        Self {
            subslot_number,
            submodule_ident_number,
            diag_items: Vec::new(),
            plugged: true,
        }
    }

    /// `APPEARS`: insert (or replace, if the same channel+kind already has
    /// an entry) at the front of the list.
    pub fn diag_appears(&mut self, item: DiagItem) {
        self.diag_items
            .retain(|d| !(d.channel_number == item.channel_number && d.kind == item.kind));
        self.diag_items.insert(0, item);
    }

    /// `DISAPPEARS`: remove the matching entry. Returns `true` if one was
    /// removed.
    pub fn diag_disappears(&mut self, channel_number: u16, kind: DiagKind) -> bool {
        let before = self.diag_items.len();
        self.diag_items
            .retain(|d| !(d.channel_number == channel_number && d.kind == kind));
        self.diag_items.len() != before
    }

    /// `ALL_DISAPPEARS` / `DIS_OTHERS_REMAIN`: drop every entry, returning
    /// what was cleared so the caller can decide whether to emit individual
    /// DISAPPEARS alarms or a single summary one.
    pub fn clear_all_diag(&mut self) -> Vec<DiagItem> {
        std::mem::take(&mut self.diag_items)
    }

    /// The station/subslot "problem indicator" rollup: the worst severity
    /// across all current diagnosis entries, if any.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.diag_items.iter().map(|d| d.severity).max()
    }

    pub fn has_fault(&self) -> bool {
        matches!(self.worst_severity(), Some(Severity::Fault))
    }
}

/// One slot in the device's module topology.
pub struct Slot {
    pub slot_number: u16,
    pub module_ident_number: u32,
    pub subslots: Vec<Subslot>,
}

impl Slot {
    pub fn new(slot_number: u16, module_ident_number: u32) -> Self {
        Self {
            slot_number,
            module_ident_number,
            subslots: Vec::new(),
        }
    }

    pub fn subslot(&self, subslot_number: u16) -> Option<&Subslot> {
        self.subslots.iter().find(|s| s.subslot_number == subslot_number)
    }

    pub fn subslot_mut(&mut self, subslot_number: u16) -> Option<&mut Subslot> {
        self.subslots.iter_mut().find(|s| s.subslot_number == subslot_number)
    }

    /// The station problem indicator for this slot: set only if some
    /// subslot has a FAULT-severity diagnosis outstanding — Diagnosis- and
    /// Maintenance-severity entries don't raise it.
    pub fn has_fault(&self) -> bool {
        self.subslots.iter().any(Subslot::has_fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(channel: u16, severity: Severity) -> DiagItem {
        DiagItem {
            channel_number: channel,
            kind: DiagKind::Standard { channel_error_type: 0x0001 },
            severity,
            properties: ChannelProperties {
                direction: ChannelDirection::Input,
                maintenance_required: false,
                maintenance_demanded: false,
            },
        }
    }

    #[test]
    fn appears_inserts_at_front_and_replaces_same_channel() {
        let mut s = Subslot::new(1, 0x100);
        s.diag_appears(item(1, Severity::Diagnosis));
        s.diag_appears(item(2, Severity::Fault));
        assert_eq!(s.diag_items[0].channel_number, 2);
        s.diag_appears(item(1, Severity::Fault));
        assert_eq!(s.diag_items.len(), 2);
        assert_eq!(s.diag_items[0].channel_number, 1);
    }

    #[test]
    fn disappears_removes_matching_entry_only() {
        let mut s = Subslot::new(1, 0x100);
        s.diag_appears(item(1, Severity::Diagnosis));
        s.diag_appears(item(2, Severity::Fault));
        assert!(s.diag_disappears(1, DiagKind::Standard { channel_error_type: 0x0001 }));
        assert_eq!(s.diag_items.len(), 1);
        assert_eq!(s.diag_items[0].channel_number, 2);
    }

    #[test]
    fn worst_severity_rolls_up_fault_over_diagnosis() {
        let mut s = Subslot::new(1, 0x100);
        s.diag_appears(item(1, Severity::Diagnosis));
        s.diag_appears(item(2, Severity::Maintenance));
        assert_eq!(s.worst_severity(), Some(Severity::Maintenance));
        s.diag_appears(item(3, Severity::Fault));
        assert!(s.has_fault());
    }

    #[test]
    fn slot_has_fault_ignores_diagnosis_and_maintenance_only_entries() {
        let mut slot = Slot::new(1, 0x100);
        let mut sub = Subslot::new(1, 0x200);
        sub.diag_appears(item(1, Severity::Diagnosis));
        slot.subslots.push(sub);
        assert!(!slot.has_fault());

        slot.subslots[0].diag_appears(item(2, Severity::Maintenance));
        assert!(!slot.has_fault());

        slot.subslots[0].diag_appears(item(3, Severity::Fault));
        assert!(slot.has_fault());
    }

    #[test]
    fn all_disappears_clears_every_entry() {
        let mut s = Subslot::new(1, 0x100);
        s.diag_appears(item(1, Severity::Diagnosis));
        s.diag_appears(item(2, Severity::Fault));
        let cleared = s.clear_all_diag();
        assert_eq!(cleared.len(), 2);
        assert!(s.diag_items.is_empty());
    }
}
