// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CMRDR/CMWRR: acyclic record access.
//!
//! Index space is partitioned into application records (`0x0000..0x7FFF`,
//! forwarded to [`RecordStore`]), standard system records (I&M0-I&M4,
//! `0xAFF0..0xAFF4`), and a handful of AR/subslot system records this stack
//! answers itself rather than forwarding to the application
//! (`SUB_DIAGNOSIS_CH`/`SUB_DIAGNOSIS_ALL`, `AR_MOD_DIFF`). `WriteMultiple`
//! (index `0xE040`) is a container of independent sub-writes: each one
//! succeeds or fails on its own, and the overall response reports every
//! sub-write's status rather than aborting on the first failure.
//!
//! The rest of the `0x8000..=0xAFFF` and `0xC000..=0xCFFF` ranges (AR data,
//! API, and expected-identification records beyond module diff) are not
//! implemented — see the crate's design notes for the full list.

use crate::core::ser::cursor::Endian;
use crate::core::{BlockReader, BlockWriter};
use crate::error::{PnetError, Result};
use crate::model::topology::{DiagKind, Severity, Subslot};

pub mod index {
    pub const IM0: u16 = 0xAFF0;
    pub const IM1: u16 = 0xAFF1;
    pub const IM2: u16 = 0xAFF2;
    pub const IM3: u16 = 0xAFF3;
    pub const IM4: u16 = 0xAFF4;
    pub const WRITE_MULTIPLE: u16 = 0xE040;
    pub const APPLICATION_MAX: u16 = 0x7FFF;
    /// Channel-granularity diagnosis for one subslot, FAULT-severity only.
    pub const SUB_DIAGNOSIS_CH: u16 = 0x800A;
    /// All outstanding diagnosis for one subslot, any severity.
    pub const SUB_DIAGNOSIS_ALL: u16 = 0x800F;
    /// This AR's module/submodule diff against the actual topology.
    pub const AR_MOD_DIFF: u16 = 0xC010;
}

/// One I&M0 record.
#[derive(Debug, Clone)]
pub struct Im0 {
    pub vendor_id: u16,
    pub order_id: [u8; 20],
    pub serial_number: [u8; 16],
    pub hardware_revision: u16,
    pub software_revision: [u8; 4],
    pub revision_counter: u16,
    pub profile_id: u16,
    pub profile_specific_type: u16,
    pub im_version: (u8, u8),
    pub im_supported: u16,
}

impl Im0 {
    pub fn encode(&self, buf: &mut [u8]) -> usize {
        let mut w = BlockWriter::new(buf, Endian::Big);
        w.u16(self.vendor_id);
        w.bytes(&self.order_id);
        w.bytes(&self.serial_number);
        w.u16(self.hardware_revision);
        w.bytes(&self.software_revision);
        w.u16(self.revision_counter);
        w.u16(self.profile_id);
        w.u16(self.profile_specific_type);
        w.u8(self.im_version.0);
        w.u8(self.im_version.1);
        w.u16(self.im_supported);
        w.offset()
    }
}

/// Application callback for index `0x0000..=0x7FFF` plus I&M1-4 (which are
/// writable free-text fields, unlike I&M0 which is read-only/fixed).
pub trait RecordStore: Send + Sync {
    fn read(&self, index: u16, slot: u16, subslot: u16) -> Result<Vec<u8>>;
    fn write(&self, index: u16, slot: u16, subslot: u16, data: &[u8]) -> Result<()>;
}

pub fn read_record(store: &dyn RecordStore, im0: &Im0, index: u16, slot: u16, subslot: u16) -> Result<Vec<u8>> {
    if index == index::IM0 {
        let mut buf = vec![0u8; 64];
        let n = im0.encode(&mut buf);
        buf.truncate(n);
        return Ok(buf);
    }
    if matches!(index, index::IM1..=index::IM4) || index <= index::APPLICATION_MAX {
        return store.read(index, slot, subslot);
    }
    Err(PnetError::invalid_index())
}

pub fn write_record(store: &dyn RecordStore, index: u16, slot: u16, subslot: u16, data: &[u8]) -> Result<()> {
    if index == index::IM0 {
        return Err(PnetError::invalid_index()); // I&M0 is read-only
    }
    if matches!(index, index::IM1..=index::IM4) || index <= index::APPLICATION_MAX {
        return store.write(index, slot, subslot, data);
    }
    Err(PnetError::invalid_index())
}

/// Encode a subslot's outstanding diagnosis entries as a sequence of
/// `(channel_number, channel_error_type, ext_channel_error_type)` triples,
/// most-recent first (the list's own order) — narrowed to FAULT severity
/// only when `fault_only` is set (`SUB_DIAGNOSIS_CH`), every severity
/// otherwise (`SUB_DIAGNOSIS_ALL`).
pub fn encode_subslot_diagnosis(subslot: &Subslot, fault_only: bool) -> Vec<u8> {
    let items: Vec<_> = subslot
        .diag_items
        .iter()
        .filter(|d| !fault_only || d.severity == Severity::Fault)
        .collect();
    let mut buf = vec![0u8; items.len() * 6];
    let n = {
        let mut w = BlockWriter::new(&mut buf, Endian::Big);
        for item in &items {
            w.u16(item.channel_number);
            match item.kind {
                DiagKind::Standard { channel_error_type } => {
                    w.u16(channel_error_type);
                    w.u16(0);
                }
                DiagKind::Extended { usi } => {
                    w.u16(0);
                    w.u16(usi);
                }
            }
        }
        w.offset()
    };
    buf.truncate(n);
    buf
}

/// One sub-write's outcome within a `WriteMultiple`.
pub struct SubWriteResult {
    pub index: u16,
    pub slot: u16,
    pub subslot: u16,
    pub result: Result<()>,
}

/// Parse and apply a `WriteMultiple` body: a sequence of
/// `(slot, subslot, index, length, data)` sub-write records, each applied
/// independently. One sub-write's failure does not prevent the others from
/// being attempted or from succeeding.
pub fn write_multiple(store: &dyn RecordStore, body: &[u8], endian: Endian) -> Vec<SubWriteResult> {
    let mut r = BlockReader::new(body, endian);
    let mut results = Vec::new();

    while r.remaining() >= 8 && r.is_ok() {
        let slot = r.u16();
        let subslot = r.u16();
        let index = r.u16();
        let length = r.u16();
        let data = r.bytes(length as usize);
        if !r.is_ok() {
            break;
        }
        let result = write_record(store, index, slot, subslot, data);
        results.push(SubWriteResult {
            index,
            slot,
            subslot,
            result,
        });
    }
    results
}

/// Encode a `WriteMultiple` response body: one block per sub-write, each
/// `(slot, subslot, index, status[4], pad[2])`, in request order. The
/// trailing pad brings every block up to 12 bytes so sub-results stay
/// 4-byte aligned regardless of how many precede them.
pub fn encode_write_multiple_response(results: &[SubWriteResult]) -> Vec<u8> {
    const BLOCK_LEN: usize = 12;
    let mut buf = vec![0u8; results.len() * BLOCK_LEN];
    let mut w = BlockWriter::new(&mut buf, Endian::Big);
    for r in results {
        w.u16(r.slot);
        w.u16(r.subslot);
        w.u16(r.index);
        let status = match &r.result {
            Ok(()) => crate::error::PnioStatus::OK,
            Err(e) => e.status(),
        };
        w.bytes(&status.to_bytes());
        w.u16(0); // pad to keep each sub-result 4-byte aligned
    }
    let n = w.offset();
    buf.truncate(n);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FakeStore {
        rejects: Vec<u16>,
        writes: Mutex<Vec<(u16, u16, u16, Vec<u8>)>>,
    }

    impl RecordStore for FakeStore {
        fn read(&self, index: u16, _slot: u16, _subslot: u16) -> Result<Vec<u8>> {
            if self.rejects.contains(&index) {
                Err(PnetError::invalid_index())
            } else {
                Ok(vec![0xAB])
            }
        }

        fn write(&self, index: u16, slot: u16, subslot: u16, data: &[u8]) -> Result<()> {
            if self.rejects.contains(&index) {
                return Err(PnetError::invalid_index());
            }
            self.writes.lock().push((index, slot, subslot, data.to_vec()));
            Ok(())
        }
    }

    fn sample_im0() -> Im0 {
        Im0 {
            vendor_id: 0x002A,
            order_id: [0; 20],
            serial_number: [0; 16],
            hardware_revision: 1,
            software_revision: [b'V', 1, 0, 0],
            revision_counter: 0,
            profile_id: 0,
            profile_specific_type: 0,
            im_version: (1, 1),
            im_supported: 0x001E,
        }
    }

    #[test]
    fn im0_is_read_only_and_synthesized() {
        let store = FakeStore { rejects: vec![], writes: Mutex::new(vec![]) };
        let im0 = sample_im0();
        let data = read_record(&store, &im0, index::IM0, 0, 1).unwrap();
        assert!(!data.is_empty());
        assert!(write_record(&store, index::IM0, 0, 1, &data).is_err());
    }

    #[test]
    fn encode_subslot_diagnosis_ch_filters_to_fault_severity() {
        use crate::model::topology::{ChannelDirection, ChannelProperties, DiagItem};
        let mut subslot = Subslot::new(1, 0x100);
        subslot.diag_appears(DiagItem {
            channel_number: 1,
            kind: DiagKind::Standard { channel_error_type: 0x0001 },
            severity: Severity::Diagnosis,
            properties: ChannelProperties {
                direction: ChannelDirection::Input,
                maintenance_required: false,
                maintenance_demanded: false,
            },
        });
        subslot.diag_appears(DiagItem {
            channel_number: 2,
            kind: DiagKind::Standard { channel_error_type: 0x0002 },
            severity: Severity::Fault,
            properties: ChannelProperties {
                direction: ChannelDirection::Input,
                maintenance_required: false,
                maintenance_demanded: false,
            },
        });

        let all = encode_subslot_diagnosis(&subslot, false);
        assert_eq!(all.len(), 12);

        let faults_only = encode_subslot_diagnosis(&subslot, true);
        assert_eq!(faults_only.len(), 6);
        assert_eq!(&faults_only[0..2], &2u16.to_be_bytes());
    }

    #[test]
    fn write_multiple_partial_failure_does_not_block_other_subwrites() {
        let store = FakeStore {
            rejects: vec![0x1234],
            writes: Mutex::new(vec![]),
        };
        let mut buf = vec![0u8; 32];
        let n = {
            let mut w = BlockWriter::new(&mut buf, Endian::Big);
            // sub-write 1: will be rejected
            w.u16(0); // slot
            w.u16(1); // subslot
            w.u16(0x1234); // index
            w.u16(2);
            w.bytes(&[1, 2]);
            // sub-write 2: accepted
            w.u16(0);
            w.u16(1);
            w.u16(0x0010);
            w.u16(3);
            w.bytes(&[3, 4, 5]);
            w.offset()
        };
        buf.truncate(n);
        let results = write_multiple(&store, &buf, Endian::Big);
        assert_eq!(results.len(), 2);
        assert!(results[0].result.is_err());
        assert!(results[1].result.is_ok());
        assert_eq!(store.writes.lock().len(), 1);
    }

    #[test]
    fn encode_write_multiple_response_carries_one_status_per_subwrite() {
        let store = FakeStore {
            rejects: vec![0xFFFF],
            writes: Mutex::new(vec![]),
        };
        let mut buf = vec![0u8; 64];
        let n = {
            let mut w = BlockWriter::new(&mut buf, Endian::Big);
            w.u16(1);
            w.u16(1);
            w.u16(0x0028);
            w.u16(1);
            w.bytes(&[0xAA]);
            w.u16(1);
            w.u16(1);
            w.u16(0xFFFF);
            w.u16(1);
            w.bytes(&[0xBB]);
            w.u16(1);
            w.u16(1);
            w.u16(0x0029);
            w.u16(1);
            w.bytes(&[0xCC]);
            w.offset()
        };
        buf.truncate(n);
        let results = write_multiple(&store, &buf, Endian::Big);
        assert_eq!(results.len(), 3);

        let response = encode_write_multiple_response(&results);
        assert_eq!(response.len(), 3 * 12);
        for (i, chunk) in response.chunks(12).enumerate() {
            assert_eq!(&chunk[0..2], &1u16.to_be_bytes()); // slot
            assert_eq!(&chunk[2..4], &1u16.to_be_bytes()); // subslot
            let status_ok = chunk[6] == 0 && chunk[7] == 0;
            if i == 1 {
                assert!(!status_ok, "middle sub-write should report a failing status");
            } else {
                assert!(status_ok, "sub-write {i} should report success");
            }
        }
    }
}
