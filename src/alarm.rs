// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Alarm engine.
//!
//! Every alarm (process, diagnosis, pull, plug, ...) goes out as an
//! RTA-PDU and is retried until the controller's ACK arrives, up to
//! `max_retries`; past that the alarm is dropped and logged. High-priority
//! alarms get their own retry/ack window, independent of low-priority ones,
//! so a backlog of diagnosis alarms never delays a safety-relevant one.

use std::collections::VecDeque;

use crate::core::ser::cursor::Endian;
use crate::core::rt::arena::{Arena, Handle};
use crate::core::BlockWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPriority {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmType {
    Diagnosis,
    Process,
    Pull,
    Plug,
    StatusChanged,
}

impl AlarmType {
    fn wire_code(self) -> u16 {
        match self {
            AlarmType::Diagnosis => 1,
            AlarmType::Process => 2,
            AlarmType::Pull => 3,
            AlarmType::Plug => 4,
            AlarmType::StatusChanged => 5,
        }
    }
}

/// RTA-PDU block types, one per alarm priority (an ACK carries no payload and
/// is matched purely on `sequence_number`, so it has no block type of its
/// own — see [`AlarmChannel::on_ack`]).
pub mod block_type {
    pub const ALARM_NOTIFICATION_LOW: u16 = 0x0001;
    pub const ALARM_NOTIFICATION_HIGH: u16 = 0x0002;
}

#[derive(Debug, Clone)]
pub struct AlarmPdu {
    pub alarm_type: AlarmType,
    pub priority: AlarmPriority,
    pub slot: u16,
    pub subslot: u16,
    pub sequence_number: u16,
    pub payload: Vec<u8>,
}

/// Encode one alarm as an RTA-PDU block: `(alarm_type, slot, subslot,
/// sequence_number)` followed by the alarm-specific payload (a diagnosis
/// channel block, for instance), wrapped in the priority's
/// `ALARM_NOTIFICATION` block.
pub fn encode_rta_pdu(pdu: &AlarmPdu, endian: Endian) -> Vec<u8> {
    let block_type = match pdu.priority {
        AlarmPriority::Low => block_type::ALARM_NOTIFICATION_LOW,
        AlarmPriority::High => block_type::ALARM_NOTIFICATION_HIGH,
    };
    let mut buf = vec![0u8; 16 + pdu.payload.len()];
    let n = {
        let mut w = BlockWriter::new(&mut buf, endian);
        let patch = w.begin_block(block_type, 1, 0);
        w.u16(pdu.alarm_type.wire_code());
        w.u16(pdu.slot);
        w.u16(pdu.subslot);
        w.u16(pdu.sequence_number);
        w.bytes(&pdu.payload);
        w.end_block(patch);
        w.offset()
    };
    buf.truncate(n);
    buf
}

struct Pending {
    pdu: AlarmPdu,
    retries_left: u8,
    next_send_due_us: u64,
}

/// Outcome of one [`AlarmChannel::tick`] call.
#[derive(Debug, Default)]
pub struct AlarmTick {
    pub pdu: Option<AlarmPdu>,
    pub retries_exhausted: bool,
}

/// Retry/ack policy, one per priority class.
#[derive(Debug, Clone, Copy)]
pub struct AlarmTiming {
    pub max_retries: u8,
    pub ack_timeout_us: u64,
}

impl Default for AlarmTiming {
    fn default() -> Self {
        Self {
            max_retries: 3,
            ack_timeout_us: 1_000_000,
        }
    }
}

/// One priority class's outstanding alarms: a send queue plus the one
/// currently awaiting ACK.
pub struct AlarmChannel {
    timing: AlarmTiming,
    queue: VecDeque<AlarmPdu>,
    in_flight: Option<Pending>,
    next_sequence_number: u16,
}

impl AlarmChannel {
    pub fn new(timing: AlarmTiming) -> Self {
        Self {
            timing,
            queue: VecDeque::new(),
            in_flight: None,
            next_sequence_number: 0,
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len() + self.in_flight.is_some() as usize
    }

    /// Enqueue a new alarm, assigning it the next sequence number.
    pub fn push(&mut self, alarm_type: AlarmType, priority: AlarmPriority, slot: u16, subslot: u16, payload: Vec<u8>) -> u16 {
        let seq = self.next_sequence_number;
        self.next_sequence_number = self.next_sequence_number.wrapping_add(1);
        self.queue.push_back(AlarmPdu {
            alarm_type,
            priority,
            slot,
            subslot,
            sequence_number: seq,
            payload,
        });
        seq
    }

    /// Driven every scheduler pass. `pdu` carries a PDU that should be
    /// (re)transmitted this tick: either the next queued alarm (nothing
    /// currently in flight) or a retransmission of the in-flight one whose
    /// ack timeout elapsed. `retries_exhausted` signals that the in-flight
    /// alarm ran out its retry budget with no ACK — the whole AR this
    /// channel belongs to must be aborted, per PROFINET's alarm-transport
    /// semantics (an unacknowledged alarm means the AR's alarm CR is no
    /// longer reliable, not just that one alarm).
    pub fn tick(&mut self, now_us: u64) -> AlarmTick {
        if let Some(pending) = &mut self.in_flight {
            if now_us < pending.next_send_due_us {
                return AlarmTick::default();
            }
            if pending.retries_left == 0 {
                log::warn!(
                    "[alarm] retries exhausted for seq={}, aborting AR",
                    pending.pdu.sequence_number
                );
                self.in_flight = None;
                return AlarmTick {
                    pdu: None,
                    retries_exhausted: true,
                };
            }
            pending.retries_left -= 1;
            pending.next_send_due_us = now_us + self.timing.ack_timeout_us;
            return AlarmTick {
                pdu: Some(pending.pdu.clone()),
                retries_exhausted: false,
            };
        }

        let Some(pdu) = self.queue.pop_front() else {
            return AlarmTick::default();
        };
        let out = pdu.clone();
        self.in_flight = Some(Pending {
            pdu,
            retries_left: self.timing.max_retries,
            next_send_due_us: now_us + self.timing.ack_timeout_us,
        });
        AlarmTick {
            pdu: Some(out),
            retries_exhausted: false,
        }
    }

    /// Acknowledge the in-flight alarm. No-op if `sequence_number` doesn't
    /// match (a stale/duplicate ACK).
    pub fn on_ack(&mut self, sequence_number: u16) {
        if matches!(&self.in_flight, Some(p) if p.pdu.sequence_number == sequence_number) {
            self.in_flight = None;
        }
    }
}

/// Owns both priority channels for one AR's AlarmCR.
pub struct AlarmEngine {
    pub low: AlarmChannel,
    pub high: AlarmChannel,
}

impl AlarmEngine {
    pub fn new(timing: AlarmTiming) -> Self {
        Self {
            low: AlarmChannel::new(timing),
            high: AlarmChannel::new(timing),
        }
    }

    pub fn push(&mut self, alarm_type: AlarmType, priority: AlarmPriority, slot: u16, subslot: u16, payload: Vec<u8>) -> u16 {
        match priority {
            AlarmPriority::Low => self.low.push(alarm_type, priority, slot, subslot, payload),
            AlarmPriority::High => self.high.push(alarm_type, priority, slot, subslot, payload),
        }
    }

    pub fn tick(&mut self, now_us: u64) -> (AlarmTick, AlarmTick) {
        (self.low.tick(now_us), self.high.tick(now_us))
    }
}

/// Per-AR alarm engines, addressed the same way the AR table is.
pub type AlarmTable = Arena<AlarmEngine>;
pub type AlarmHandle = Handle;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_sends_queued_alarm() {
        let mut ch = AlarmChannel::new(AlarmTiming::default());
        ch.push(AlarmType::Diagnosis, AlarmPriority::Low, 1, 1, vec![1, 2, 3]);
        let pdu = ch.tick(0).pdu.unwrap();
        assert_eq!(pdu.payload, vec![1, 2, 3]);
        assert!(ch.tick(0).pdu.is_none()); // waiting on ack timeout
    }

    #[test]
    fn retransmits_after_ack_timeout_elapses() {
        let timing = AlarmTiming {
            max_retries: 2,
            ack_timeout_us: 100,
        };
        let mut ch = AlarmChannel::new(timing);
        ch.push(AlarmType::Process, AlarmPriority::Low, 0, 0, vec![9]);
        ch.tick(0);
        assert!(ch.tick(50).pdu.is_none());
        let retry = ch.tick(100).pdu.unwrap();
        assert_eq!(retry.sequence_number, 0);
    }

    #[test]
    fn exhausting_retries_signals_abort_and_clears_in_flight() {
        let timing = AlarmTiming {
            max_retries: 1,
            ack_timeout_us: 10,
        };
        let mut ch = AlarmChannel::new(timing);
        ch.push(AlarmType::Process, AlarmPriority::Low, 0, 0, vec![1]);
        ch.push(AlarmType::Process, AlarmPriority::Low, 0, 0, vec![2]);
        ch.tick(0); // initial send, retries_left=1
        ch.tick(10); // one retry, retries_left=0
        let exhausted = ch.tick(20); // exhausted
        assert!(exhausted.pdu.is_none());
        assert!(exhausted.retries_exhausted);
        assert_eq!(ch.queue_len(), 1); // the second queued alarm is left untouched
    }

    #[test]
    fn ack_clears_in_flight_and_unblocks_next() {
        let mut ch = AlarmChannel::new(AlarmTiming::default());
        ch.push(AlarmType::Process, AlarmPriority::Low, 0, 0, vec![1]);
        ch.push(AlarmType::Process, AlarmPriority::Low, 0, 0, vec![2]);
        let first = ch.tick(0).pdu.unwrap();
        ch.on_ack(first.sequence_number);
        let next = ch.tick(0).pdu.unwrap();
        assert_eq!(next.payload, vec![2]);
    }

    #[test]
    fn stale_ack_is_ignored() {
        let mut ch = AlarmChannel::new(AlarmTiming::default());
        ch.push(AlarmType::Process, AlarmPriority::Low, 0, 0, vec![1]);
        ch.tick(0);
        ch.on_ack(999);
        assert!(ch.tick(0).pdu.is_none()); // still in flight, ack timeout not elapsed
    }

    #[test]
    fn encode_rta_pdu_carries_sequence_and_payload() {
        let pdu = AlarmPdu {
            alarm_type: AlarmType::Diagnosis,
            priority: AlarmPriority::High,
            slot: 1,
            subslot: 2,
            sequence_number: 7,
            payload: vec![0xAA, 0xBB],
        };
        let frame = encode_rta_pdu(&pdu, Endian::Big);
        assert_eq!(&frame[0..2], &block_type::ALARM_NOTIFICATION_HIGH.to_be_bytes());
        assert!(frame.ends_with(&[0xAA, 0xBB]));
    }
}
