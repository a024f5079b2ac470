// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One DCE/RPC connectionless session, keyed by activity UUID.

use std::net::SocketAddr;

use crate::core::rt::Handle;
use crate::core::ser::cursor::Endian;
use crate::types::Uuid;

/// Cached response to the last DControl request on this session, so a
/// retransmitted request (the controller didn't see our reply and re-sent
/// it) replays the cached result instead of re-running the side effect
///.
pub struct CachedResponse {
    pub sequence_number: u32,
    pub body: Vec<u8>,
    pub is_fault: bool,
}

/// In-progress fragment reassembly for one direction of a session.
#[derive(Default)]
pub struct Reassembly {
    pub buffer: Vec<u8>,
    pub expected_fragment: u32,
    pub in_progress: bool,
}

impl Reassembly {
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.expected_fragment = 0;
        self.in_progress = false;
    }
}

/// One RPC session. A session outlives any single request and
/// is released only when its owning AR is released or aborted.
pub struct Session {
    pub activity_uuid: Uuid,
    pub peer_addr: SocketAddr,
    /// Endianness declared by the peer's RPC header, latched for the
    /// lifetime of the session.
    pub endian: Endian,
    pub next_send_sequence: u32,
    pub last_request_sequence: Option<u32>,
    pub cached_response: Option<CachedResponse>,
    pub reassembly: Reassembly,
    /// Set once the Connect request carrying this session has been matched
    /// to an [`crate::model::ApplicationRelation`].
    pub ar: Option<Handle>,
}

impl Session {
    pub fn new(activity_uuid: Uuid, peer_addr: SocketAddr, endian: Endian) -> Self {
        Self {
            activity_uuid,
            peer_addr,
            endian,
            next_send_sequence: 0,
            last_request_sequence: None,
            cached_response: None,
            reassembly: Reassembly::default(),
            ar: None,
        }
    }

    /// `true` if `sequence_number` is a retransmission of the last request
    /// this session already answered, in which case the caller should
    /// replay `cached_response` rather than re-execute the request.
    pub fn is_duplicate(&self, sequence_number: u32) -> bool {
        self.last_request_sequence == Some(sequence_number) && self.cached_response.is_some()
    }

    pub fn cache_response(&mut self, sequence_number: u32, body: Vec<u8>, is_fault: bool) {
        self.last_request_sequence = Some(sequence_number);
        self.cached_response = Some(CachedResponse {
            sequence_number,
            body,
            is_fault,
        });
    }

    pub fn next_sequence(&mut self) -> u32 {
        let seq = self.next_send_sequence;
        self.next_send_sequence = self.next_send_sequence.wrapping_add(1);
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:34964".parse().unwrap()
    }

    #[test]
    fn duplicate_detection_requires_matching_sequence_and_cache() {
        let mut s = Session::new(Uuid::nil(), addr(), Endian::Little);
        assert!(!s.is_duplicate(3));
        s.cache_response(3, vec![1, 2, 3], false);
        assert!(s.is_duplicate(3));
        assert!(!s.is_duplicate(4));
    }

    #[test]
    fn sequence_counter_wraps() {
        let mut s = Session::new(Uuid::nil(), addr(), Endian::Little);
        s.next_send_sequence = u32::MAX;
        assert_eq!(s.next_sequence(), u32::MAX);
        assert_eq!(s.next_sequence(), 0);
    }

    #[test]
    fn reassembly_reset_clears_state() {
        let mut r = Reassembly::default();
        r.buffer.extend_from_slice(&[1, 2, 3]);
        r.expected_fragment = 2;
        r.in_progress = true;
        r.reset();
        assert!(r.buffer.is_empty());
        assert_eq!(r.expected_fragment, 0);
        assert!(!r.in_progress);
    }
}
