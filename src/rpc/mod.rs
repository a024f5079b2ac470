// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DCE/RPC connectionless engine — session demux, fragmentation and
//! reassembly, FACK, and idempotent re-run caching, sitting directly on top
//! of UDP port `0x8894`.

pub mod pdu;

use std::net::SocketAddr;

use crate::core::rt::arena::{Arena, Handle};
use crate::core::ser::cursor::Endian;
use crate::error::{PnetError, Result};
use crate::model::Session;
use crate::types::Uuid;
use pdu::{flags1, parse_header, write_header, PType, RpcHeader, HEADER_LEN};

/// PROFINET's CM interface opnums.
pub mod opnum {
    pub const CONNECT: u16 = 0;
    pub const RELEASE: u16 = 1;
    pub const READ: u16 = 2;
    pub const WRITE: u16 = 3;
    pub const CONTROL: u16 = 4;
    pub const READ_IMPLICIT: u16 = 5;
    pub const ALARM_NOTIFY: u16 = 6;
}

/// Maximum UDP payload a single fragment is allowed to occupy; larger
/// responses are split across multiple fragments.
pub const MAX_FRAGMENT_BODY: usize = 1024;

/// A request ready for application/CM dispatch: its header, reassembled
/// body, and where to send the reply.
pub struct IncomingRequest<'a> {
    pub header: RpcHeader,
    pub body: &'a [u8],
    pub peer_addr: SocketAddr,
    pub session: Handle,
}

/// What handling one reassembled datagram produced.
pub enum DatagramOutcome {
    /// A new request, ready for CM/application dispatch.
    Request(Handle, RpcHeader, Vec<u8>),
    /// A retransmission of the last request this session already answered:
    /// the same reply frames as the original, replayed byte-for-byte rather
    /// than re-executing the request's side effects.
    Duplicate(Vec<Vec<u8>>),
}

/// What the dispatcher does with a reassembled request.
pub trait RequestHandler: Send + Sync {
    /// Handle one opnum. Returns the success body (to be wrapped in a
    /// `Response` PDU) or a `PnetError` (wrapped in a `Fault` PDU).
    fn handle(&self, opnum: u16, activity_uuid: Uuid, body: &[u8]) -> Result<Vec<u8>>;
}

/// Owns the session table and drives fragmentation/reassembly/idempotency
/// around whatever [`RequestHandler`] the connection manager registers.
pub struct RpcEngine {
    sessions: Arena<Session>,
    by_activity: std::collections::HashMap<Uuid, Handle>,
}

impl RpcEngine {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Arena::with_capacity(max_sessions),
            by_activity: std::collections::HashMap::new(),
        }
    }

    pub fn session(&self, handle: Handle) -> Option<&Session> {
        self.sessions.get(handle)
    }

    pub fn session_mut(&mut self, handle: Handle) -> Option<&mut Session> {
        self.sessions.get_mut(handle)
    }

    fn get_or_create_session(&mut self, activity_uuid: Uuid, peer_addr: SocketAddr, endian: Endian) -> Result<Handle> {
        if let Some(handle) = self.by_activity.get(&activity_uuid) {
            if self.sessions.get(*handle).is_some() {
                return Ok(*handle);
            }
        }
        let handle = self
            .sessions
            .insert(Session::new(activity_uuid, peer_addr, endian))
            .ok_or_else(PnetError::no_ar_resources)?;
        self.by_activity.insert(activity_uuid, handle);
        Ok(handle)
    }

    pub fn release_session(&mut self, handle: Handle) {
        if let Some(session) = self.sessions.get(handle) {
            self.by_activity.remove(&session.activity_uuid);
        }
        self.sessions.remove(handle);
    }

    /// Feed one received UDP datagram through header parse, reassembly and
    /// duplicate detection. Returns `Ok(Some(DatagramOutcome::Request(...)))`
    /// once a full request is ready for the caller to dispatch via a
    /// [`RequestHandler`]; `Ok(Some(DatagramOutcome::Duplicate(frames)))` when
    /// the request is a retransmission already answered from cache, carrying
    /// the exact frames to resend; `Ok(None)` for a non-final fragment
    /// (nothing to send yet).
    pub fn on_datagram(&mut self, buf: &[u8], peer_addr: SocketAddr) -> Result<Option<DatagramOutcome>> {
        let (header, frag_body) = parse_header(buf)?;
        if header.ptype != PType::Request {
            return Err(PnetError::unknown_blocks());
        }

        let handle = if header.opnum == opnum::CONNECT && header.fragment_number == 0 {
            self.get_or_create_session(header.activity_uuid, peer_addr, header.endian)?
        } else {
            *self
                .by_activity
                .get(&header.activity_uuid)
                .ok_or_else(PnetError::state_conflict)?
        };

        let session = self
            .sessions
            .get_mut(handle)
            .ok_or_else(PnetError::state_conflict)?;

        if session.is_duplicate(header.sequence_number) && header.is_last_fragment() {
            let cached = session
                .cached_response
                .as_ref()
                .expect("is_duplicate confirmed cached_response is set");
            let ptype = if cached.is_fault { PType::Fault } else { PType::Response };
            let frames = frame_response(&header, ptype, &cached.body);
            return Ok(Some(DatagramOutcome::Duplicate(frames)));
        }

        if header.fragment_number == 0 {
            session.reassembly.reset();
            session.reassembly.in_progress = true;
        }
        if header.fragment_number != session.reassembly.expected_fragment {
            session.reassembly.reset();
            return Err(PnetError::args_length_invalid());
        }
        session.reassembly.buffer.extend_from_slice(frag_body);
        session.reassembly.expected_fragment += 1;

        if !header.is_last_fragment() {
            return Ok(None);
        }

        let body = std::mem::take(&mut session.reassembly.buffer);
        session.reassembly.reset();
        Ok(Some(DatagramOutcome::Request(handle, header, body)))
    }

    /// Build and fragment a response, caching it on the session for replay
    /// on retransmission.
    pub fn build_response(
        &mut self,
        handle: Handle,
        request_header: &RpcHeader,
        result: Result<Vec<u8>>,
    ) -> Vec<Vec<u8>> {
        let (ptype, body) = match result {
            Ok(body) => (PType::Response, body),
            Err(e) => (PType::Fault, e.status().to_bytes().to_vec()),
        };

        let frames = frame_response(request_header, ptype, &body);

        if let Some(session) = self.sessions.get_mut(handle) {
            session.cache_response(request_header.sequence_number, body, ptype == PType::Fault);
        }
        frames
    }
}

/// Fragment `body` and wrap each chunk in a reply header mirroring
/// `request_header`'s identity fields (UUIDs, sequence number, opnum) —
/// shared by [`RpcEngine::build_response`] (building a fresh reply) and
/// [`RpcEngine::on_datagram`]'s duplicate branch (replaying a cached one),
/// so a retransmitted request gets byte-identical frames either way.
fn frame_response(request_header: &RpcHeader, ptype: PType, body: &[u8]) -> Vec<Vec<u8>> {
    let fragments = fragment(body, MAX_FRAGMENT_BODY);
    let n = fragments.len().max(1);
    let mut out = Vec::with_capacity(n);
    for (i, chunk) in fragments.iter().enumerate() {
        let mut flags = 0u8;
        if i == n - 1 {
            flags |= flags1::LAST_FRAG;
        }
        if n > 1 {
            flags |= pdu::flags1::FRAG;
        }
        let header = RpcHeader {
            ptype,
            flags1: flags,
            object_uuid: request_header.object_uuid,
            interface_uuid: request_header.interface_uuid,
            activity_uuid: request_header.activity_uuid,
            server_boot_time: request_header.server_boot_time,
            interface_version: request_header.interface_version,
            sequence_number: request_header.sequence_number,
            opnum: request_header.opnum,
            fragment_number: i as u16,
            auth_proto: 0,
            serial_number: request_header.serial_number,
            fragment_length: chunk.len() as u16,
            endian: request_header.endian,
        };
        let mut frame = vec![0u8; HEADER_LEN + chunk.len()];
        write_header(&mut frame, &header, chunk.len() as u16);
        frame[HEADER_LEN..].copy_from_slice(chunk);
        out.push(frame);
    }
    out
}

fn fragment(body: &[u8], max_len: usize) -> Vec<&[u8]> {
    if body.is_empty() {
        return vec![&body[..0]];
    }
    body.chunks(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:34964".parse().unwrap()
    }

    fn encode_request(activity: Uuid, opnum: u16, seq: u32, frag: u16, last: bool, body: &[u8]) -> Vec<u8> {
        let header = RpcHeader {
            ptype: PType::Request,
            flags1: if last { flags1::LAST_FRAG } else { 0 } | if frag > 0 || !last { pdu::flags1::FRAG } else { 0 },
            object_uuid: Uuid::nil(),
            interface_uuid: Uuid::nil(),
            activity_uuid: activity,
            server_boot_time: 0,
            interface_version: 1,
            sequence_number: seq,
            opnum,
            fragment_number: frag,
            auth_proto: 0,
            serial_number: 0,
            fragment_length: body.len() as u16,
            endian: Endian::Big,
        };
        let mut buf = vec![0u8; HEADER_LEN + body.len()];
        write_header(&mut buf, &header, body.len() as u16);
        buf[HEADER_LEN..].copy_from_slice(body);
        buf
    }

    fn expect_request(outcome: Option<DatagramOutcome>) -> (Handle, RpcHeader, Vec<u8>) {
        match outcome.expect("request expected") {
            DatagramOutcome::Request(handle, header, body) => (handle, header, body),
            DatagramOutcome::Duplicate(_) => panic!("expected a fresh request, got a duplicate replay"),
        }
    }

    #[test]
    fn single_fragment_request_completes_immediately() {
        let mut engine = RpcEngine::new(4);
        let activity = Uuid::parse("01020304-0506-0708-0910-111213141516").unwrap();
        let datagram = encode_request(activity, opnum::CONNECT, 1, 0, true, b"connect-body");
        let (_, _, body) = expect_request(engine.on_datagram(&datagram, addr()).unwrap());
        assert_eq!(body, b"connect-body");
    }

    #[test]
    fn multi_fragment_request_reassembles() {
        let mut engine = RpcEngine::new(4);
        let activity = Uuid::parse("01020304-0506-0708-0910-111213141516").unwrap();
        let first = encode_request(activity, opnum::CONNECT, 1, 0, false, b"part1-");
        assert!(engine.on_datagram(&first, addr()).unwrap().is_none());
        let second = encode_request(activity, opnum::CONNECT, 1, 1, true, b"part2");
        let (_, _, body) = expect_request(engine.on_datagram(&second, addr()).unwrap());
        assert_eq!(body, b"part1-part2");
    }

    #[test]
    fn retransmitted_request_replays_the_original_response_bytes() {
        let mut engine = RpcEngine::new(4);
        let activity = Uuid::parse("01020304-0506-0708-0910-111213141516").unwrap();
        let datagram = encode_request(activity, opnum::CONNECT, 1, 0, true, b"connect-body");
        let (handle, header, _) = expect_request(engine.on_datagram(&datagram, addr()).unwrap());
        let original = engine.build_response(handle, &header, Ok(b"reply".to_vec()));

        // same sequence number retransmitted: same reply, not re-dispatched
        let outcome = engine.on_datagram(&datagram, addr()).unwrap().unwrap();
        match outcome {
            DatagramOutcome::Duplicate(frames) => assert_eq!(frames, original),
            DatagramOutcome::Request(..) => panic!("duplicate was re-dispatched as a fresh request"),
        }
    }

    #[test]
    fn response_larger_than_max_fragment_splits() {
        let mut engine = RpcEngine::new(4);
        let activity = Uuid::parse("01020304-0506-0708-0910-111213141516").unwrap();
        let datagram = encode_request(activity, opnum::CONNECT, 1, 0, true, b"req");
        let (handle, header, _) = expect_request(engine.on_datagram(&datagram, addr()).unwrap());
        let big = vec![0xAB; MAX_FRAGMENT_BODY * 2 + 10];
        let frames = engine.build_response(handle, &header, Ok(big));
        assert_eq!(frames.len(), 3);
    }
}
