// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ethernet frame demultiplexing and fanout.
//!
//! Every received Ethernet frame is dispatched by its PROFINET `FrameID` (for
//! `EtherType 0x8892` cyclic/RT frames) or by raw `EtherType` (for DCP/LLDP,
//! which don't carry a FrameID at this layer) to whichever component
//! registered a handler for it. One handler per key; registering again
//! replaces the previous one, matching how a single CPM/PPM owns its FrameID
//! for the lifetime of its IOCR.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

/// Handler invoked with a frame's payload (everything after the demuxed
/// key) and the receive timestamp in the caller's monotonic clock.
pub trait FrameHandler: Send + Sync {
    fn on_frame(&self, now_us: u64, payload: &[u8]);
}

impl<F> FrameHandler for F
where
    F: Fn(u64, &[u8]) + Send + Sync,
{
    fn on_frame(&self, now_us: u64, payload: &[u8]) {
        (self)(now_us, payload)
    }
}

/// Keyed dispatch table: FrameID-based routing for RT frames, EtherType-based
/// for DCP/LLDP.
#[derive(Default)]
pub struct FrameDemux {
    by_frame_id: RwLock<HashMap<u16, Arc<dyn FrameHandler>>>,
    by_ethertype: RwLock<HashMap<u16, Arc<dyn FrameHandler>>>,
}

impl FrameDemux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_frame_id(&self, frame_id: u16, handler: Arc<dyn FrameHandler>) {
        self.by_frame_id.write().insert(frame_id, handler);
    }

    pub fn unregister_frame_id(&self, frame_id: u16) {
        self.by_frame_id.write().remove(&frame_id);
    }

    pub fn register_ethertype(&self, ethertype: u16, handler: Arc<dyn FrameHandler>) {
        self.by_ethertype.write().insert(ethertype, handler);
    }

    /// Dispatch a frame already identified as carrying a FrameID (i.e.
    /// EtherType `0x8892` profinet RT). Returns `true` if a handler existed.
    pub fn dispatch_frame_id(&self, frame_id: u16, now_us: u64, payload: &[u8]) -> bool {
        let table = self.by_frame_id.read();
        match table.get(&frame_id) {
            Some(handler) => {
                dispatch_with_panic_isolation(handler.as_ref(), now_us, payload, "frame_id", frame_id as u32);
                true
            }
            None => {
                log::debug!("[demux] dropped frame: no handler for frame_id={frame_id:#06x}");
                false
            }
        }
    }

    /// Dispatch by raw EtherType (DCP `0x8892`-without-frame-id path is not
    /// used in PROFINET, but LLDP `0x88CC` and DCP's own discovery EtherType
    /// both key off EtherType directly).
    pub fn dispatch_ethertype(&self, ethertype: u16, now_us: u64, payload: &[u8]) -> bool {
        let table = self.by_ethertype.read();
        match table.get(&ethertype) {
            Some(handler) => {
                dispatch_with_panic_isolation(handler.as_ref(), now_us, payload, "ethertype", ethertype as u32);
                true
            }
            None => {
                log::debug!("[demux] dropped frame: no handler for ethertype={ethertype:#06x}");
                false
            }
        }
    }
}

fn dispatch_with_panic_isolation(
    handler: &dyn FrameHandler,
    now_us: u64,
    payload: &[u8],
    key_kind: &str,
    key: u32,
) {
    let result = catch_unwind(AssertUnwindSafe(|| handler.on_frame(now_us, payload)));
    if result.is_err() {
        log::debug!("[demux] handler panicked for {key_kind}={key:#06x}, frame dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_routes_to_registered_frame_id() {
        let demux = FrameDemux::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        demux.register_frame_id(
            0xC000,
            Arc::new(move |_now, payload: &[u8]| {
                assert_eq!(payload, b"hi");
                count2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(demux.dispatch_frame_id(0xC000, 0, b"hi"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_unknown_frame_id_is_dropped_not_panicking() {
        let demux = FrameDemux::new();
        assert!(!demux.dispatch_frame_id(0x1234, 0, b"x"));
    }

    #[test]
    fn handler_panic_is_isolated() {
        let demux = FrameDemux::new();
        demux.register_frame_id(1, Arc::new(|_now, _payload: &[u8]| panic!("boom")));
        // Must not propagate the panic to the caller.
        assert!(demux.dispatch_frame_id(1, 0, b""));
    }

    #[test]
    fn reregistering_frame_id_replaces_handler() {
        let demux = FrameDemux::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        demux.register_frame_id(1, Arc::new(move |_now, _p: &[u8]| { c1.fetch_add(1, Ordering::SeqCst); }));
        let c2 = count.clone();
        demux.register_frame_id(1, Arc::new(move |_now, _p: &[u8]| { c2.fetch_add(10, Ordering::SeqCst); }));
        demux.dispatch_frame_id(1, 0, b"");
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }
}
