// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Application callback interface.
//!
//! The embedding application implements [`Application`] to react to
//! connection lifecycle events, acyclic read/write, and incoming cyclic
//! data; the stack never assumes any particular process-image
//! representation.

use crate::core::rt::Handle;
use crate::error::PnetError;
use crate::types::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedSignal {
    Off,
    Flash,
    SteadyOn,
}

/// Callbacks the connection manager, record-access and cyclic engine invoke
/// as protocol events occur. Every `_ind` (indication) is fire-and-forget;
/// every `_cnf`/fallible hook returns a `Result` the caller folds into the
/// PROFINET response status.
pub trait Application: Send + Sync {
    fn connect_ind(&self, ar: Handle, ar_uuid: Uuid);
    fn release_ind(&self, ar: Handle, ar_uuid: Uuid);
    fn dcontrol_ind(&self, ar: Handle) -> Result<(), PnetError>;
    fn ccontrol_cnf(&self, ar: Handle);
    fn state_ind(&self, ar: Handle, data: bool);
    fn read_ind(&self, index: u16, slot: u16, subslot: u16) -> Result<Vec<u8>, PnetError>;
    fn write_ind(&self, index: u16, slot: u16, subslot: u16, data: &[u8]) -> Result<(), PnetError>;
    fn new_data_ind(&self, iocr: Handle, data: &[u8]);
    fn reset_ind(&self, factory_reset: bool);
    fn signal_led_ind(&self, signal: LedSignal);
    fn exp_module_ind(&self, slot: u16, module_ident_number: u32) -> bool;
    fn exp_submodule_ind(&self, slot: u16, subslot: u16, submodule_ident_number: u32) -> bool;
}

#[cfg(test)]
pub mod test_double {
    use super::*;
    use parking_lot::Mutex;

    /// No-op [`Application`] that records which callbacks fired, for use in
    /// connection-manager/cyclic-engine unit tests that don't care about
    /// application semantics.
    #[derive(Default)]
    pub struct RecordingApplication {
        pub events: Mutex<Vec<String>>,
    }

    impl Application for RecordingApplication {
        fn connect_ind(&self, _ar: Handle, _ar_uuid: Uuid) {
            self.events.lock().push("connect_ind".into());
        }
        fn release_ind(&self, _ar: Handle, _ar_uuid: Uuid) {
            self.events.lock().push("release_ind".into());
        }
        fn dcontrol_ind(&self, _ar: Handle) -> Result<(), PnetError> {
            self.events.lock().push("dcontrol_ind".into());
            Ok(())
        }
        fn ccontrol_cnf(&self, _ar: Handle) {
            self.events.lock().push("ccontrol_cnf".into());
        }
        fn state_ind(&self, _ar: Handle, _data: bool) {
            self.events.lock().push("state_ind".into());
        }
        fn read_ind(&self, _index: u16, _slot: u16, _subslot: u16) -> Result<Vec<u8>, PnetError> {
            Ok(Vec::new())
        }
        fn write_ind(&self, _index: u16, _slot: u16, _subslot: u16, _data: &[u8]) -> Result<(), PnetError> {
            Ok(())
        }
        fn new_data_ind(&self, _iocr: Handle, _data: &[u8]) {
            self.events.lock().push("new_data_ind".into());
        }
        fn reset_ind(&self, _factory_reset: bool) {
            self.events.lock().push("reset_ind".into());
        }
        fn signal_led_ind(&self, _signal: LedSignal) {
            self.events.lock().push("signal_led_ind".into());
        }
        fn exp_module_ind(&self, _slot: u16, _module_ident_number: u32) -> bool {
            true
        }
        fn exp_submodule_ind(&self, _slot: u16, _subslot: u16, _submodule_ident_number: u32) -> bool {
            true
        }
    }

    #[test]
    fn recording_application_tracks_calls() {
        let app = RecordingApplication::default();
        app.connect_ind(Handle { index: 0, generation: 0 }, Uuid::nil());
        app.release_ind(Handle { index: 0, generation: 0 }, Uuid::nil());
        assert_eq!(app.events.lock().len(), 2);
    }
}
