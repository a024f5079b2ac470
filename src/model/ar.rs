// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Application Relation (AR) — one per connected controller.

use crate::core::rt::Handle;
use crate::error::PnioStatus;
use crate::types::{Mac, Uuid};

/// CMDEV device-state ordering. Only the transitions listed
/// in [`CmdevState::can_transition_to`] are legal; anything else aborts the
/// AR with `state_conflict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdevState {
    PowerOn,
    WConnect,
    WCInd,
    WPDev,
    WArdy,
    WArdyCnf,
    Data,
    Abort,
}

impl CmdevState {
    /// The device-state transition table. `Abort` is reachable from every
    /// state (any illegal event aborts the AR); `PowerOn` is reachable only
    /// from `Abort` (teardown completing).
    pub fn can_transition_to(self, next: CmdevState) -> bool {
        use CmdevState::*;
        matches!(
            (self, next),
            (PowerOn, WConnect)
                | (WConnect, WCInd)
                | (WCInd, WPDev)
                | (WPDev, WArdy)
                | (WArdy, WArdyCnf)
                | (WArdyCnf, Data)
                | (Data, WArdy) // re-parameterization while running
                | (_, Abort)
                | (Abort, PowerOn)
        )
    }
}

/// Parsed `AlarmCRBlockReq`. The device mirrors `local_alarm_reference` and
/// `max_alarm_data_length` back in its `AlarmCRBlockRes`.
#[derive(Debug, Clone, Copy)]
pub struct AlarmCrRequest {
    pub alarm_cr_type: u16,
    pub local_alarm_reference: u16,
    pub max_alarm_data_length: u16,
}

/// AR properties negotiated at Connect.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArProperties {
    pub device_access: bool,
    pub pull_module_alarm_allowed: bool,
    /// `true` for a supervisor/startup AR with fast parameterization.
    pub startup_mode_advanced: bool,
}

/// One connected controller and everything it owns.
pub struct ApplicationRelation {
    pub ar_uuid: Uuid,
    pub session_key: u16,
    pub properties: ArProperties,
    pub initiator_mac: Mac,
    pub initiator_station_name: String,
    pub initiator_uuid: Uuid,
    pub state: CmdevState,
    pub error: Option<PnioStatus>,

    /// The RPC session carrying this AR's Connect/Release/DControl/Read/Write
    /// traffic.
    pub session: Handle,
    /// This AR's IOCRs.
    pub iocrs: Vec<Handle>,
    /// Expected (slot, subslot, submodule_id) inventory as requested by the
    /// controller at Connect.
    pub expected_submodules: Vec<(u16, u16, u32)>,

    /// The controller's AlarmCR request, if one was included at Connect.
    pub alarm_cr: Option<AlarmCrRequest>,
}

impl ApplicationRelation {
    pub fn new(
        ar_uuid: Uuid,
        session_key: u16,
        initiator_mac: Mac,
        initiator_station_name: String,
        initiator_uuid: Uuid,
        properties: ArProperties,
        session: Handle,
    ) -> Self {
        Self {
            ar_uuid,
            session_key,
            properties,
            initiator_mac,
            initiator_station_name,
            initiator_uuid,
            state: CmdevState::PowerOn,
            error: None,
            session,
            iocrs: Vec::new(),
            expected_submodules: Vec::new(),
            alarm_cr: None,
        }
    }

    /// Drive the device state machine one step. Returns `false` (and sets
    /// `error`) if `next` is not a legal transition from the current state;
    /// the caller is then responsible for aborting the AR.
    pub fn transition(&mut self, next: CmdevState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self.state, CmdevState::Data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        use CmdevState::*;
        let mut ar = ApplicationRelation::new(
            Uuid::nil(),
            1,
            [0; 6],
            String::new(),
            Uuid::nil(),
            ArProperties::default(),
            Handle { index: 0, generation: 0 },
        );
        assert!(ar.transition(WConnect));
        assert!(ar.transition(WCInd));
        assert!(ar.transition(WPDev));
        assert!(ar.transition(WArdy));
        assert!(ar.transition(WArdyCnf));
        assert!(ar.transition(Data));
        assert!(ar.is_data());
    }

    #[test]
    fn illegal_transition_is_rejected() {
        use CmdevState::*;
        let mut ar = ApplicationRelation::new(
            Uuid::nil(),
            1,
            [0; 6],
            String::new(),
            Uuid::nil(),
            ArProperties::default(),
            Handle { index: 0, generation: 0 },
        );
        // Cannot jump straight to Data from PowerOn.
        assert!(!ar.transition(Data));
        assert_eq!(ar.state, PowerOn);
    }

    #[test]
    fn abort_reachable_from_any_state() {
        use CmdevState::*;
        for state in [PowerOn, WConnect, WCInd, WPDev, WArdy, WArdyCnf, Data] {
            assert!(state.can_transition_to(Abort));
        }
    }
}
