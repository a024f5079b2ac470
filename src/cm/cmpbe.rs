// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CMPBE: the parameterization-end handshake.
//!
//! After Connect, the controller writes all parameter records then sends a
//! `DControl(PrmEnd)` request. The device applies pending parameters,
//! answers with `+Response`, and waits for the controller's
//! `CControl(AppReady)` acyclic request before moving the AR into `Data`.

use crate::cm::cmdev;
use crate::error::{PnetError, Result};
use crate::model::{ApplicationRelation, CmdevState};

/// Device-side reaction to `DControl(PrmEnd)`. Only legal once the AR has
/// reached `WPDev` (all expected submodules plugged).
pub fn on_prm_end(ar: &mut ApplicationRelation) -> Result<()> {
    if ar.state != CmdevState::WPDev {
        return Err(PnetError::state_conflict());
    }
    if !cmdev::drive(ar, CmdevState::WArdy, PnetError::state_conflict().status()) {
        return Err(PnetError::state_conflict());
    }
    Ok(())
}

/// Device-side reaction to the controller's `CControl(AppReady)`. Moves the
/// AR into `Data` once the device itself is also ready (submodules report
/// their IOPS as GOOD, checked by the caller before invoking this).
pub fn on_app_ready_confirmed(ar: &mut ApplicationRelation) -> Result<()> {
    if ar.state != CmdevState::WArdy {
        return Err(PnetError::state_conflict());
    }
    cmdev::drive(ar, CmdevState::WArdyCnf, PnetError::state_conflict().status());
    if !cmdev::drive(ar, CmdevState::Data, PnetError::state_conflict().status()) {
        return Err(PnetError::state_conflict());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rt::Handle;
    use crate::model::ArProperties;
    use crate::types::Uuid;

    fn ar_in(state: CmdevState) -> ApplicationRelation {
        let mut ar = ApplicationRelation::new(
            Uuid::nil(),
            1,
            [0; 6],
            String::new(),
            Uuid::nil(),
            ArProperties::default(),
            Handle { index: 0, generation: 0 },
        );
        ar.state = state;
        ar
    }

    #[test]
    fn prm_end_requires_wpdev() {
        let mut ar = ar_in(CmdevState::WConnect);
        assert!(on_prm_end(&mut ar).is_err());
        let mut ar = ar_in(CmdevState::WPDev);
        assert!(on_prm_end(&mut ar).is_ok());
        assert_eq!(ar.state, CmdevState::WArdy);
    }

    #[test]
    fn app_ready_moves_ar_to_data() {
        let mut ar = ar_in(CmdevState::WArdy);
        assert!(on_app_ready_confirmed(&mut ar).is_ok());
        assert_eq!(ar.state, CmdevState::Data);
    }
}
