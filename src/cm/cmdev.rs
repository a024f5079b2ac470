// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CMDEV: strict device-state ordering for one AR.
//!
//! This is a thin driver over [`ApplicationRelation::transition`] that adds
//! the logging and abort-reason bookkeeping every caller needs, so CMRPC,
//! CMPBE and the cyclic engine all go through the same choke point instead
//! of poking `ar.state` directly.

use crate::error::PnioStatus;
use crate::model::{ApplicationRelation, CmdevState};

/// Attempt to move `ar` to `next`. On success, logs the transition. On
/// failure, aborts the AR (sets `state = Abort`, records `reason`) and
/// returns `false` — the caller is then responsible for releasing RPC/IOCR
/// resources and notifying the application via `release_ind`.
pub fn drive(ar: &mut ApplicationRelation, next: CmdevState, reason_on_failure: PnioStatus) -> bool {
    let from = ar.state;
    if ar.transition(next) {
        log::debug!("[cmdev] AR {} {:?} -> {:?}", ar.ar_uuid, from, next);
        true
    } else {
        log::warn!(
            "[cmdev] AR {} illegal transition {:?} -> {:?}, aborting",
            ar.ar_uuid,
            from,
            next
        );
        ar.error = Some(reason_on_failure);
        ar.state = CmdevState::Abort;
        false
    }
}

/// Unconditionally abort `ar`, e.g. on a watchdog expiry or transport-fatal
/// error rather than an illegal request.
pub fn abort(ar: &mut ApplicationRelation, reason: PnioStatus) {
    log::warn!("[cmdev] AR {} aborted: {:?}", ar.ar_uuid, reason);
    ar.error = Some(reason);
    ar.state = CmdevState::Abort;
}
