// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Connection Manager and record access.
//!
//! `cmrpc` turns Connect/Release RPC bodies into AR table mutations;
//! `cmdev` is the strict device-state ordering every AR must follow;
//! `cmpbe` handles the PrmEnd/AppReady handshake; `module_diff` compares a
//! Connect request's expected plug-in list against actual topology;
//! `record_access` answers acyclic IODRead/IODWrite requests, including
//! WriteMultiple sub-transactions and per-subslot diagnosis/module-diff reads.

pub mod cmdev;
pub mod cmpbe;
pub mod cmrpc;
pub mod module_diff;
pub mod record_access;

use crate::core::rt::arena::{Arena, Handle};
use crate::model::{ApplicationRelation, Iocr};
use crate::types::Uuid;

/// Owns every connected AR and the IOCRs they negotiated. One per
/// [`crate::stack::StackInstance`].
pub struct ConnectionManager {
    pub ars: Arena<ApplicationRelation>,
    pub iocrs: Arena<Iocr>,
}

impl ConnectionManager {
    pub fn new(max_ars: usize, max_iocrs: usize) -> Self {
        Self {
            ars: Arena::with_capacity(max_ars),
            iocrs: Arena::with_capacity(max_iocrs),
        }
    }

    pub fn find_by_ar_uuid(&self, ar_uuid: Uuid) -> Option<Handle> {
        self.ars.find(|ar| ar.ar_uuid == ar_uuid)
    }

    /// Release an AR and every IOCR it owns.
    pub fn release_ar(&mut self, handle: Handle) -> Option<ApplicationRelation> {
        let ar = self.ars.remove(handle)?;
        for iocr_handle in &ar.iocrs {
            self.iocrs.remove(*iocr_handle);
        }
        Some(ar)
    }
}
