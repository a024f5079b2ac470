// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The data model: Application Relations, RPC sessions, IO
//! Communication Relations and the device's slot/subslot topology.
//!
//! Everything here is owned by [`crate::stack::StackInstance`] and addressed
//! by [`crate::core::rt::Handle`] rather than by pointer — see
//! `DESIGN.md` / "Cyclic graphs".

pub mod ar;
pub mod iocr;
pub mod session;
pub mod topology;

pub use ar::{AlarmCrRequest, ApplicationRelation, ArProperties, CmdevState};
pub use iocr::{Iocr, IocrDirection, IoDataObject};
pub use session::Session;
pub use topology::{ChannelDirection, ChannelProperties, DiagItem, DiagKind, Severity, Slot, Subslot};
