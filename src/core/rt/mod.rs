// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime primitives: the generation-checked slot arena and the
//! cooperative scheduler.

pub mod arena;
pub mod sched;

pub use arena::{Arena, Handle};
pub use sched::{Scheduler, TimerHandle};
