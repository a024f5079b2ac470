// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame reception and dispatch.

pub mod demux;

pub use demux::{FrameDemux, FrameHandler};
