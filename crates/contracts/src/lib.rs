//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Every timestamp is `f64` seconds on the monotonic session clock ([`SessionClock`])
//! - Configuration durations are milliseconds and converted at the edge

mod adaptation_config;
mod blueprint;
mod device;
mod error;
mod frame;
mod frame_source;
mod performance;
mod quality;
mod sink;
mod sync;
mod sync_engine_config;
mod time;

pub use adaptation_config::*;
pub use blueprint::*;
pub use device::{ResourceProbe, SharedClockDevice};
pub use error::*;
pub use frame::*;
pub use frame_source::{FrameCallback, FrameSource};
pub use performance::*;
pub use quality::*;
pub use sink::*;
pub use sync::*;
pub use sync_engine_config::*;
pub use time::{SessionClock, duration_from_ms};
