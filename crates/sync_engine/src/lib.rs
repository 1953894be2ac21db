//! # Sync Engine
//!
//! Dual-stream frame synchronization.
//!
//! Responsibilities:
//! - Per-stream bounded buffers ordered by capture timestamp
//! - Drift-compensated pair selection within a sync window
//! - Hardware shared clock calibration with software fallback
//! - Bounded pair output with drop-oldest overflow
//!
//! ## Usage
//!
//! ```ignore
//! use sync_engine::{select_clock, FrameSyncCoordinator, SyncHandle};
//!
//! let clock = select_clock(&blueprint.clock, device)?;
//! let coordinator = FrameSyncCoordinator::new(blueprint.sync.clone(), clock)?;
//! let mut handle = SyncHandle::spawn(coordinator, SessionClock::new(), cancel.child_token());
//!
//! front_camera.listen(handle.frame_callback());
//! back_camera.listen(handle.frame_callback());
//!
//! while let Some(pair) = handle.pairs().recv().await {
//!     render(pair);
//! }
//! ```

mod buffer;
mod clock;
mod coordinator;
mod drift;
mod output;
mod runtime;

pub use buffer::{PushOutcome, StreamBuffer};
pub use clock::{
    select_clock, validate_target_latency, ClockSynchronizer, HardwareClockSync,
    SoftwareClockSync,
};
pub use coordinator::{CoordinatorState, FrameSyncCoordinator, SyncDiagnostics};
pub use drift::DriftEstimator;
pub use output::{PairOutput, PairReceiver};
pub use runtime::SyncHandle;

// Re-export contracts types
pub use contracts::{
    ClockConfig, ClockReport, DriftState, SyncCoordinatorConfig, SyncEvent, SyncQuality,
    SyncStatistics, SynchronizedPair,
};
