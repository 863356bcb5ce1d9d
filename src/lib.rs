//! GoodWheel Core - On-device driving-behavior event engine
//!
//! The core turns three independent raw sensor streams into discrete,
//! rate-limited driving events:
//!
//! - **Motion**: accelerometer + gyroscope samples → bumps, harsh accel/brake, sharp turns
//! - **Position**: GPS fixes → speeding
//! - **Camera**: per-frame "face present" flags → driver distraction
//!
//! A [`DriveSession`] owns the running/idle state and routes samples into the
//! monitors. All timing comes from the timestamps on the samples, so the core
//! never reads a clock and replays deterministically.

pub mod config;
pub mod distraction;
pub mod error;
pub mod motion;
pub mod session;
pub mod speed;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{DistractionConfig, MotionConfig, SessionConfig, SpeedConfig};
pub use distraction::DistractionMonitor;
pub use error::MonitorError;
pub use motion::MotionClassifier;
pub use session::{DriveSession, EventSink};
pub use speed::SpeedMonitor;
pub use types::{
    Counters, Event, EventKind, EventRecord, FrameSample, MotionSample, PositionSample,
    SensorFault, SensorKind, SessionState, SessionSummary, Vec3,
};
