//! Core types for the GoodWheel monitoring core
//!
//! This module defines the raw samples pushed in by sensor adapters, the
//! driving-behavior events produced by the monitors, and the session-level
//! counters and summary read back by the shell.

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Three-axis reading as reported by a sensor adapter (x/y/z in JSON).
///
/// Acceleration is in m/s², rotation rate in deg/s. Arithmetic happens on
/// [`Vector3`]; this type only carries readings across the boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The reading as a vector, or `None` if any axis is non-finite
    pub fn finite(self) -> Option<Vector3<f64>> {
        let v = Vector3::<f64>::from(self);
        v.iter().all(|c| c.is_finite()).then_some(v)
    }

    /// The reading as a vector with non-finite axes replaced by zero
    pub fn sanitized(self) -> Vector3<f64> {
        Vector3::<f64>::from(self).map(|c| if c.is_finite() { c } else { 0.0 })
    }
}

impl From<Vec3> for Vector3<f64> {
    fn from(v: Vec3) -> Self {
        Vector3::new(v.x, v.y, v.z)
    }
}

impl From<Vector3<f64>> for Vec3 {
    fn from(v: Vector3<f64>) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// One accelerometer + gyroscope reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Raw acceleration including gravity (m/s²); `None` when the sensor
    /// delivered no reading
    #[serde(default)]
    pub acceleration_including_gravity: Option<Vec3>,
    /// Rotation rate around the alpha/beta/gamma axes (deg/s), stored as x/y/z
    #[serde(default)]
    pub rotation_rate: Vec3,
    /// Sample timestamp
    pub timestamp: DateTime<Utc>,
}

impl MotionSample {
    pub fn new(
        acceleration_including_gravity: Vec3,
        rotation_rate: Vec3,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::from_parts(Some(acceleration_including_gravity), Some(rotation_rate), timestamp)
    }

    /// Build a sample from adapter readings where either field may be absent.
    /// A missing rotation rate reads as zero on all three axes.
    pub fn from_parts(
        acceleration_including_gravity: Option<Vec3>,
        rotation_rate: Option<Vec3>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            acceleration_including_gravity,
            rotation_rate: rotation_rate.unwrap_or_default(),
            timestamp,
        }
    }
}

/// One GPS fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub lat: f64,
    pub lng: f64,
    /// Ground speed in m/s, if the receiver reported one
    #[serde(default)]
    pub speed_mps: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// One camera inference result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSample {
    pub face_present: bool,
    pub timestamp: DateTime<Utc>,
}

/// Discriminant of [`Event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    SpeedExceeded,
    HarshAccelBrake,
    Bump,
    SharpTurn,
    Distraction,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SpeedExceeded => "SPEED_EXCEEDED",
            EventKind::HarshAccelBrake => "HARSH_ACCEL_BRAKE",
            EventKind::Bump => "BUMP",
            EventKind::SharpTurn => "SHARP_TURN",
            EventKind::Distraction => "DISTRACTION",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A driving-behavior event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    SpeedExceeded { speed_kmh: f64, lat: f64, lng: f64 },
    /// Horizontal (drive-axis) linear acceleration, m/s²
    HarshAccelBrake { magnitude: f64 },
    /// Vertical (gravity-axis) linear acceleration, m/s²
    Bump { magnitude: f64 },
    SharpTurn { deg_per_s: f64 },
    Distraction,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::SpeedExceeded { .. } => EventKind::SpeedExceeded,
            Event::HarshAccelBrake { .. } => EventKind::HarshAccelBrake,
            Event::Bump { .. } => EventKind::Bump,
            Event::SharpTurn { .. } => EventKind::SharpTurn,
            Event::Distraction => EventKind::Distraction,
        }
    }
}

/// An emitted event tagged with its session and emission time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

/// Per-kind event counters for the current session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub speed_exceeded_count: u32,
    pub harsh_count: u32,
    pub bump_count: u32,
    pub turn_count: u32,
    pub distraction_count: u32,
}

impl Counters {
    pub fn get(&self, kind: EventKind) -> u32 {
        match kind {
            EventKind::SpeedExceeded => self.speed_exceeded_count,
            EventKind::HarshAccelBrake => self.harsh_count,
            EventKind::Bump => self.bump_count,
            EventKind::SharpTurn => self.turn_count,
            EventKind::Distraction => self.distraction_count,
        }
    }

    pub fn total(&self) -> u32 {
        self.speed_exceeded_count
            + self.harsh_count
            + self.bump_count
            + self.turn_count
            + self.distraction_count
    }
}

/// Monitoring session state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Running,
}

/// Sensor feeding the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Motion,
    Position,
    Camera,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Motion => "motion",
            SensorKind::Position => "position",
            SensorKind::Camera => "camera",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a sensor adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorFault {
    #[error("permission denied for {0} sensor")]
    PermissionDenied(SensorKind),

    #[error("no position fix available")]
    NoFix,

    #[error("position request timed out")]
    Timeout,

    #[error("{sensor} sensor unavailable: {reason}")]
    Unavailable { sensor: SensorKind, reason: String },
}

/// Snapshot of a session for display or export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Identifier of the current (or last) session, if one was ever started
    pub session_id: Option<Uuid>,
    pub state: SessionState,
    pub counters: Counters,
    /// Instantaneous speed from the last fix (km/h)
    pub current_speed_kmh: f64,
    /// Last known `(lat, lng)`
    pub coordinates: Option<(f64, f64)>,
    /// Number of events emitted this session
    pub events_emitted: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}
