//! Motion fusion classifier
//!
//! Separates gravity from the raw accelerometer reading with a first-order
//! low-pass filter, splits the remaining linear acceleration into a component
//! along gravity (road shocks) and one orthogonal to it (drive forces), and
//! checks the rotation rate for sharp turns.
//!
//! All three event kinds share one cooldown timer. Within a sample the checks
//! run in a fixed order: vertical (bump), then horizontal (harsh accel/brake),
//! then rotation (sharp turn). An event fired earlier in the order restarts the
//! cooldown, so later checks in the same sample are suppressed.

use chrono::{DateTime, Duration, Utc};
use nalgebra::Vector3;

use crate::config::MotionConfig;
use crate::types::{Event, MotionSample};

/// Minimum gravity magnitude (m/s²) before its direction is trusted
const MIN_GRAVITY_NORM: f64 = 1.0;

/// Linear acceleration split relative to the gravity direction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ForceComponents {
    /// Magnitude along gravity (m/s²)
    pub vertical: f64,
    /// Magnitude orthogonal to gravity (m/s²)
    pub horizontal: f64,
}

/// Split `linear` into components parallel and orthogonal to `gravity`.
///
/// Returns zeros when the gravity estimate is too small to give a direction.
pub fn decompose(linear: &Vector3<f64>, gravity: &Vector3<f64>) -> ForceComponents {
    let g_norm = gravity.norm();
    if g_norm <= MIN_GRAVITY_NORM {
        return ForceComponents::default();
    }

    let g_dir = gravity / g_norm;
    let vertical = linear.dot(&g_dir).abs();
    let horizontal = (linear.norm_squared() - vertical * vertical).max(0.0).sqrt();

    ForceComponents {
        vertical,
        horizontal,
    }
}

/// One step of the gravity filter: `alpha·previous + (1 − alpha)·raw`
pub fn low_pass(previous: &Vector3<f64>, raw: &Vector3<f64>, alpha: f64) -> Vector3<f64> {
    previous * alpha + raw * (1.0 - alpha)
}

/// Stateful classifier for one monitoring session
#[derive(Debug, Clone)]
pub struct MotionClassifier {
    config: MotionConfig,
    /// Low-pass gravity estimate; seeded from the first acceleration reading
    gravity: Option<Vector3<f64>>,
    /// Last emission of any motion event
    last_event_time: Option<DateTime<Utc>>,
    harsh_count: u32,
    bump_count: u32,
    turn_count: u32,
}

impl Default for MotionClassifier {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

impl MotionClassifier {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            gravity: None,
            last_event_time: None,
            harsh_count: 0,
            bump_count: 0,
            turn_count: 0,
        }
    }

    /// Current gravity estimate, if an acceleration reading has been seen
    /// this session
    pub fn gravity(&self) -> Option<Vector3<f64>> {
        self.gravity
    }

    pub fn harsh_count(&self) -> u32 {
        self.harsh_count
    }

    pub fn bump_count(&self) -> u32 {
        self.bump_count
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    /// Clear the gravity estimate, cooldown and counters
    pub fn reset(&mut self) {
        self.gravity = None;
        self.last_event_time = None;
        self.harsh_count = 0;
        self.bump_count = 0;
        self.turn_count = 0;
    }

    /// Process one sample and return the events it produced, in emission order.
    ///
    /// A sample without a usable acceleration reading (absent, or any axis
    /// non-finite) leaves the gravity estimate untouched and contributes no
    /// linear force; its rotation rate is still checked.
    pub fn on_sample(&mut self, sample: &MotionSample) -> Vec<Event> {
        let now = sample.timestamp;
        let rotation = sample.rotation_rate.sanitized();

        let forces = match sample
            .acceleration_including_gravity
            .and_then(|accel| accel.finite())
        {
            Some(raw) => {
                let gravity = self.update_gravity(&raw);
                decompose(&(raw - gravity), &gravity)
            }
            None => ForceComponents::default(),
        };

        let mut events = Vec::new();

        if self.cooldown_elapsed(now) {
            if forces.vertical > self.config.bump_threshold {
                self.bump_count += 1;
                self.last_event_time = Some(now);
                events.push(Event::Bump {
                    magnitude: forces.vertical,
                });
            } else if forces.horizontal > self.config.accel_threshold {
                self.harsh_count += 1;
                self.last_event_time = Some(now);
                events.push(Event::HarshAccelBrake {
                    magnitude: forces.horizontal,
                });
            }
        }

        let max_rotation = rotation.amax();
        if max_rotation > self.config.turn_threshold && self.cooldown_elapsed(now) {
            self.turn_count += 1;
            self.last_event_time = Some(now);
            events.push(Event::SharpTurn {
                deg_per_s: max_rotation,
            });
        }

        events
    }

    fn update_gravity(&mut self, raw: &Vector3<f64>) -> Vector3<f64> {
        let next = match &self.gravity {
            Some(previous) => low_pass(previous, raw, self.config.gravity_alpha),
            None => *raw,
        };
        self.gravity = Some(next);
        next
    }

    fn cooldown_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.last_event_time {
            Some(last) => now - last > Duration::milliseconds(self.config.motion_cooldown_ms),
            None => true,
        }
    }
}
