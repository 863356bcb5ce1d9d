//! Speed monitor
//!
//! Converts GPS ground speed to km/h, exposes it for display, and emits a
//! speeding event when the limit is exceeded and the cooldown has passed.

use chrono::{DateTime, Utc};

use crate::config::SpeedConfig;
use crate::types::{Event, PositionSample};

const MPS_TO_KMH: f64 = 3.6;

/// Stateful speed monitor for one monitoring session
#[derive(Debug, Clone)]
pub struct SpeedMonitor {
    config: SpeedConfig,
    last_speed_event_time: Option<DateTime<Utc>>,
    current_speed_kmh: f64,
    coordinates: Option<(f64, f64)>,
    speed_exceeded_count: u32,
}

impl Default for SpeedMonitor {
    fn default() -> Self {
        Self::new(SpeedConfig::default())
    }
}

impl SpeedMonitor {
    pub fn new(config: SpeedConfig) -> Self {
        Self {
            config,
            last_speed_event_time: None,
            current_speed_kmh: 0.0,
            coordinates: None,
            speed_exceeded_count: 0,
        }
    }

    /// Speed from the most recent fix (km/h), not gated by the cooldown
    pub fn current_speed_kmh(&self) -> f64 {
        self.current_speed_kmh
    }

    /// `(lat, lng)` of the most recent fix
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.coordinates
    }

    pub fn speed_exceeded_count(&self) -> u32 {
        self.speed_exceeded_count
    }

    /// Clear the displayed speed and position, keeping counters and cooldown
    pub fn clear_reading(&mut self) {
        self.current_speed_kmh = 0.0;
        self.coordinates = None;
    }

    /// Clear everything for a new session
    pub fn reset(&mut self) {
        self.clear_reading();
        self.last_speed_event_time = None;
        self.speed_exceeded_count = 0;
    }

    /// Process one GPS fix
    pub fn on_sample(&mut self, sample: &PositionSample) -> Option<Event> {
        let speed_mps = sample
            .speed_mps
            .filter(|speed| speed.is_finite())
            .unwrap_or(0.0);
        let speed_kmh = speed_mps * MPS_TO_KMH;

        self.current_speed_kmh = speed_kmh;
        self.coordinates = Some((sample.lat, sample.lng));

        if speed_kmh <= self.config.speed_limit_kmh || !self.cooldown_elapsed(sample.timestamp) {
            return None;
        }

        self.speed_exceeded_count += 1;
        self.last_speed_event_time = Some(sample.timestamp);

        Some(Event::SpeedExceeded {
            speed_kmh,
            lat: sample.lat,
            lng: sample.lng,
        })
    }

    /// Whole seconds since the last speeding event must exceed the cooldown
    fn cooldown_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.last_speed_event_time {
            Some(last) => (now - last).num_seconds() > self.config.speed_cooldown_s,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn fix(ms: i64, speed_mps: Option<f64>) -> PositionSample {
        PositionSample {
            lat: 52.52,
            lng: 13.405,
            speed_mps,
            timestamp: at(ms),
        }
    }

    #[test]
    fn test_speed_cooldown_sequence() {
        let mut monitor = SpeedMonitor::default();

        let first = monitor.on_sample(&fix(0, Some(13.9)));
        match first {
            Some(Event::SpeedExceeded { speed_kmh, lat, lng }) => {
                assert!((speed_kmh - 50.04).abs() < 1e-9);
                assert_eq!((lat, lng), (52.52, 13.405));
            }
            other => panic!("expected speeding event, got {other:?}"),
        }

        assert_eq!(monitor.on_sample(&fix(5_000, Some(13.9))), None);
        assert!(monitor.on_sample(&fix(11_000, Some(13.9))).is_some());
        assert_eq!(monitor.speed_exceeded_count(), 2);
    }

    #[test]
    fn test_cooldown_counts_whole_seconds() {
        let mut monitor = SpeedMonitor::default();
        assert!(monitor.on_sample(&fix(0, Some(20.0))).is_some());
        assert_eq!(monitor.on_sample(&fix(10_999, Some(20.0))), None);
        assert!(monitor.on_sample(&fix(11_000, Some(20.0))).is_some());
    }

    #[test]
    fn test_at_limit_does_not_fire() {
        let mut monitor = SpeedMonitor::new(SpeedConfig {
            speed_limit_kmh: 36.0,
            ..SpeedConfig::default()
        });
        assert_eq!(monitor.on_sample(&fix(0, Some(10.0))), None);
        assert_eq!(monitor.speed_exceeded_count(), 0);
    }

    #[test]
    fn test_missing_speed_reads_as_zero() {
        let mut monitor = SpeedMonitor::default();
        monitor.on_sample(&fix(0, Some(20.0)));
        assert_eq!(monitor.on_sample(&fix(1_000, None)), None);
        assert_eq!(monitor.current_speed_kmh(), 0.0);
        assert_eq!(monitor.on_sample(&fix(2_000, Some(f64::NAN))), None);
        assert_eq!(monitor.current_speed_kmh(), 0.0);
    }

    #[test]
    fn test_current_speed_passes_through_during_cooldown() {
        let mut monitor = SpeedMonitor::default();
        monitor.on_sample(&fix(0, Some(20.0)));
        monitor.on_sample(&fix(1_000, Some(25.0)));
        assert!((monitor.current_speed_kmh() - 90.0).abs() < 1e-9);
        assert_eq!(monitor.coordinates(), Some((52.52, 13.405)));
    }

    #[test]
    fn test_reset_clears_cooldown_and_counter() {
        let mut monitor = SpeedMonitor::default();
        monitor.on_sample(&fix(0, Some(20.0)));
        monitor.reset();
        assert_eq!(monitor.speed_exceeded_count(), 0);
        assert_eq!(monitor.coordinates(), None);
        assert!(monitor.on_sample(&fix(1_000, Some(20.0))).is_some());
    }
}
