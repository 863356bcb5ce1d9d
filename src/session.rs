//! Session orchestration
//!
//! This module provides the public API for GoodWheel Core. A [`DriveSession`]
//! owns the running/idle state, routes raw samples into the three monitors and
//! hands every emitted event, tagged with its session and timestamp, to the
//! caller.

use std::sync::mpsc::Sender;

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::distraction::DistractionMonitor;
use crate::error::MonitorError;
use crate::motion::MotionClassifier;
use crate::speed::SpeedMonitor;
use crate::types::{
    Counters, Event, EventRecord, FrameSample, MotionSample, PositionSample, SensorFault,
    SessionState, SessionSummary,
};

/// Destination for emitted events. Each record is delivered exactly once.
pub trait EventSink {
    fn deliver(&mut self, record: EventRecord);
}

impl EventSink for Vec<EventRecord> {
    fn deliver(&mut self, record: EventRecord) {
        self.push(record);
    }
}

impl EventSink for Sender<EventRecord> {
    fn deliver(&mut self, record: EventRecord) {
        // A dropped receiver means nobody is listening any more
        if self.send(record).is_err() {
            trace!("event receiver dropped");
        }
    }
}

/// Stateful monitoring session.
///
/// Samples are ignored while the session is idle. `start()` resets every
/// monitor, so no state carries over between sessions.
#[derive(Debug, Clone)]
pub struct DriveSession {
    config: SessionConfig,
    state: SessionState,
    session_id: Option<Uuid>,
    motion: MotionClassifier,
    speed: SpeedMonitor,
    distraction: DistractionMonitor,
    events_emitted: u64,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
}

impl Default for DriveSession {
    fn default() -> Self {
        Self::build(SessionConfig::default())
    }
}

impl DriveSession {
    /// Create a session with the default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a custom configuration, rejecting invalid values
    pub fn with_config(config: SessionConfig) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create a session from a JSON configuration document
    pub fn from_config_json(json: &str) -> Result<Self, MonitorError> {
        Ok(Self::build(SessionConfig::from_json(json)?))
    }

    fn build(config: SessionConfig) -> Self {
        Self {
            motion: MotionClassifier::new(config.motion.clone()),
            speed: SpeedMonitor::new(config.speed.clone()),
            distraction: DistractionMonitor::new(config.distraction.clone()),
            config,
            state: SessionState::Idle,
            session_id: None,
            events_emitted: 0,
            started_at: None,
            stopped_at: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Identifier of the current (or last) session
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Begin a new session at `now`.
    ///
    /// Resets gravity, cooldowns, counters and the distraction run. Calling
    /// this while already running starts over with a fresh session.
    pub fn start(&mut self, now: DateTime<Utc>) -> Uuid {
        self.motion.reset();
        self.speed.reset();
        self.distraction.reset();
        self.events_emitted = 0;
        self.started_at = Some(now);
        self.stopped_at = None;

        let session_id = Uuid::new_v4();
        self.session_id = Some(session_id);
        self.state = SessionState::Running;

        info!(%session_id, "monitoring session started");
        session_id
    }

    /// End the current session at `now`. No-op while idle.
    pub fn stop(&mut self, now: DateTime<Utc>) {
        if self.state == SessionState::Idle {
            return;
        }
        self.state = SessionState::Idle;
        self.stopped_at = Some(now);
        self.speed.clear_reading();

        info!(
            session_id = ?self.session_id,
            events = self.events_emitted,
            "monitoring session stopped"
        );
    }

    /// Route a motion sample, delivering events to `sink`. Returns the number delivered.
    pub fn feed_motion_into<S: EventSink + ?Sized>(
        &mut self,
        sample: &MotionSample,
        sink: &mut S,
    ) -> usize {
        let Some(session_id) = self.running_session("motion") else {
            return 0;
        };
        let events = self.motion.on_sample(sample);
        self.dispatch(session_id, sample.timestamp, events, sink)
    }

    /// Route a GPS fix, delivering events to `sink`. Returns the number delivered.
    pub fn feed_position_into<S: EventSink + ?Sized>(
        &mut self,
        sample: &PositionSample,
        sink: &mut S,
    ) -> usize {
        let Some(session_id) = self.running_session("position") else {
            return 0;
        };
        let event = self.speed.on_sample(sample);
        self.dispatch(session_id, sample.timestamp, event, sink)
    }

    /// Route a camera frame, delivering events to `sink`. Returns the number delivered.
    pub fn feed_frame_into<S: EventSink + ?Sized>(
        &mut self,
        frame: &FrameSample,
        sink: &mut S,
    ) -> usize {
        let Some(session_id) = self.running_session("frame") else {
            return 0;
        };
        let event = self.distraction.on_frame(frame);
        self.dispatch(session_id, frame.timestamp, event, sink)
    }

    /// Route a motion sample and return the emitted events
    pub fn feed_motion(&mut self, sample: &MotionSample) -> Vec<EventRecord> {
        let mut records = Vec::new();
        self.feed_motion_into(sample, &mut records);
        records
    }

    /// Route a GPS fix and return the emitted events
    pub fn feed_position(&mut self, sample: &PositionSample) -> Vec<EventRecord> {
        let mut records = Vec::new();
        self.feed_position_into(sample, &mut records);
        records
    }

    /// Route a camera frame and return the emitted events
    pub fn feed_frame(&mut self, frame: &FrameSample) -> Vec<EventRecord> {
        let mut records = Vec::new();
        self.feed_frame_into(frame, &mut records);
        records
    }

    /// Route the outcome of a position request from the GPS adapter.
    ///
    /// A fault is handed back as an error and leaves every monitor untouched.
    pub fn feed_position_fix(
        &mut self,
        fix: Result<PositionSample, SensorFault>,
    ) -> Result<Vec<EventRecord>, MonitorError> {
        match fix {
            Ok(sample) => Ok(self.feed_position(&sample)),
            Err(fault) => {
                warn!(%fault, "position fix failed");
                Err(MonitorError::Sensor(fault))
            }
        }
    }

    /// Running counters for the current (or last) session
    pub fn counters(&self) -> Counters {
        Counters {
            speed_exceeded_count: self.speed.speed_exceeded_count(),
            harsh_count: self.motion.harsh_count(),
            bump_count: self.motion.bump_count(),
            turn_count: self.motion.turn_count(),
            distraction_count: self.distraction.distraction_count(),
        }
    }

    /// Instantaneous speed from the latest fix (km/h)
    pub fn current_speed_kmh(&self) -> f64 {
        self.speed.current_speed_kmh()
    }

    /// Latest `(lat, lng)`
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.speed.coordinates()
    }

    /// Snapshot of the session for display
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            state: self.state,
            counters: self.counters(),
            current_speed_kmh: self.current_speed_kmh(),
            coordinates: self.coordinates(),
            events_emitted: self.events_emitted,
            started_at: self.started_at,
            stopped_at: self.stopped_at,
        }
    }

    /// Snapshot of the session as JSON
    pub fn summary_json(&self) -> Result<String, MonitorError> {
        Ok(serde_json::to_string(&self.summary())?)
    }

    fn running_session(&self, stream: &str) -> Option<Uuid> {
        match (self.state, self.session_id) {
            (SessionState::Running, Some(session_id)) => Some(session_id),
            _ => {
                trace!(stream, "sample dropped while idle");
                None
            }
        }
    }

    fn dispatch<S, I>(
        &mut self,
        session_id: Uuid,
        timestamp: DateTime<Utc>,
        events: I,
        sink: &mut S,
    ) -> usize
    where
        S: EventSink + ?Sized,
        I: IntoIterator<Item = Event>,
    {
        let mut delivered = 0;
        for event in events {
            debug!(%session_id, kind = %event.kind(), ?event, "driving event");
            sink.deliver(EventRecord {
                session_id,
                timestamp,
                event,
            });
            delivered += 1;
        }
        self.events_emitted += delivered as u64;
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, SensorKind, Vec3};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use std::sync::mpsc;

    const G: f64 = 9.81;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn motion(ms: i64, accel: Vec3, rotation: Vec3) -> MotionSample {
        MotionSample::new(accel, rotation, at(ms))
    }

    fn rest(ms: i64) -> MotionSample {
        motion(ms, Vec3::new(0.0, 0.0, G), Vec3::ZERO)
    }

    fn fix(ms: i64, speed_mps: f64) -> PositionSample {
        PositionSample {
            lat: 40.4168,
            lng: -3.7038,
            speed_mps: Some(speed_mps),
            timestamp: at(ms),
        }
    }

    fn face(ms: i64, face_present: bool) -> FrameSample {
        FrameSample {
            face_present,
            timestamp: at(ms),
        }
    }

    fn frames(session: &mut DriveSession, start_ms: i64, count: u32) -> Vec<EventRecord> {
        (0..count as i64)
            .flat_map(|i| session.feed_frame(&face(start_ms + i * 33, true)))
            .collect()
    }

    /// Produce a bump, a speeding event and a distraction
    fn drive(session: &mut DriveSession) {
        session.feed_motion(&rest(0));
        let bump = motion(20, Vec3::new(0.0, 0.0, G + 10.0), Vec3::ZERO);
        assert_eq!(session.feed_motion(&bump).len(), 1);
        assert_eq!(session.feed_position(&fix(100, 20.0)).len(), 1);
        assert_eq!(frames(session, 200, 45).len(), 1);
    }

    #[test]
    fn test_idle_session_drops_samples() {
        let mut session = DriveSession::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.feed_position(&fix(0, 30.0)).is_empty());
        assert!(frames(&mut session, 0, 100).is_empty());
        assert_eq!(session.counters(), Counters::default());
        assert_eq!(session.current_speed_kmh(), 0.0);
    }

    #[test]
    fn test_events_are_tagged_with_session_and_time() {
        let mut session = DriveSession::new();
        let session_id = session.start(at(0));

        let records = session.feed_position(&fix(1_500, 20.0));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session_id, session_id);
        assert_eq!(records[0].timestamp, at(1_500));
        assert_eq!(records[0].event.kind(), EventKind::SpeedExceeded);
    }

    #[test]
    fn test_counters_track_each_kind() {
        let mut session = DriveSession::new();
        session.start(at(0));
        drive(&mut session);

        let counters = session.counters();
        assert_eq!(
            counters,
            Counters {
                speed_exceeded_count: 1,
                harsh_count: 0,
                bump_count: 1,
                turn_count: 0,
                distraction_count: 1,
            }
        );
        assert_eq!(session.summary().events_emitted, 3);
    }

    #[test]
    fn test_stop_freezes_counters_and_drops_samples() {
        let mut session = DriveSession::new();
        session.start(at(0));
        drive(&mut session);
        let before = session.counters();

        session.stop(at(5_000));
        assert!(!session.is_running());
        let jolt = motion(60_000, Vec3::new(0.0, 0.0, G + 20.0), Vec3::new(200.0, 0.0, 0.0));
        assert!(session.feed_motion(&jolt).is_empty());
        assert!(session.feed_position(&fix(60_000, 40.0)).is_empty());
        assert!(frames(&mut session, 60_000, 100).is_empty());

        assert_eq!(session.counters(), before);
        assert_eq!(session.current_speed_kmh(), 0.0);
        assert_eq!(session.coordinates(), None);
    }

    #[test]
    fn test_start_resets_counters_and_cooldowns() {
        let mut session = DriveSession::new();
        session.start(at(0));
        drive(&mut session);

        session.stop(at(1_000));
        session.start(at(2_000));
        assert_eq!(session.counters(), Counters::default());

        // Speed cooldown from the previous session no longer applies
        assert_eq!(session.feed_position(&fix(2_100, 20.0)).len(), 1);
    }

    #[test]
    fn test_distraction_run_does_not_carry_over() {
        let mut session = DriveSession::new();
        session.start(at(0));
        assert!(frames(&mut session, 0, 44).is_empty());

        session.stop(at(2_000));
        session.start(at(3_000));

        assert!(frames(&mut session, 3_000, 1).is_empty());
        assert!(frames(&mut session, 3_033, 43).is_empty());
        assert_eq!(frames(&mut session, 5_000, 1).len(), 1);
    }

    #[test]
    fn test_start_twice_matches_single_start() {
        let mut once = DriveSession::new();
        once.start(at(0));
        drive(&mut once);
        once.start(at(10_000));

        let mut twice = DriveSession::new();
        twice.start(at(0));
        drive(&mut twice);
        twice.start(at(10_000));
        twice.start(at(10_000));

        assert!(twice.is_running());
        assert_eq!(twice.counters(), once.counters());
        assert_eq!(twice.counters(), Counters::default());

        let mut once_summary = once.summary();
        let mut twice_summary = twice.summary();
        once_summary.session_id = None;
        twice_summary.session_id = None;
        assert_eq!(twice_summary, once_summary);
    }

    #[test]
    fn test_new_session_id_per_start() {
        let mut session = DriveSession::new();
        let first = session.start(at(0));
        session.stop(at(1_000));
        let second = session.start(at(2_000));
        assert_ne!(first, second);
        assert_eq!(session.session_id(), Some(second));
    }

    #[test]
    fn test_position_fault_is_reported_without_state_change() {
        let mut session = DriveSession::new();
        session.start(at(0));
        session.feed_position(&fix(0, 10.0));

        let result = session.feed_position_fix(Err(SensorFault::Timeout));
        assert!(matches!(result, Err(MonitorError::Sensor(SensorFault::Timeout))));
        assert!((session.current_speed_kmh() - 36.0).abs() < 1e-9);

        let denied =
            session.feed_position_fix(Err(SensorFault::PermissionDenied(SensorKind::Position)));
        assert!(denied.is_err());
        assert_eq!(session.counters(), Counters::default());

        let ok = session.feed_position_fix(Ok(fix(1_000, 20.0))).unwrap();
        assert_eq!(ok.len(), 1);
    }

    #[test]
    fn test_channel_sink_receives_events_in_order() {
        let (tx, rx) = mpsc::channel();
        let mut sink = tx;

        let mut session = DriveSession::new();
        session.start(at(0));
        session.feed_motion_into(&rest(0), &mut sink);
        session.feed_motion_into(&motion(20, Vec3::new(0.0, 0.0, G + 10.0), Vec3::ZERO), &mut sink);
        session.feed_position_into(&fix(30, 20.0), &mut sink);
        drop(sink);

        let kinds: Vec<EventKind> = rx.iter().map(|record| record.event.kind()).collect();
        assert_eq!(kinds, vec![EventKind::Bump, EventKind::SpeedExceeded]);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = SessionConfig::default();
        config.motion.turn_threshold = -30.0;
        assert!(matches!(
            DriveSession::with_config(config),
            Err(MonitorError::InvalidConfig(_))
        ));
        let zero_frames = r#"{ "distraction": { "distraction_threshold_frames": 0 } }"#;
        assert!(DriveSession::from_config_json(zero_frames).is_err());
    }

    #[test]
    fn test_custom_config_applies() {
        let mut session =
            DriveSession::from_config_json(r#"{ "speed": { "speed_limit_kmh": 100.0 } }"#).unwrap();
        session.start(at(0));
        assert!(session.feed_position(&fix(0, 20.0)).is_empty());
        assert_eq!(session.feed_position(&fix(1_000, 30.0)).len(), 1);
    }

    #[test]
    fn test_config_survives_json_round_trip() {
        let mut config = SessionConfig::default();
        config.motion.bump_threshold = 4.5;
        config.motion.motion_cooldown_ms = 1_500;
        config.speed.speed_limit_kmh = 90.0;
        config.distraction.distraction_threshold_frames = 60;
        let session = DriveSession::with_config(config).unwrap();

        let json = session.config().to_json().unwrap();
        let restored = DriveSession::from_config_json(&json).unwrap();
        assert_eq!(restored.config(), session.config());
    }

    #[test]
    fn test_motion_gap_does_not_fire_bump() {
        let mut session = DriveSession::new();
        session.start(at(0));
        for step in 0..50 {
            assert!(session.feed_motion(&rest(step * 20)).is_empty());
        }
        let gap = MotionSample::from_parts(None, Some(Vec3::ZERO), at(1_000));
        assert!(session.feed_motion(&gap).is_empty());
        assert_eq!(session.counters().total(), 0);
    }

    #[test]
    fn test_summary_json() {
        let mut session = DriveSession::new();
        session.start(at(0));
        session.feed_position(&fix(100, 20.0));
        session.stop(at(60_000));

        let summary: serde_json::Value =
            serde_json::from_str(&session.summary_json().unwrap()).unwrap();
        assert_eq!(summary["state"], "idle");
        assert_eq!(summary["counters"]["speed_exceeded_count"], 1);
        assert_eq!(summary["events_emitted"], 1);
        assert_eq!(summary["started_at"], "2024-01-15T14:00:00Z");
        assert_eq!(summary["stopped_at"], "2024-01-15T14:01:00Z");
    }
}
