//! Distraction monitor
//!
//! Counts consecutive frames in which the external classifier reported a face
//! looking into the camera. One event fires when the run reaches the threshold;
//! the run keeps counting without re-firing until an absent-face frame resets it.

use crate::config::DistractionConfig;
use crate::types::{Event, FrameSample};

/// Stage of the current face-present run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistractionStage {
    /// No face in the last frame
    Idle,
    /// Face present for `n` frames, below the threshold
    Counting(u32),
    /// Threshold reached; event already emitted for this run
    Fired(u32),
}

/// Stateful distraction monitor for one monitoring session
#[derive(Debug, Clone)]
pub struct DistractionMonitor {
    config: DistractionConfig,
    distraction_frames: u32,
    distraction_count: u32,
}

impl Default for DistractionMonitor {
    fn default() -> Self {
        Self::new(DistractionConfig::default())
    }
}

impl DistractionMonitor {
    pub fn new(config: DistractionConfig) -> Self {
        Self {
            config,
            distraction_frames: 0,
            distraction_count: 0,
        }
    }

    /// Length of the current face-present run
    pub fn distraction_frames(&self) -> u32 {
        self.distraction_frames
    }

    pub fn distraction_count(&self) -> u32 {
        self.distraction_count
    }

    pub fn stage(&self) -> DistractionStage {
        match self.distraction_frames {
            0 => DistractionStage::Idle,
            n if n < self.config.distraction_threshold_frames => DistractionStage::Counting(n),
            n => DistractionStage::Fired(n),
        }
    }

    pub fn reset(&mut self) {
        self.distraction_frames = 0;
        self.distraction_count = 0;
    }

    /// Process one camera frame
    pub fn on_frame(&mut self, frame: &FrameSample) -> Option<Event> {
        if !frame.face_present {
            self.distraction_frames = 0;
            return None;
        }

        self.distraction_frames = self.distraction_frames.saturating_add(1);
        if self.distraction_frames == self.config.distraction_threshold_frames {
            self.distraction_count += 1;
            Some(Event::Distraction)
        } else {
            None
        }
    }
}
