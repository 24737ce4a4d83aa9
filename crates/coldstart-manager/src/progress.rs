//! Startup sequence progress tracking.

use std::time::SystemTime;

/// Number of steps in a full creation sequence: ssh key, snapshot,
/// create, boot readiness, game readiness.
pub const CREATE_STEPS: u32 = 5;

/// Number of steps in a power-on sequence: power on, boot readiness,
/// game readiness.
pub const START_STEPS: u32 = 3;

/// Progress of the single in-flight creation-or-start sequence.
///
/// `current` never exceeds `max`, and once `error` is set no further
/// steps execute. A new sequence replaces the previous record wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupProgress {
    pub started_at: SystemTime,
    pub current: u32,
    pub max: u32,
    pub error: bool,
}

impl StartupProgress {
    /// Fresh progress for a creation sequence.
    pub fn create() -> Self {
        Self::with_steps(0, CREATE_STEPS)
    }

    /// Fresh progress for a power-on sequence.
    pub fn start() -> Self {
        Self::with_steps(0, START_STEPS)
    }

    /// Progress resumed mid-sequence (process restart recovery: the
    /// instance already exists, boot polling is next).
    pub fn recovered() -> Self {
        Self::with_steps(3, CREATE_STEPS)
    }

    fn with_steps(current: u32, max: u32) -> Self {
        Self {
            started_at: SystemTime::now(),
            current,
            max,
            error: false,
        }
    }

    /// Whether the sequence is still running.
    pub fn in_flight(&self) -> bool {
        self.current < self.max && !self.error
    }

    /// Record one completed step. No-op after an error or completion.
    pub fn advance(&mut self) {
        if !self.error && self.current < self.max {
            self.current += 1;
        }
    }

    /// Mark the sequence failed; the step count freezes.
    pub fn fail(&mut self) {
        self.error = true;
    }
}
