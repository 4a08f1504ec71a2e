//! Single-shot quiz countdown.
//!
//! The timer is a pure state machine driven by synthetic one-second ticks;
//! the host owns the actual tick source. Because pausing is a state check
//! inside `tick`, resuming never "catches up" missed ticks; it continues
//! from the last recorded remaining time.

use thiserror::Error;

/// Hard ceiling on the low-time warning window, in seconds.
pub const LOW_TIME_CAP_SECONDS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Running,
    Paused,
    Expired,
}

/// What a tick (or control call) produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One second elapsed, nothing notable.
    Tick,
    /// The countdown just entered the low-time window.
    LowTime,
    /// The countdown hit zero. Fired exactly once per timer.
    Expired,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimerError {
    #[error("timer is {0:?}, cannot pause")]
    NotRunning(TimerState),

    #[error("timer is {0:?}, cannot resume")]
    NotPaused(TimerState),
}

/// Countdown for one timed attempt.
///
/// A timer is bound to one attempt identity. When the attempt changes, build
/// a new timer; there is deliberately no reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizTimer {
    total_seconds: u32,
    remaining_seconds: u32,
    state: TimerState,
    low_time_announced: bool,
}

impl QuizTimer {
    /// Start a countdown for the given limit. `None` or zero minutes means
    /// the quiz is untimed and no timer exists.
    #[must_use]
    pub fn start(limit_minutes: Option<u32>) -> Option<Self> {
        let minutes = limit_minutes.filter(|m| *m > 0)?;
        let total_seconds = minutes.saturating_mul(60);
        Some(Self {
            total_seconds,
            remaining_seconds: total_seconds,
            state: TimerState::Running,
            low_time_announced: false,
        })
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.state == TimerState::Expired
    }

    /// The warning window opens at `min(300s, 10% of total)`.
    #[must_use]
    pub fn low_time_threshold_seconds(&self) -> u32 {
        LOW_TIME_CAP_SECONDS.min(self.total_seconds / 10)
    }

    #[must_use]
    pub fn is_low_time(&self) -> bool {
        !self.is_expired() && self.remaining_seconds <= self.low_time_threshold_seconds()
    }

    /// Advance the countdown by one second.
    ///
    /// Returns `None` while paused or after expiry: a paused timer does not
    /// count, and expiry cannot fire twice even if the host's tick handler
    /// runs again.
    pub fn tick(&mut self) -> Option<TimerEvent> {
        if self.state != TimerState::Running {
            return None;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.state = TimerState::Expired;
            return Some(TimerEvent::Expired);
        }
        if !self.low_time_announced && self.is_low_time() {
            self.low_time_announced = true;
            return Some(TimerEvent::LowTime);
        }
        Some(TimerEvent::Tick)
    }

    /// Suspend counting without touching remaining time.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::NotRunning` when paused or expired.
    pub fn pause(&mut self) -> Result<(), TimerError> {
        if self.state != TimerState::Running {
            return Err(TimerError::NotRunning(self.state));
        }
        self.state = TimerState::Paused;
        Ok(())
    }

    /// Resume counting from the last recorded remaining time.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::NotPaused` when running or expired.
    pub fn resume(&mut self) -> Result<(), TimerError> {
        if self.state != TimerState::Paused {
            return Err(TimerError::NotPaused(self.state));
        }
        self.state = TimerState::Running;
        Ok(())
    }
}
