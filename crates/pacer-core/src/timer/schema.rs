//! Versioned persisted schema for the timer store.
//!
//! Each historical shape of the `"timerState"` blob is its own type, and
//! every version step has a total upgrade function; `into_current()`
//! composes them to walk from any stored version to the current shape.
//! Old blobs are interpreted defensively: absent fields take defaults.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::phase::{Phase, PhaseDurations};
use super::state::TimerState;

/// Name of the timer blob inside the store document.
pub const TIMER_STORE: &str = "timerState";

/// Current schema version written with every timer snapshot.
///
/// Increment this when adding a variant below.
pub const TIMER_SCHEMA_VERSION: u32 = 3;

/// v1: flat single-phase countdown, no phase cycling.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStateV1 {
    #[serde(default = "default_duration_secs")]
    pub duration: u64,
    #[serde(default = "default_duration_secs")]
    pub time_left: u64,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub start_timestamp: Option<u64>,
}

/// v2: phase cycling, per-phase durations, session counting.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStateV2 {
    #[serde(default)]
    pub current_phase: Phase,
    #[serde(default)]
    pub phase_durations: PhaseDurations,
    #[serde(default = "default_duration_secs")]
    pub duration: u64,
    #[serde(default = "default_duration_secs")]
    pub time_left: u64,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub start_timestamp: Option<u64>,
    #[serde(default = "default_cycles")]
    pub cycles_before_long_break: u32,
    #[serde(default)]
    pub completed_focus_sessions: u32,
    #[serde(default)]
    pub auto_start_next_phase: bool,
}

fn default_duration_secs() -> u64 {
    25 * 60
}
fn default_cycles() -> u32 {
    4
}

impl TimerStateV1 {
    /// v1 -> v2: the legacy single duration becomes the focus duration;
    /// break durations and cycling take defaults, session count resets.
    fn upgrade(self) -> TimerStateV2 {
        TimerStateV2 {
            current_phase: Phase::Focus,
            phase_durations: PhaseDurations {
                focus: self.duration,
                ..PhaseDurations::default()
            },
            duration: self.duration,
            time_left: self.time_left,
            is_running: self.is_running,
            start_timestamp: self.start_timestamp,
            cycles_before_long_break: default_cycles(),
            completed_focus_sessions: 0,
            auto_start_next_phase: false,
        }
    }
}

impl TimerStateV2 {
    /// v2 -> v3: notification and haptic flags arrive, defaulted on.
    fn upgrade(self) -> TimerState {
        TimerState {
            current_phase: self.current_phase,
            phase_durations: self.phase_durations,
            duration: self.duration,
            time_left: self.time_left,
            is_running: self.is_running,
            start_timestamp: self.start_timestamp,
            cycles_before_long_break: self.cycles_before_long_break,
            completed_focus_sessions: self.completed_focus_sessions,
            auto_start_next_phase: self.auto_start_next_phase,
            notifications_enabled: true,
            haptics_enabled: true,
        }
    }
}

/// Every persisted shape the timer store has ever written.
#[derive(Debug)]
pub enum VersionedTimerState {
    V1(TimerStateV1),
    V2(TimerStateV2),
    V3(TimerState),
}

impl VersionedTimerState {
    /// Interpret a raw persisted blob according to its recorded version.
    ///
    /// Versions newer than [`TIMER_SCHEMA_VERSION`] are read best-effort
    /// as the current shape (unknown fields ignored, missing ones
    /// defaulted).
    pub fn parse(value: Value, version: u32) -> Result<Self, serde_json::Error> {
        match version {
            0 | 1 => Ok(Self::V1(serde_json::from_value(value)?)),
            2 => Ok(Self::V2(serde_json::from_value(value)?)),
            _ => Ok(Self::V3(serde_json::from_value(value)?)),
        }
    }

    /// Walk the upgrade chain to the current schema.
    pub fn into_current(self) -> TimerState {
        match self {
            Self::V1(v1) => v1.upgrade().upgrade(),
            Self::V2(v2) => v2.upgrade(),
            Self::V3(v3) => v3,
        }
    }
}

/// Migration hook handed to the persistence middleware for the timer
/// store. Total: an unreadable blob is discarded (the rehydration merge
/// then keeps the defaults).
pub fn migrate_timer_state(value: Value, persisted_version: u32) -> Value {
    let state = match VersionedTimerState::parse(value, persisted_version) {
        Ok(versioned) => versioned.into_current(),
        Err(e) => {
            warn!("discarding unreadable v{persisted_version} timer state: {e}");
            return Value::Null;
        }
    };
    serde_json::to_value(state).unwrap_or_default()
}
