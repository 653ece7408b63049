//! The persisted timer state.

use serde::{Deserialize, Serialize};

use super::phase::{Phase, PhaseDurations};

/// Complete timer state, one per machine.
///
/// Persisted wholesale under the `"timerState"` key (camelCase field
/// names on the wire). Every field carries a serde default so partial or
/// legacy blobs deserialize defensively.
///
/// Invariant: `is_running == start_timestamp.is_some()` at every
/// observable instant. While running, `time_left` is derived from the
/// wall clock against `start_timestamp`, never accumulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    #[serde(default)]
    pub current_phase: Phase,
    #[serde(default)]
    pub phase_durations: PhaseDurations,
    /// Configured length of the current segment in seconds; 0 means
    /// stopwatch mode.
    #[serde(default = "default_duration_secs")]
    pub duration: u64,
    /// Seconds remaining (countdown) or elapsed (stopwatch).
    #[serde(default = "default_duration_secs")]
    pub time_left: u64,
    #[serde(default)]
    pub is_running: bool,
    /// Epoch-millisecond anchor of the running segment; `None` exactly
    /// when stopped. In countdown mode the anchor advances as whole
    /// seconds are consumed, so `anchor + time_left * 1000` stays the
    /// absolute end instant.
    #[serde(default)]
    pub start_timestamp: Option<u64>,
    #[serde(default = "default_cycles")]
    pub cycles_before_long_break: u32,
    #[serde(default)]
    pub completed_focus_sessions: u32,
    #[serde(default)]
    pub auto_start_next_phase: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub haptics_enabled: bool,
}

fn default_duration_secs() -> u64 {
    25 * 60
}
fn default_cycles() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

impl Default for TimerState {
    fn default() -> Self {
        let phase_durations = PhaseDurations::default();
        Self {
            current_phase: Phase::Focus,
            duration: phase_durations.focus,
            time_left: phase_durations.focus,
            phase_durations,
            is_running: false,
            start_timestamp: None,
            cycles_before_long_break: default_cycles(),
            completed_focus_sessions: 0,
            auto_start_next_phase: false,
            notifications_enabled: true,
            haptics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_values() {
        let state = TimerState::default();
        assert_eq!(state.current_phase, Phase::Focus);
        assert_eq!(state.duration, 1500);
        assert_eq!(state.time_left, 1500);
        assert!(!state.is_running);
        assert!(state.start_timestamp.is_none());
        assert_eq!(state.cycles_before_long_break, 4);
        assert_eq!(state.completed_focus_sessions, 0);
        assert!(!state.auto_start_next_phase);
        assert!(state.notifications_enabled);
        assert!(state.haptics_enabled);
    }

    #[test]
    fn wire_format_is_camel_case() {
        let json = serde_json::to_value(TimerState::default()).unwrap();
        assert_eq!(json["currentPhase"], "focus");
        assert_eq!(json["timeLeft"], 1500);
        assert_eq!(json["isRunning"], false);
        assert_eq!(json["startTimestamp"], serde_json::Value::Null);
        assert_eq!(json["cyclesBeforeLongBreak"], 4);
        assert_eq!(json["completedFocusSessions"], 0);
        assert_eq!(json["autoStartNextPhase"], false);
        assert_eq!(json["notificationsEnabled"], true);
        assert_eq!(json["hapticsEnabled"], true);
        assert_eq!(json["phaseDurations"]["shortBreak"], 300);
    }

    #[test]
    fn partial_blob_fills_defaults() {
        let state: TimerState =
            serde_json::from_value(serde_json::json!({ "timeLeft": 42 })).unwrap();
        assert_eq!(state.time_left, 42);
        assert_eq!(state.duration, 1500);
        assert!(state.notifications_enabled);
    }
}
