//! Phase definitions and the focus/break sequencing rule.

use serde::{Deserialize, Serialize};

/// The activity the timer is currently tracking.
///
/// Serialized in camelCase to match the persisted document format
/// (`"focus"`, `"shortBreak"`, `"longBreak"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Focus
    }
}

/// Configured length in seconds for each phase.
///
/// A zero duration puts that phase in stopwatch mode: `time_left` counts
/// up from zero, uncapped, instead of counting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDurations {
    #[serde(default = "default_focus_secs")]
    pub focus: u64,
    #[serde(default = "default_short_break_secs")]
    pub short_break: u64,
    #[serde(default = "default_long_break_secs")]
    pub long_break: u64,
}

fn default_focus_secs() -> u64 {
    25 * 60
}
fn default_short_break_secs() -> u64 {
    5 * 60
}
fn default_long_break_secs() -> u64 {
    15 * 60
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            focus: default_focus_secs(),
            short_break: default_short_break_secs(),
            long_break: default_long_break_secs(),
        }
    }
}

impl PhaseDurations {
    pub fn get(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Focus => self.focus,
            Phase::ShortBreak => self.short_break,
            Phase::LongBreak => self.long_break,
        }
    }

    pub fn set(&mut self, phase: Phase, secs: u64) {
        match phase {
            Phase::Focus => self.focus = secs,
            Phase::ShortBreak => self.short_break = secs,
            Phase::LongBreak => self.long_break = secs,
        }
    }
}

/// Which phase follows `current` once it completes.
///
/// `completed_focus_sessions` is the count *after* incrementing for the
/// session just finished: every `cycles_before_long_break`-th focus
/// session leads into the long break, the others into the short break.
/// Breaks always return to focus. A zero cycle length is treated as 1.
pub fn determine_next_phase(
    current: Phase,
    completed_focus_sessions: u32,
    cycles_before_long_break: u32,
) -> Phase {
    match current {
        Phase::Focus => {
            let cycles = cycles_before_long_break.max(1);
            if completed_focus_sessions % cycles == 0 {
                Phase::LongBreak
            } else {
                Phase::ShortBreak
            }
        }
        Phase::ShortBreak | Phase::LongBreak => Phase::Focus,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_focus_sessions_end_in_long_break() {
        let next: Vec<Phase> = (1..=4)
            .map(|completed| determine_next_phase(Phase::Focus, completed, 4))
            .collect();
        assert_eq!(
            next,
            vec![
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::LongBreak
            ]
        );
    }

    #[test]
    fn breaks_always_return_to_focus() {
        assert_eq!(determine_next_phase(Phase::ShortBreak, 2, 4), Phase::Focus);
        assert_eq!(determine_next_phase(Phase::LongBreak, 4, 4), Phase::Focus);
    }

    #[test]
    fn zero_cycle_length_behaves_as_one() {
        assert_eq!(determine_next_phase(Phase::Focus, 1, 0), Phase::LongBreak);
        assert_eq!(determine_next_phase(Phase::Focus, 7, 0), Phase::LongBreak);
    }

    #[test]
    fn phases_serialize_in_camel_case() {
        assert_eq!(
            serde_json::to_string(&Phase::ShortBreak).unwrap(),
            "\"shortBreak\""
        );
        assert_eq!(
            serde_json::to_string(&Phase::LongBreak).unwrap(),
            "\"longBreak\""
        );
        assert_eq!(serde_json::to_string(&Phase::Focus).unwrap(), "\"focus\"");
    }

    #[test]
    fn duration_map_wire_names() {
        let json = serde_json::to_value(PhaseDurations::default()).unwrap();
        assert_eq!(json["focus"], 1500);
        assert_eq!(json["shortBreak"], 300);
        assert_eq!(json["longBreak"], 900);
    }
}
