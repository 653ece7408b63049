use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::Phase;

/// Every observable timer transition produces a `TimerEvent`.
///
/// Collaborators (notification/haptic layers, UI) register listeners via
/// `TimerMachine::on_event`; operations also return the event they
/// produced. The machine announces *that* a phase completed and what
/// comes next -- how that is surfaced to the user is the listener's
/// business.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TimerEvent {
    TimerStarted {
        phase: Phase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        phase: Phase,
        time_left: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        phase: Phase,
        at: DateTime<Utc>,
    },
    /// A phase ran to completion or was skipped.
    PhaseCompleted {
        finished: Phase,
        next: Phase,
        completed_focus_sessions: u32,
        auto_started: bool,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
        at: DateTime<Utc>,
    },
    DurationChanged {
        phase: Phase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
}
