//! Countdown/stopwatch timer with phase cycling.
//!
//! The [`TimerMachine`] drives a [`TimerState`] through focus and break
//! phases; [`schema`](self) versioning keeps old persisted blobs loadable.

mod machine;
mod phase;
mod schema;
mod state;

pub use machine::{TimerMachine, TICK_INTERVAL};
pub use phase::{determine_next_phase, Phase, PhaseDurations};
pub use schema::{
    migrate_timer_state, VersionedTimerState, TIMER_SCHEMA_VERSION, TIMER_STORE,
};
pub use state::TimerState;
