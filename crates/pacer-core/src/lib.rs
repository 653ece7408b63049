//! # Pacer Core Library
//!
//! This library provides the core logic for the Pacer interval timer.
//! It implements a CLI-first philosophy where all operations are available
//! via a standalone CLI binary, with any GUI shell being a thin layer over
//! the same core library.
//!
//! ## Architecture
//!
//! - **Timer Machine**: A wall-clock-anchored state machine that recomputes
//!   remaining time from an absolute start instant rather than counting ticks
//! - **Stores**: Observable in-memory state containers with a persistence
//!   middleware that writes JSON snapshots in the background
//! - **Schema versioning**: Persisted blobs carry a version tag and are
//!   migrated forward (or discarded) on load
//!
//! ## Key Components
//!
//! - [`TimerMachine`]: Core timer state machine
//! - [`StoreHandle`]: Observable state container
//! - [`StoreDocument`]: Shared on-disk JSON document
//! - [`SettingsState`]: Persisted application settings

pub mod clock;
pub mod error;
pub mod events;
pub mod settings;
pub mod store;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::StoreError;
pub use events::TimerEvent;
pub use settings::SettingsState;
pub use store::{data_dir, PersistOptions, StoreDocument, StoreHandle};
pub use timer::{determine_next_phase, Phase, PhaseDurations, TimerMachine, TimerState};
