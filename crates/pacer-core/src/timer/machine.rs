//! The timer state machine.
//!
//! A wall-clock-anchored countdown/stopwatch over a persisted store.
//! `time_left` is always *recomputed* from the absolute anchor in
//! `start_timestamp` -- never decremented per tick -- so arbitrarily long
//! stalls (suspended process, missed ticks, restarts) self-correct at the
//! next recomputation.
//!
//! ## States
//!
//! ```text
//! Idle <-> Running        (is_running + start_timestamp pair)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let machine = TimerMachine::new(StoreDocument::at_default_location()?);
//! machine.ready().await; // rehydration settled
//! machine.start_timer();
//! // A cooperative tokio task recomputes every TICK_INTERVAL and
//! // invokes complete_phase() when the countdown exhausts.
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use super::phase::{determine_next_phase, Phase};
use super::schema::{migrate_timer_state, TIMER_SCHEMA_VERSION, TIMER_STORE};
use super::state::TimerState;
use crate::clock::{Clock, SystemClock};
use crate::events::TimerEvent;
use crate::store::{persist, PersistOptions, StoreDocument, StoreHandle};

/// Scheduling quantum of the tick task.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

type EventListener = Arc<dyn Fn(&TimerEvent) + Send + Sync>;

/// What a wall-clock recomputation found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecomputeOutcome {
    /// Not running (or no anchor); nothing to do.
    Idle,
    /// Still counting.
    Ticking,
    /// Countdown hit zero; the segment was stopped.
    Exhausted,
}

struct MachineInner {
    store: StoreHandle<TimerState>,
    clock: Arc<dyn Clock>,
    /// Guards the tick task: a task only touches state while its epoch
    /// is current, so at most one live loop exists and stale ones exit
    /// silently.
    tick_epoch: AtomicU64,
    listeners: Mutex<Vec<EventListener>>,
    ready: Mutex<Option<watch::Receiver<bool>>>,
}

/// Handle to the timer. Clones share the machine.
pub struct TimerMachine {
    inner: Arc<MachineInner>,
}

impl Clone for TimerMachine {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl TimerMachine {
    /// Persisted machine on the system clock. Must be called within a
    /// tokio runtime; rehydration runs in the background (await
    /// [`ready`](Self::ready) to sequence after it).
    pub fn new(document: StoreDocument) -> Self {
        Self::with_clock(document, Arc::new(SystemClock))
    }

    /// Persisted machine on an injected clock.
    pub fn with_clock(document: StoreDocument, clock: Arc<dyn Clock>) -> Self {
        let machine = Self::unpersisted(clock);
        let resumer = machine.clone();
        let options = PersistOptions::new(TIMER_STORE, TIMER_SCHEMA_VERSION)
            .migrate(migrate_timer_state)
            .on_rehydrate(move |state: &TimerState, _store| {
                // The sole mechanism by which an in-flight segment found
                // in storage continues after a restart.
                if state.is_running {
                    resumer.resume_ticking();
                }
            });
        let ready = persist::attach(machine.store(), document, options);
        *machine
            .inner
            .ready
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(ready);
        machine
    }

    /// In-memory machine without persistence.
    pub fn unpersisted(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(MachineInner {
                store: StoreHandle::new(TimerState::default()),
                clock,
                tick_epoch: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
                ready: Mutex::new(None),
            }),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Clone of the full timer state.
    pub fn snapshot(&self) -> TimerState {
        self.inner.store.get()
    }

    /// The underlying store, for observer subscription.
    pub fn store(&self) -> &StoreHandle<TimerState> {
        &self.inner.store
    }

    /// Resolves once startup rehydration has settled (immediately for an
    /// unpersisted machine).
    pub async fn ready(&self) {
        let ready = self
            .inner
            .ready
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(mut ready) = ready {
            // A closed channel means the rehydration task is gone; treat
            // it as settled.
            let _ = ready.wait_for(|settled| *settled).await;
        }
    }

    /// Waits until every mutation made so far has been written out.
    pub async fn flush(&self) {
        self.inner.store.flush().await;
    }

    /// Register a listener for every emitted [`TimerEvent`].
    pub fn on_event(&self, listener: impl Fn(&TimerEvent) + Send + Sync + 'static) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(listener));
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start (or re-anchor) the current phase. A stopwatch phase
    /// (`duration == 0`) restarts accumulation from zero; a countdown
    /// keeps its frozen `time_left` as the remaining amount.
    pub fn start_timer(&self) -> TimerEvent {
        let now = self.inner.clock.now_ms();
        let state = self.inner.store.update(|s| {
            if s.duration == 0 {
                s.time_left = 0;
            }
            s.is_running = true;
            s.start_timestamp = Some(now);
        });
        self.arm_tick_task();
        let event = TimerEvent::TimerStarted {
            phase: state.current_phase,
            duration_secs: state.duration,
            at: Utc::now(),
        };
        self.emit(&event);
        event
    }

    /// Freeze `time_left` at its wall-clock-derived value and stop.
    /// Returns `None` when nothing was running.
    pub fn stop_timer(&self) -> Option<TimerEvent> {
        let now = self.inner.clock.now_ms();
        let (state, was_running) = self.inner.store.update_with(|s| {
            if !s.is_running {
                return false;
            }
            recompute_state(s, now);
            s.is_running = false;
            s.start_timestamp = None;
            true
        });
        if !was_running {
            return None;
        }
        self.disarm_tick_task();
        let event = TimerEvent::TimerStopped {
            phase: state.current_phase,
            time_left: state.time_left,
            at: Utc::now(),
        };
        self.emit(&event);
        Some(event)
    }

    /// Stop and restore the current phase's configured duration.
    pub fn reset_timer(&self) -> TimerEvent {
        let state = self.inner.store.update(|s| {
            let configured = s.phase_durations.get(s.current_phase);
            s.duration = configured;
            s.time_left = configured;
            s.is_running = false;
            s.start_timestamp = None;
        });
        self.disarm_tick_task();
        let event = TimerEvent::TimerReset {
            phase: state.current_phase,
            at: Utc::now(),
        };
        self.emit(&event);
        event
    }

    /// Finish the current phase and install the next one. Invoked by the
    /// tick task when a countdown exhausts, and callable directly as the
    /// "skip" operation. Re-enters Running when auto-start is on.
    pub fn complete_phase(&self) -> TimerEvent {
        let (state, finished) = self.inner.store.update_with(|s| {
            let finished = s.current_phase;
            if finished == Phase::Focus {
                s.completed_focus_sessions += 1;
            }
            let next = determine_next_phase(
                finished,
                s.completed_focus_sessions,
                s.cycles_before_long_break,
            );
            let configured = s.phase_durations.get(next);
            s.current_phase = next;
            s.duration = configured;
            s.time_left = configured;
            s.is_running = false;
            s.start_timestamp = None;
            finished
        });
        self.disarm_tick_task();
        let auto_started = state.auto_start_next_phase;
        let event = TimerEvent::PhaseCompleted {
            finished,
            next: state.current_phase,
            completed_focus_sessions: state.completed_focus_sessions,
            auto_started,
            at: Utc::now(),
        };
        self.emit(&event);
        if auto_started {
            self.start_timer();
        }
        event
    }

    /// Set the current phase's duration in minutes. Negative values
    /// clamp to 0, which puts the phase in stopwatch mode.
    pub fn set_duration(&self, minutes: i64) -> TimerEvent {
        let phase = self.inner.store.read(|s| s.current_phase);
        self.set_phase_duration(phase, minutes)
    }

    /// Set any phase's duration in minutes. When the edited phase is the
    /// current one and nothing is running, `duration`/`time_left` sync
    /// immediately; mid-countdown edits only take effect at the next
    /// reset or phase change.
    ///
    /// Uses saturating arithmetic to prevent overflow with large values.
    pub fn set_phase_duration(&self, phase: Phase, minutes: i64) -> TimerEvent {
        let secs = (minutes.max(0) as u64).saturating_mul(60);
        self.inner.store.update(|s| {
            s.phase_durations.set(phase, secs);
            if phase == s.current_phase && !s.is_running {
                s.duration = secs;
                s.time_left = secs;
            }
        });
        let event = TimerEvent::DurationChanged {
            phase,
            duration_secs: secs,
            at: Utc::now(),
        };
        self.emit(&event);
        event
    }

    /// Switch the current phase, stopping any running segment and
    /// syncing the configured duration.
    pub fn set_current_phase(&self, phase: Phase) -> TimerEvent {
        let (state, from) = self.inner.store.update_with(|s| {
            let from = s.current_phase;
            let configured = s.phase_durations.get(phase);
            s.current_phase = phase;
            s.duration = configured;
            s.time_left = configured;
            s.is_running = false;
            s.start_timestamp = None;
            from
        });
        self.disarm_tick_task();
        let event = TimerEvent::PhaseChanged {
            from,
            to: state.current_phase,
            at: Utc::now(),
        };
        self.emit(&event);
        event
    }

    /// Flip notification delivery; returns the new value.
    pub fn toggle_notifications(&self) -> bool {
        self.inner
            .store
            .update(|s| s.notifications_enabled = !s.notifications_enabled)
            .notifications_enabled
    }

    /// Flip haptic feedback; returns the new value.
    pub fn toggle_haptics(&self) -> bool {
        self.inner
            .store
            .update(|s| s.haptics_enabled = !s.haptics_enabled)
            .haptics_enabled
    }

    pub fn set_auto_start_next_phase(&self, enabled: bool) {
        self.inner.store.update(|s| s.auto_start_next_phase = enabled);
    }

    /// Set the focus-session count per long break; clamped to >= 1.
    pub fn set_cycles_before_long_break(&self, cycles: u32) -> u32 {
        let clamped = cycles.max(1);
        self.inner
            .store
            .update(|s| s.cycles_before_long_break = clamped);
        clamped
    }

    /// Recompute from the wall clock and re-arm the tick task.
    ///
    /// The external wake signal: call on process foregrounding, after
    /// rehydration found a running segment, or whenever a stall is
    /// suspected. Idempotent and safe while a loop is already live; a
    /// no-op unless running with an anchor (defensive against malformed
    /// persisted state).
    pub fn resume_ticking(&self) {
        let armed = self
            .inner
            .store
            .read(|s| s.is_running && s.start_timestamp.is_some());
        if !armed {
            return;
        }
        match self.recompute() {
            RecomputeOutcome::Ticking => self.arm_tick_task(),
            RecomputeOutcome::Exhausted => {
                self.complete_phase();
            }
            RecomputeOutcome::Idle => {}
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Apply a wall-clock recomputation, committing only when something
    /// observable changed (sub-second quanta stay silent).
    fn recompute(&self) -> RecomputeOutcome {
        let now = self.inner.clock.now_ms();
        let (outcome, changed) = self.inner.store.read(|state| {
            let mut candidate = state.clone();
            let outcome = recompute_state(&mut candidate, now);
            (outcome, candidate != *state)
        });
        if !changed {
            return outcome;
        }
        let (_, outcome) = self
            .inner
            .store
            .update_with(|state| recompute_state(state, now));
        outcome
    }

    fn arm_tick_task(&self) {
        let epoch = self.inner.tick_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let machine = self.clone();
        tokio::spawn(async move {
            machine.tick_task(epoch).await;
        });
    }

    fn disarm_tick_task(&self) {
        self.inner.tick_epoch.fetch_add(1, Ordering::SeqCst);
    }

    async fn tick_task(self, epoch: u64) {
        loop {
            tokio::time::sleep(TICK_INTERVAL).await;
            if self.inner.tick_epoch.load(Ordering::SeqCst) != epoch {
                return; // Superseded; a newer loop owns the timer.
            }
            match self.recompute() {
                RecomputeOutcome::Ticking => {}
                RecomputeOutcome::Idle => return,
                RecomputeOutcome::Exhausted => {
                    self.complete_phase();
                    return;
                }
            }
        }
    }

    fn emit(&self, event: &TimerEvent) {
        // Clone the list out so listeners can call back into the machine.
        let listeners: Vec<EventListener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in listeners {
            listener(event);
        }
    }
}

/// Derive the timer fields from the wall clock.
///
/// Countdown: the anchor advances by the whole seconds consumed, keeping
/// `start_timestamp + time_left * 1000` the fixed absolute end instant.
/// Stopwatch: the anchor stays fixed and `time_left` is the elapsed
/// whole seconds.
fn recompute_state(state: &mut TimerState, now_ms: u64) -> RecomputeOutcome {
    let Some(anchor) = state.start_timestamp else {
        return RecomputeOutcome::Idle;
    };
    if !state.is_running {
        return RecomputeOutcome::Idle;
    }
    let elapsed_secs = now_ms.saturating_sub(anchor) / 1000;
    if state.duration == 0 {
        state.time_left = elapsed_secs;
        return RecomputeOutcome::Ticking;
    }
    if elapsed_secs >= state.time_left {
        state.time_left = 0;
        state.is_running = false;
        state.start_timestamp = None;
        RecomputeOutcome::Exhausted
    } else {
        if elapsed_secs > 0 {
            state.time_left -= elapsed_secs;
            state.start_timestamp = Some(anchor + elapsed_secs * 1000);
        }
        RecomputeOutcome::Ticking
    }
}
