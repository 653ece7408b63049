//! Integration tests for persisted-state rehydration.
//!
//! These tests verify the complete restart workflow: one machine writes
//! its state to a store document, a second machine loads from the same
//! document, migrates old schema versions forward, and resumes in-flight
//! segments against the wall clock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde_json::json;

use pacer_core::clock::ManualClock;
use pacer_core::events::TimerEvent;
use pacer_core::settings::{settings_store, SETTINGS_STORE};
use pacer_core::store::{StoreDocument, PERSIST_VERSION_KEY};
use pacer_core::timer::{Phase, TimerMachine, TimerState, TIMER_STORE};

const T0: u64 = 1_700_000_000_000;

fn document_in(dir: &tempfile::TempDir) -> StoreDocument {
    StoreDocument::open(dir.path().join("store.json"))
}

#[tokio::test]
async fn test_stopped_state_round_trips_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let document = document_in(&dir);

    let first = TimerMachine::with_clock(document.clone(), Arc::new(ManualClock::at(T0)));
    first.ready().await;
    first.set_duration(20);
    first.set_cycles_before_long_break(6);
    first.toggle_haptics();
    first.flush().await;
    let written = first.snapshot();

    let second = TimerMachine::with_clock(document, Arc::new(ManualClock::at(T0 + 60_000)));
    second.ready().await;
    assert_eq!(second.snapshot(), written);
}

#[tokio::test]
async fn test_running_segment_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let document = document_in(&dir);
    document
        .set(
            TIMER_STORE,
            json!({
                "currentPhase": "focus",
                "duration": 1500,
                "timeLeft": 600,
                "isRunning": true,
                "startTimestamp": T0,
                PERSIST_VERSION_KEY: 3,
            }),
        )
        .unwrap();

    // 8.5s of wall time passed while no process was alive.
    let machine = TimerMachine::with_clock(document, Arc::new(ManualClock::at(T0 + 8_500)));
    machine.ready().await;

    let state = machine.snapshot();
    assert!(state.is_running);
    assert_eq!(state.time_left, 592);
    assert_eq!(state.start_timestamp, Some(T0 + 8_000));
}

#[tokio::test]
async fn test_restart_after_the_end_instant_completes_the_phase() {
    let dir = tempfile::tempdir().unwrap();
    let document = document_in(&dir);
    document
        .set(
            TIMER_STORE,
            json!({
                "currentPhase": "focus",
                "duration": 1500,
                "timeLeft": 60,
                "isRunning": true,
                "startTimestamp": T0,
                PERSIST_VERSION_KEY: 3,
            }),
        )
        .unwrap();

    let machine = TimerMachine::with_clock(document, Arc::new(ManualClock::at(T0 + 600_000)));
    machine.ready().await;

    let state = machine.snapshot();
    assert_eq!(state.current_phase, Phase::ShortBreak);
    assert_eq!(state.completed_focus_sessions, 1);
    assert!(!state.is_running);
    assert_eq!(state.time_left, 300);
}

#[tokio::test]
async fn test_completion_during_rehydration_reaches_an_early_listener() {
    let dir = tempfile::tempdir().unwrap();
    let document = document_in(&dir);
    document
        .set(
            TIMER_STORE,
            json!({
                "currentPhase": "focus",
                "duration": 1500,
                "timeLeft": 60,
                "isRunning": true,
                "startTimestamp": T0,
                PERSIST_VERSION_KEY: 3,
            }),
        )
        .unwrap();

    let machine = TimerMachine::with_clock(document, Arc::new(ManualClock::at(T0 + 600_000)));
    let completions = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&completions);
    // Registered before the load settles.
    machine.on_event(move |event| {
        if matches!(event, TimerEvent::PhaseCompleted { .. }) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    machine.ready().await;

    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(machine.snapshot().current_phase, Phase::ShortBreak);
}

#[tokio::test]
async fn test_v1_blob_migrates_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let document = document_in(&dir);
    document
        .set(
            TIMER_STORE,
            json!({ "duration": 1500, "timeLeft": 900, PERSIST_VERSION_KEY: 1 }),
        )
        .unwrap();

    let machine = TimerMachine::with_clock(document.clone(), Arc::new(ManualClock::at(T0)));
    machine.ready().await;

    let state = machine.snapshot();
    assert_eq!(state.duration, 1500);
    assert_eq!(state.time_left, 900);
    assert_eq!(state.current_phase, Phase::Focus);
    assert_eq!(state.phase_durations.focus, 1500);
    assert_eq!(state.phase_durations.short_break, 300);
    assert_eq!(state.phase_durations.long_break, 900);
    assert_eq!(state.completed_focus_sessions, 0);
    assert_eq!(state.cycles_before_long_break, 4);
    assert!(state.notifications_enabled);
    assert!(state.haptics_enabled);

    // The next write re-tags the blob at the current version.
    machine.set_duration(10);
    machine.flush().await;
    let blob = document.get(TIMER_STORE).unwrap().unwrap();
    assert_eq!(blob[PERSIST_VERSION_KEY], 3);
}

#[tokio::test]
async fn test_partial_blob_keeps_defaults_for_omitted_fields() {
    let dir = tempfile::tempdir().unwrap();
    let document = document_in(&dir);
    document
        .set(
            TIMER_STORE,
            json!({ "timeLeft": 42, "hapticsEnabled": false, PERSIST_VERSION_KEY: 3 }),
        )
        .unwrap();

    let machine = TimerMachine::with_clock(document, Arc::new(ManualClock::at(T0)));
    machine.ready().await;

    let state = machine.snapshot();
    assert_eq!(state.time_left, 42);
    assert!(!state.haptics_enabled);
    assert_eq!(state.duration, 1500);
    assert!(state.notifications_enabled);
    assert_eq!(state.current_phase, Phase::Focus);
}

#[tokio::test]
async fn test_settings_version_mismatch_discards_the_blob() {
    let dir = tempfile::tempdir().unwrap();
    let document = document_in(&dir);
    document
        .set(
            SETTINGS_STORE,
            json!({ "theme": "crimson", PERSIST_VERSION_KEY: 99 }),
        )
        .unwrap();

    let (store, mut ready) = settings_store(document);
    ready.wait_for(|settled| *settled).await.unwrap();
    assert_eq!(store.get().theme, "zinc-light");
}

#[tokio::test]
async fn test_timer_and_settings_share_one_document() {
    let dir = tempfile::tempdir().unwrap();
    let document = document_in(&dir);

    let machine = TimerMachine::with_clock(document.clone(), Arc::new(ManualClock::at(T0)));
    machine.ready().await;
    machine.set_duration(10);
    machine.flush().await;

    let (settings, mut ready) = settings_store(document.clone());
    ready.wait_for(|settled| *settled).await.unwrap();
    settings.update(|s| s.theme = "slate-dark".to_string());
    settings.flush().await;

    let timer_blob = document.get(TIMER_STORE).unwrap().unwrap();
    assert_eq!(timer_blob["duration"], 600);
    let settings_blob = document.get(SETTINGS_STORE).unwrap().unwrap();
    assert_eq!(settings_blob["theme"], "slate-dark");
}

#[tokio::test]
async fn test_corrupt_document_leaves_defaults_and_recovers_on_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, "{not json").unwrap();
    let document = StoreDocument::open(&path);

    let machine = TimerMachine::with_clock(document.clone(), Arc::new(ManualClock::at(T0)));
    machine.ready().await;
    assert_eq!(machine.snapshot(), TimerState::default());

    machine.set_duration(10);
    machine.flush().await;
    let blob = document.get(TIMER_STORE).unwrap().unwrap();
    assert_eq!(blob["duration"], 600);
}
