use std::path::PathBuf;
use std::time::Duration;

use clap::{Subcommand, ValueEnum};
use pacer_core::{Phase, TimerMachine};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the current phase (re-anchors when already running)
    Start,
    /// Stop and freeze the remaining time
    Stop,
    /// Restore the current phase's configured duration
    Reset,
    /// Finish the current phase and move to the next one
    Skip,
    /// Print current timer state as JSON
    Status,
    /// Stream events and a live status line until interrupted
    Watch,
    /// Set a phase duration in minutes (0 puts the phase in stopwatch mode)
    Set {
        /// Duration in minutes; negative values clamp to 0
        #[arg(long, allow_negative_numbers = true)]
        minutes: i64,
        /// Phase to edit (defaults to the current one)
        #[arg(long, value_enum)]
        phase: Option<PhaseArg>,
    },
    /// Switch the current phase
    Phase {
        #[arg(value_enum)]
        phase: PhaseArg,
    },
    /// Flip notifications or haptics
    Toggle {
        #[arg(value_enum)]
        flag: ToggleFlag,
    },
    /// Start the next phase automatically when one completes
    AutoStart {
        #[arg(value_enum)]
        mode: OnOff,
    },
    /// Focus sessions per long break (minimum 1)
    Cycles { count: u32 },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PhaseArg {
    Focus,
    Short,
    Long,
}

impl From<PhaseArg> for Phase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Focus => Phase::Focus,
            PhaseArg::Short => Phase::ShortBreak,
            PhaseArg::Long => Phase::LongBreak,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ToggleFlag {
    Notifications,
    Haptics,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

pub async fn run(
    action: TimerAction,
    store: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let document = super::open_document(store)?;
    let machine = TimerMachine::new(document);
    // Events fired during rehydration reach only listeners registered
    // beforehand.
    if matches!(action, TimerAction::Watch) {
        machine.on_event(|event| {
            if let Ok(json) = serde_json::to_string(event) {
                println!("{json}");
            }
        });
    }
    machine.ready().await;

    match action {
        TimerAction::Start => {
            let event = machine.start_timer();
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        TimerAction::Stop => match machine.stop_timer() {
            Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
            None => println!("{}", serde_json::to_string_pretty(&machine.snapshot())?),
        },
        TimerAction::Reset => {
            let event = machine.reset_timer();
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        TimerAction::Skip => {
            let event = machine.complete_phase();
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        TimerAction::Status => {
            println!("{}", serde_json::to_string_pretty(&machine.snapshot())?);
        }
        TimerAction::Watch => watch(&machine).await,
        TimerAction::Set { minutes, phase } => {
            let event = match phase {
                Some(phase) => machine.set_phase_duration(phase.into(), minutes),
                None => machine.set_duration(minutes),
            };
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        TimerAction::Phase { phase } => {
            let event = machine.set_current_phase(phase.into());
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        TimerAction::Toggle { flag } => {
            let (key, enabled) = match flag {
                ToggleFlag::Notifications => {
                    ("notificationsEnabled", machine.toggle_notifications())
                }
                ToggleFlag::Haptics => ("hapticsEnabled", machine.toggle_haptics()),
            };
            println!("{{\"{key}\": {enabled}}}");
        }
        TimerAction::AutoStart { mode } => {
            let enabled = matches!(mode, OnOff::On);
            machine.set_auto_start_next_phase(enabled);
            println!("{{\"autoStartNextPhase\": {enabled}}}");
        }
        TimerAction::Cycles { count } => {
            let applied = machine.set_cycles_before_long_break(count);
            println!("{{\"cyclesBeforeLongBreak\": {applied}}}");
        }
    }

    machine.flush().await;
    Ok(())
}

/// Print a status line whenever it changes, until interrupted. Event
/// JSON lines come from the listener `run` installs up front.
async fn watch(machine: &TimerMachine) -> ! {
    machine.resume_ticking();

    let mut last = String::new();
    loop {
        let state = machine.snapshot();
        let status = if state.is_running { "running" } else { "stopped" };
        let line = format!(
            "{} {} {}",
            phase_label(state.current_phase),
            format_clock(state.time_left),
            status,
        );
        if line != last {
            println!("[{}] {line}", chrono::Local::now().format("%H:%M:%S"));
            last = line;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Focus => "focus",
        Phase::ShortBreak => "short-break",
        Phase::LongBreak => "long-break",
    }
}

fn format_clock(total_secs: u64) -> String {
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
