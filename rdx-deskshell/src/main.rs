use anyhow::Result;
use colored::Colorize;
use deskclock::prelude::*;
use deskclock::{ENGINE_NAME, VERSION as LIB_VERSION};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct ShellHighlighter;

impl Highlighter for ShellHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    println!("{}", "  ┌─────────────┐".cyan());
    println!("{}", "  │  DESKCLOCK  │".cyan().bold());
    println!("{}", "  └─────────────┘".cyan());
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!(
        "{}",
        "\n    This software is provided 'as is', without warranty of any kind.\n    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.\n"
            .dimmed()
    );
}

/// Spawns listeners that print alarm and timer events, plus frames when watching.
fn spawn_event_listeners(engine: &DeskClockEngine, is_watching: Arc<AtomicBool>) {
    let mut alarm_rx = engine.subscribe_alarm_events();
    tokio::spawn(async move {
        while let Ok(event) = alarm_rx.recv().await {
            match event {
                AlarmEvent::Fired { time, .. } => println!(
                    "\n<-- {} Alarm for {} is ringing. Type 'alarm stop'.\n>> ",
                    "[ALARM]".red().bold(),
                    time
                ),
                AlarmEvent::Silenced { reason } => {
                    println!("\n<-- [ALARM] Silenced ({}).\n>> ", reason)
                }
                AlarmEvent::Configured { .. } => {}
            }
        }
    });

    let mut timer_rx = engine.subscribe_timer_events();
    tokio::spawn(async move {
        while let Ok(event) = timer_rx.recv().await {
            if let TimerEvent::Expired { .. } = event {
                println!("\n<-- {} Time is up!\n>> ", "[TIMER]".yellow().bold());
            }
        }
    });

    // Frame listener, controlled by the shared flag. Only clock ticks are shown.
    let mut frame_rx = engine.subscribe_frames();
    tokio::spawn(async move {
        let mut last_tick = 0;
        loop {
            let frame = match frame_rx.recv().await {
                Ok(frame) => frame,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            if frame.tick == last_tick || !is_watching.load(Ordering::Relaxed) {
                continue;
            }
            last_tick = frame.tick;
            if let Some(panel) = frame.active_panel() {
                println!("<-- {}", render_panel(panel, frame.overlay));
            }
        }
    });
}

fn render_panel(panel: &ModeSnapshot, overlay: Option<Overlay>) -> String {
    let badge = match overlay {
        Some(Overlay::AlarmRinging) => format!(" {}", "ALARM".red().bold()),
        Some(Overlay::TimerExpired) => format!(" {}", "TIME UP".yellow().bold()),
        None => String::new(),
    };
    format!(
        "[{:<9}] {} {}{}",
        panel.mode_label.cyan(),
        panel.primary_text.bold(),
        panel.secondary_text.dimmed(),
        badge
    )
}

/// Parses `90`, `90s`, `5m` or `1m30s` into milliseconds.
fn parse_duration_ms(input: &str) -> Option<i64> {
    let mut total: i64 = 0;
    let mut digits = String::new();
    for c in input.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'm' | 's' => {
                let value: i64 = digits.parse().ok()?;
                let unit = if c == 'm' { 60_000 } else { 1_000 };
                total = total.checked_add(value.checked_mul(unit)?)?;
                digits.clear();
            }
            _ => return None,
        }
    }
    if !digits.is_empty() {
        let value: i64 = digits.parse().ok()?;
        total = total.checked_add(value.checked_mul(1_000)?)?;
    }
    Some(total)
}

fn print_help() {
    println!("Available commands:");
    println!("  show                  - Prints the active mode's panel.");
    println!("  all                   - Prints every panel.");
    println!("  mode                  - Cycles to the next display mode.");
    println!("  auto on|off           - Auto-cycles TIME, DATE and TEMP every 5 seconds.");
    println!("  sw                    - Starts or pauses the stopwatch.");
    println!("  sw reset              - Resets the stopwatch.");
    println!("  timer start <D>       - Starts a countdown (e.g. 90, 5m, 1m30s).");
    println!("  timer pause|resume    - Pauses or resumes the countdown.");
    println!("  timer restart|reset   - Restarts with the last duration, or clears it.");
    println!("  alarm set <HH:MM>     - Enables the alarm at HH:MM.");
    println!("  alarm off|stop        - Disables the alarm, or silences it while ringing.");
    println!("  units 12h|24h|c|f     - Changes clock or temperature units.");
    println!("  temp <C> [status]     - Feeds a temperature reading (or 'temp none').");
    println!("  watch on|off          - Prints the active panel on every clock tick.");
    println!("  exit                  - Quits the shell.");
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let config_path = env::var("DESKCLOCK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("deskclock.toml"));
    let engine = DeskClockEngine::from_config_file(Some(&config_path))?;

    let is_watching = Arc::new(AtomicBool::new(false));
    spawn_event_listeners(&engine, is_watching.clone());

    info!("Starting {} heartbeats...", ENGINE_NAME);
    engine.start().await;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(ShellHighlighter));

    println!(
        "{} is running. Type 'help' for commands or 'exit' to quit.",
        ENGINE_NAME.cyan()
    );

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(_) => {
                println!("Exiting deskshell...");
                break;
            }
        };
        rl.add_history_entry(line.as_str())?;
        let args = line.split_whitespace().collect::<Vec<_>>();

        match args.as_slice() {
            [] => {}
            ["show"] => {
                let frame = engine.snapshot().await;
                if let Some(panel) = frame.active_panel() {
                    println!("--> {}", render_panel(panel, frame.overlay));
                }
            }
            ["all"] => {
                let frame = engine.snapshot().await;
                for panel in &frame.panels {
                    println!("--> {}", render_panel(panel, None));
                }
            }
            ["mode"] => {
                let mode = engine.cycle_mode().await;
                println!("--> Mode is now {}.", mode.to_string().cyan());
            }
            ["auto", "on"] => {
                engine.set_auto_cycle(true).await;
                println!("--> Auto-cycle enabled.");
            }
            ["auto", "off"] => {
                engine.set_auto_cycle(false).await;
                println!("--> Auto-cycle disabled.");
            }
            ["sw"] => {
                let state = engine.stopwatch_start_pause().await;
                let verb = if state.running { "running" } else { "paused" };
                println!("--> Stopwatch {}.", verb);
            }
            ["sw", "reset"] => {
                engine.stopwatch_reset().await;
                println!("--> Stopwatch reset.");
            }
            ["timer", "start", duration] => match parse_duration_ms(duration) {
                Some(ms) if ms > 0 => {
                    let state = engine.timer_start(ms).await;
                    println!("--> Timer running, {} ms left.", state.remaining_ms);
                }
                _ => println!("Error: '{}' is not a positive duration.", duration),
            },
            ["timer", "pause"] => {
                let state = engine.timer_pause().await;
                println!("--> Timer paused with {} ms left.", state.remaining_ms);
            }
            ["timer", "resume"] => {
                let state = engine.timer_resume().await;
                if state.running {
                    println!("--> Timer resumed, {} ms left.", state.remaining_ms);
                } else {
                    println!("--> Nothing to resume.");
                }
            }
            ["timer", "restart"] => {
                let state = engine.timer_restart().await;
                if state.running {
                    println!("--> Timer restarted from {} ms.", state.base_ms);
                } else {
                    println!("--> No previous duration to restart.");
                }
            }
            ["timer", "reset"] => {
                engine.timer_reset().await;
                println!("--> Timer reset.");
            }
            ["alarm", "set", time] => match engine.alarm_save(true, time).await {
                Ok(config) => println!("--> Alarm set for {}.", config.time.cyan()),
                Err(e) => println!("Error: {}", e),
            },
            ["alarm", "off"] => {
                let time = engine.alarm_config().await.time;
                match engine.alarm_save(false, &time).await {
                    Ok(_) => println!("--> Alarm disabled."),
                    Err(e) => println!("Error: {}", e),
                }
            }
            ["alarm", "stop"] => {
                if engine.alarm_stop().await {
                    println!("--> Alarm silenced.");
                } else {
                    println!("--> The alarm is not ringing.");
                }
            }
            ["units", "12h"] => engine.set_24h(false).await,
            ["units", "24h"] => engine.set_24h(true).await,
            ["units", "c"] => engine.set_celsius(true).await,
            ["units", "f"] => engine.set_celsius(false).await,
            ["temp", "none"] => {
                engine
                    .set_ambient(AmbientReading {
                        temperature_celsius: None,
                        location_status: "Unavailable".to_string(),
                    })
                    .await
            }
            ["temp", celsius, status @ ..] => match celsius.parse::<f64>() {
                Ok(value) => {
                    let location_status = if status.is_empty() {
                        "Manual reading".to_string()
                    } else {
                        status.join(" ")
                    };
                    engine
                        .set_ambient(AmbientReading {
                            temperature_celsius: Some(value),
                            location_status,
                        })
                        .await;
                    println!("--> Temperature set.");
                }
                Err(_) => println!("Error: '{}' is not a number.", celsius),
            },
            ["watch", "on"] => {
                is_watching.store(true, Ordering::Relaxed);
                println!("--> Watching clock ticks.");
            }
            ["watch", "off"] => {
                is_watching.store(false, Ordering::Relaxed);
                println!("--> Stopped watching clock ticks.");
            }
            ["help"] => print_help(),
            ["exit"] => break,
            _ => println!("Unknown command: '{}'. Type 'help'.", line.trim()),
        }
    }

    engine.shutdown().await;
    Ok(())
}
