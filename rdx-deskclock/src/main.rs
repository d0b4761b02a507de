use anyhow::Result;
use colored::Colorize;
use deskclock::prelude::*;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "deskclock.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging. RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // 2. Load configuration from the first argument, or ./deskclock.toml if present.
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let engine = DeskClockEngine::from_config_file(Some(&config_path))?;
    info!(config = %config_path.display(), "Configuration loaded.");

    // 3. Spawn concurrent tasks to listen to different event streams.
    spawn_event_listeners(&engine);

    // 4. Run the engine until Ctrl+C.
    engine.run().await?;

    Ok(())
}

/// Spawns several tasks, each subscribing to a different event stream from the engine.
fn spawn_event_listeners(engine: &DeskClockEngine) {
    // --- System Event Listener ---
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    // --- Alarm Listener ---
    let mut alarm_rx = engine.subscribe_alarm_events();
    tokio::spawn(async move {
        while let Ok(event) = alarm_rx.recv().await {
            match event {
                AlarmEvent::Fired { time, .. } => {
                    info!("{}", format!("[ALARM] => Ringing for {}", time).red().bold())
                }
                other => info!("[ALARM] => {:?}", other),
            }
        }
    });

    // --- Timer Listener ---
    let mut timer_rx = engine.subscribe_timer_events();
    tokio::spawn(async move {
        while let Ok(event) = timer_rx.recv().await {
            match event {
                TimerEvent::Expired { .. } => {
                    info!("{}", "[TIMER] => Time is up!".yellow().bold())
                }
                other => info!("[TIMER] => {:?}", other),
            }
        }
    });

    // --- Frame Listener: one line per clock tick for the active mode ---
    let mut frame_rx = engine.subscribe_frames();
    tokio::spawn(async move {
        let mut last_tick = 0;
        loop {
            let frame = match frame_rx.recv().await {
                Ok(frame) => frame,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            if frame.tick == last_tick {
                continue;
            }
            last_tick = frame.tick;
            if let Some(panel) = frame.active_panel() {
                info!(
                    "[{}] {} {}",
                    panel.mode_label.cyan(),
                    panel.primary_text.bold(),
                    panel.secondary_text.dimmed()
                );
            }
        }
    });
}
