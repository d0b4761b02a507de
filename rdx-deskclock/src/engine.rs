//! The coordinator that owns the engines and drives them from heartbeats.

use crate::common::{EpochMs, HeartbeatId};
use crate::components::alarm::{
    parse_alarm_time, AlarmConfig, AlarmPhase, AlarmScheduler, AlarmTransition,
};
use crate::components::heartbeat::HeartbeatRegistry;
use crate::components::mode::{Mode, ModeCycler};
use crate::components::stopwatch::{StopwatchEngine, StopwatchState, StopwatchTransition};
use crate::components::timer::{TimerEngine, TimerState, TimerTransition};
use crate::config::DeskClockConfig;
use crate::display::{AmbientReading, DisplayFrame, FrameContext, Preferences};
use crate::error::DeskClockError;
use crate::events::{AlarmEvent, ModeEvent, StopwatchEvent, SystemEvent, TimerEvent};
use crate::format::{self, DisplayZone};
use crate::store::{keys, JsonFileStore, Store};
use crate::time::{ClockSnapshot, SystemTimeSource, TimeSource};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, trace};

/// The main Deskclock engine.
///
/// Holds the stopwatch, timer, alarm and mode cycler behind a single lock.
/// Every heartbeat and every public operation takes that lock, so beats and
/// user actions are applied one at a time, each against a single `now`.
/// The engine is cheap to clone; clones are handles to the same instance.
/// Heartbeats only hold a [`WeakEngine`], so dropping the last handle tears
/// down every task even without [`DeskClockEngine::shutdown`].
#[derive(Clone)]
pub struct DeskClockEngine {
    shared: Arc<Shared>,
    core: Arc<Mutex<CoreState>>,
}

/// Everything except the mutable state. Nothing in here refers back to the core.
struct Shared {
    config: DeskClockConfig,
    zone: DisplayZone,
    clock: Arc<dyn TimeSource>,
    store: Store,
    system_event_sender: broadcast::Sender<SystemEvent>,
    stopwatch_event_sender: broadcast::Sender<StopwatchEvent>,
    timer_event_sender: broadcast::Sender<TimerEvent>,
    alarm_event_sender: broadcast::Sender<AlarmEvent>,
    mode_event_sender: broadcast::Sender<ModeEvent>,
    frame_sender: broadcast::Sender<Arc<DisplayFrame>>,
}

/// The handle captured by heartbeat tasks.
#[derive(Clone)]
struct WeakEngine {
    shared: Arc<Shared>,
    core: Weak<Mutex<CoreState>>,
}

impl WeakEngine {
    fn upgrade(&self) -> Option<DeskClockEngine> {
        Some(DeskClockEngine {
            shared: self.shared.clone(),
            core: self.core.upgrade()?,
        })
    }
}

struct CoreState {
    preferences: Preferences,
    ambient: AmbientReading,
    stopwatch: StopwatchEngine,
    timer: TimerEngine,
    alarm: AlarmScheduler,
    modes: ModeCycler,
    tick_count: u64,
    heartbeats: HeartbeatRegistry,
    slots: BeatSlots,
}

/// The heartbeat each engine currently owns, if any.
#[derive(Debug, Default)]
struct BeatSlots {
    clock: Option<HeartbeatId>,
    stopwatch: Option<HeartbeatId>,
    timer: Option<HeartbeatId>,
    auto_cycle: Option<HeartbeatId>,
    alarm_silence: Option<HeartbeatId>,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Clock,
    Stopwatch,
    Timer,
    AutoCycle,
    AlarmSilence,
}

impl Slot {
    fn label(self) -> &'static str {
        match self {
            Slot::Clock => "clock",
            Slot::Stopwatch => "stopwatch",
            Slot::Timer => "timer",
            Slot::AutoCycle => "auto-cycle",
            Slot::AlarmSilence => "alarm-silence",
        }
    }
}

impl BeatSlots {
    fn get_mut(&mut self, slot: Slot) -> &mut Option<HeartbeatId> {
        match slot {
            Slot::Clock => &mut self.clock,
            Slot::Stopwatch => &mut self.stopwatch,
            Slot::Timer => &mut self.timer,
            Slot::AutoCycle => &mut self.auto_cycle,
            Slot::AlarmSilence => &mut self.alarm_silence,
        }
    }
}

// Core implementation block for internal logic.
impl DeskClockEngine {
    /// Creates an engine, restoring persisted values from `store`.
    ///
    /// The stopwatch and timer always come back paused: a closed session may
    /// have lost any amount of wall-clock time, so nothing resumes on its own.
    pub fn new(config: DeskClockConfig, clock: Arc<dyn TimeSource>, store: Store) -> Self {
        const FRAME_CAPACITY: usize = 64;
        let (system_event_sender, _) = broadcast::channel(64);
        let (stopwatch_event_sender, _) = broadcast::channel(64);
        let (timer_event_sender, _) = broadcast::channel(64);
        let (alarm_event_sender, _) = broadcast::channel(64);
        let (mode_event_sender, _) = broadcast::channel(64);
        let (frame_sender, _) = broadcast::channel(FRAME_CAPACITY);

        let preferences = Preferences {
            is_24h: store.load_or(keys::IS_24H, true),
            is_celsius: store.load_or(keys::IS_CELSIUS, true),
            auto_mode_enabled: store.load_or(keys::AUTO_MODE_ENABLED, false),
        };
        let mut alarm_config: AlarmConfig = store.load_or(keys::ALARM, AlarmConfig::default());
        match parse_alarm_time(&alarm_config.time) {
            Some(time) => alarm_config.time = time,
            None => alarm_config = AlarmConfig::default(),
        }
        let stopwatch = StopwatchEngine::restore(store.load_or(keys::STOPWATCH_ELAPSED_MS, 0));
        let timer = TimerEngine::restore(
            store.load_or(keys::TIMER_REMAINING_MS, 0),
            config.alarm.timer_flash_ms(),
        );
        info!(
            stopwatch_ms = stopwatch.state().accumulated_ms,
            timer_ms = timer.state().remaining_ms,
            alarm_enabled = alarm_config.enabled,
            alarm_time = %alarm_config.time,
            "Restored persisted state."
        );

        let core = CoreState {
            preferences,
            ambient: AmbientReading::default(),
            stopwatch,
            timer,
            alarm: AlarmScheduler::new(alarm_config, config.alarm.ring_ms()),
            modes: ModeCycler::new(preferences.auto_mode_enabled),
            tick_count: 0,
            heartbeats: HeartbeatRegistry::new(),
            slots: BeatSlots::default(),
        };

        Self {
            shared: Arc::new(Shared {
                zone: DisplayZone::from(config.display.timezone),
                config,
                clock,
                store,
                system_event_sender,
                stopwatch_event_sender,
                timer_event_sender,
                alarm_event_sender,
                mode_event_sender,
                frame_sender,
            }),
            core: Arc::new(Mutex::new(core)),
        }
    }

    /// Builds an engine on the system clock, with the store named in `config`.
    pub fn with_system_clock(config: DeskClockConfig) -> Self {
        let store = match &config.storage.path {
            Some(path) => Store::new(JsonFileStore::open(path)),
            None => Store::in_memory(),
        };
        Self::new(config, Arc::new(SystemTimeSource), store)
    }

    /// Loads configuration from `path` and builds a system-clock engine.
    pub fn from_config_file(path: Option<&Path>) -> Result<Self, DeskClockError> {
        Ok(Self::with_system_clock(DeskClockConfig::load(path)?))
    }

    /// Starts the clock heartbeat, plus auto-cycling when enabled and the
    /// beat of any stopwatch or timer still running from before a shutdown.
    pub async fn start(&self) {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        self.ensure_beat(core, Slot::Clock, self.shared.config.heartbeats.clock_period(), |engine| async move {
            engine.clock_tick().await
        });
        if core.modes.auto_enabled() {
            self.ensure_auto_cycle(core);
        }
        if core.stopwatch.is_running() {
            self.ensure_stopwatch_beat(core);
        }
        if core.timer.is_running() {
            self.ensure_timer_beat(core);
        }
        self.shared.system_event_sender
            .send(SystemEvent::EngineStarted {
                timestamp: self.shared.clock.now_ms(),
            })
            .ok();
    }

    /// Cancels every heartbeat and deadline job. A running stopwatch or timer
    /// keeps its anchor and gets its beat back on the next [`Self::start`].
    pub async fn shutdown(&self) {
        let mut core = self.core.lock().await;
        let cancelled = core.heartbeats.cancel_all();
        core.slots = BeatSlots::default();
        info!(cancelled, "All heartbeats cancelled.");
        self.shared.system_event_sender
            .send(SystemEvent::EngineShutdown)
            .ok();
    }

    /// Runs the engine until a shutdown signal is received.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("DeskClockEngine starting up...");
        self.start().await;
        info!(
            "Engine running with a {:?} clock heartbeat. Press Ctrl+C to shut down.",
            self.shared.config.heartbeats.clock_period()
        );
        tokio::signal::ctrl_c().await?;

        info!("Shutdown signal received. Cancelling heartbeats...");
        self.shutdown().await;
        info!("DeskClockEngine has shut down.");
        Ok(())
    }

    /// Registers `beat` in `slot` unless that slot already has a heartbeat.
    fn ensure_beat<F, Fut>(&self, core: &mut CoreState, slot: Slot, period: Duration, beat: F)
    where
        F: Fn(DeskClockEngine) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if core.slots.get_mut(slot).is_some() {
            return;
        }
        let engine = self.downgrade();
        let id = core.heartbeats.spawn_every(slot.label(), period, move || {
            let next = engine.upgrade().map(&beat);
            async move {
                if let Some(next) = next {
                    next.await;
                }
            }
        });
        *core.slots.get_mut(slot) = Some(id);
        self.shared.system_event_sender
            .send(SystemEvent::HeartbeatStarted {
                id,
                label: slot.label(),
            })
            .ok();
    }

    fn cancel_beat(&self, core: &mut CoreState, slot: Slot) {
        let CoreState {
            heartbeats, slots, ..
        } = core;
        if heartbeats.cancel_slot(slots.get_mut(slot)) {
            self.shared.system_event_sender
                .send(SystemEvent::HeartbeatCancelled { label: slot.label() })
                .ok();
        }
    }

    fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            shared: self.shared.clone(),
            core: Arc::downgrade(&self.core),
        }
    }

    fn ensure_stopwatch_beat(&self, core: &mut CoreState) {
        self.ensure_beat(
            core,
            Slot::Stopwatch,
            self.shared.config.heartbeats.stopwatch_period(),
            |engine| async move { engine.stopwatch_beat().await },
        );
    }

    fn ensure_timer_beat(&self, core: &mut CoreState) {
        self.ensure_beat(
            core,
            Slot::Timer,
            self.shared.config.heartbeats.timer_period(),
            |engine| async move { engine.timer_beat().await },
        );
    }

    fn ensure_auto_cycle(&self, core: &mut CoreState) {
        self.ensure_beat(
            core,
            Slot::AutoCycle,
            self.shared.config.heartbeats.auto_cycle_period(),
            |engine| async move { engine.auto_cycle_beat().await },
        );
    }

    fn render(&self, core: &CoreState, now: EpochMs) -> DisplayFrame {
        FrameContext {
            tick: core.tick_count,
            now,
            zone: self.shared.zone,
            active: core.modes.current(),
            preferences: &core.preferences,
            ambient: &core.ambient,
            stopwatch: &core.stopwatch,
            timer: &core.timer,
            alarm: &core.alarm,
        }
        .render()
    }

    fn publish_frame(&self, core: &CoreState, now: EpochMs) {
        self.shared.frame_sender
            .send(Arc::new(self.render(core, now)))
            .ok();
    }

    /// 1 Hz heartbeat: one snapshot feeds both the alarm check and the frame.
    pub(crate) async fn clock_tick(&self) {
        let ClockSnapshot { epoch_ms: now } = self.shared.clock.snapshot();
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        core.tick_count = core.tick_count.wrapping_add(1);
        trace!(tick = core.tick_count, now, "Clock tick.");

        if let Some(local) = self.shared.zone.localize(now) {
            let hhmm = format::hhmm(&local);
            if let Some(transition) = core.alarm.on_tick(&hhmm, now) {
                self.apply_alarm_transition(core, transition);
            }
        }
        self.publish_frame(core, now);
    }

    fn apply_alarm_transition(&self, core: &mut CoreState, transition: AlarmTransition) {
        match transition {
            AlarmTransition::Fired { time, at } => {
                info!(%time, "Alarm fired.");
                self.cancel_beat(core, Slot::AlarmSilence);
                let engine = self.downgrade();
                let ring = Duration::from_secs(self.shared.config.alarm.ring_seconds);
                let id = core.heartbeats.spawn_once(Slot::AlarmSilence.label(), ring, async move {
                    if let Some(engine) = engine.upgrade() {
                        engine.alarm_time_out().await;
                    }
                });
                core.slots.alarm_silence = Some(id);
                self.shared.alarm_event_sender
                    .send(AlarmEvent::Fired { time, at })
                    .ok();
            }
            AlarmTransition::Silenced { reason } => {
                info!(?reason, "Alarm silenced.");
                self.cancel_beat(core, Slot::AlarmSilence);
                self.shared.alarm_event_sender
                    .send(AlarmEvent::Silenced { reason })
                    .ok();
            }
        }
    }

    /// Deadline job scheduled when the alarm fires.
    pub(crate) async fn alarm_time_out(&self) {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        if let Some(transition) = core.alarm.time_out() {
            self.apply_alarm_transition(core, transition);
        }
    }

    /// 10 Hz heartbeat while the stopwatch runs.
    pub(crate) async fn stopwatch_beat(&self) {
        let now = self.shared.clock.now_ms();
        let mut core = self.core.lock().await;
        let Some(elapsed_ms) = core.stopwatch.beat(now) else {
            return;
        };
        trace!(elapsed_ms, "Stopwatch beat.");
        self.shared.store.save(keys::STOPWATCH_ELAPSED_MS, &elapsed_ms);
        self.publish_frame(&core, now);
    }

    /// 4 Hz heartbeat while the timer runs.
    pub(crate) async fn timer_beat(&self) {
        let now = self.shared.clock.now_ms();
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        let transition = core.timer.beat(now);
        if transition.is_none() && !core.timer.is_running() {
            return;
        }
        let remaining_ms = core.timer.state().remaining_ms;
        trace!(remaining_ms, "Timer beat.");
        self.shared.store.save(keys::TIMER_REMAINING_MS, &remaining_ms);
        if let Some(TimerTransition::Expired { at }) = transition {
            info!("Timer expired.");
            self.cancel_beat(core, Slot::Timer);
            self.shared.timer_event_sender
                .send(TimerEvent::Expired { at })
                .ok();
        }
        self.publish_frame(core, now);
    }

    /// 5 s heartbeat while auto-cycling is enabled.
    pub(crate) async fn auto_cycle_beat(&self) {
        let now = self.shared.clock.now_ms();
        let mut core = self.core.lock().await;
        if !core.modes.auto_enabled() {
            return;
        }
        let mode = core.modes.auto_advance();
        trace!(%mode, "Auto-cycle beat.");
        self.shared.mode_event_sender
            .send(ModeEvent {
                mode,
                automatic: true,
            })
            .ok();
        self.publish_frame(&core, now);
    }

    fn apply_timer_start(&self, core: &mut CoreState, transition: Option<TimerTransition>) {
        if let Some(TimerTransition::Started { remaining_ms }) = transition {
            info!(remaining_ms, "Timer started.");
            self.ensure_timer_beat(core);
            self.shared.store.save(keys::TIMER_REMAINING_MS, &remaining_ms);
            self.shared.timer_event_sender
                .send(TimerEvent::Started { remaining_ms })
                .ok();
        }
    }
}

// Public API implementation block.
impl DeskClockEngine {
    /// Advances to the next of the five modes.
    pub async fn cycle_mode(&self) -> Mode {
        let now = self.shared.clock.now_ms();
        let mut core = self.core.lock().await;
        let mode = core.modes.cycle();
        info!(%mode, "Mode changed.");
        self.shared.mode_event_sender
            .send(ModeEvent {
                mode,
                automatic: false,
            })
            .ok();
        self.publish_frame(&core, now);
        mode
    }

    /// Enables or disables auto-cycling through TIME, DATE and TEMP.
    pub async fn set_auto_cycle(&self, enabled: bool) {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        core.modes.set_auto(enabled);
        core.preferences.auto_mode_enabled = enabled;
        self.shared.store.save(keys::AUTO_MODE_ENABLED, &enabled);
        if enabled {
            self.ensure_auto_cycle(core);
        } else {
            self.cancel_beat(core, Slot::AutoCycle);
        }
        info!(enabled, "Auto-cycle toggled.");
    }

    /// Toggles between running and paused.
    pub async fn stopwatch_start_pause(&self) -> StopwatchState {
        let now = self.shared.clock.now_ms();
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        match core.stopwatch.start_pause(now) {
            StopwatchTransition::Started { elapsed_ms } => {
                info!(elapsed_ms, "Stopwatch started.");
                self.ensure_stopwatch_beat(core);
                self.shared.store.save(keys::STOPWATCH_ELAPSED_MS, &elapsed_ms);
                self.shared.stopwatch_event_sender
                    .send(StopwatchEvent::Started { elapsed_ms })
                    .ok();
            }
            StopwatchTransition::Paused { elapsed_ms } => {
                info!(elapsed_ms, "Stopwatch paused.");
                self.cancel_beat(core, Slot::Stopwatch);
                self.shared.store.save(keys::STOPWATCH_ELAPSED_MS, &elapsed_ms);
                self.shared.stopwatch_event_sender
                    .send(StopwatchEvent::Paused { elapsed_ms })
                    .ok();
            }
        }
        self.publish_frame(core, now);
        core.stopwatch.state()
    }

    pub async fn stopwatch_reset(&self) -> StopwatchState {
        let now = self.shared.clock.now_ms();
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        self.cancel_beat(core, Slot::Stopwatch);
        core.stopwatch.reset();
        self.shared.store.save(keys::STOPWATCH_ELAPSED_MS, &0_i64);
        info!("Stopwatch reset.");
        self.shared.stopwatch_event_sender
            .send(StopwatchEvent::Reset)
            .ok();
        self.publish_frame(core, now);
        core.stopwatch.state()
    }

    /// Starts a countdown. Non-positive durations are ignored.
    pub async fn timer_start(&self, duration_ms: i64) -> TimerState {
        let now = self.shared.clock.now_ms();
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        let transition = core.timer.start(duration_ms, now);
        self.apply_timer_start(core, transition);
        self.publish_frame(core, now);
        core.timer.state()
    }

    /// Continues a paused countdown from its frozen remaining time.
    pub async fn timer_resume(&self) -> TimerState {
        let now = self.shared.clock.now_ms();
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        let transition = core.timer.resume(now);
        self.apply_timer_start(core, transition);
        self.publish_frame(core, now);
        core.timer.state()
    }

    /// Starts over with the last configured duration.
    pub async fn timer_restart(&self) -> TimerState {
        let now = self.shared.clock.now_ms();
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        self.cancel_beat(core, Slot::Timer);
        let transition = core.timer.restart(now);
        self.apply_timer_start(core, transition);
        self.publish_frame(core, now);
        core.timer.state()
    }

    pub async fn timer_pause(&self) -> TimerState {
        let now = self.shared.clock.now_ms();
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        if let Some(TimerTransition::Paused { remaining_ms }) = core.timer.pause(now) {
            info!(remaining_ms, "Timer paused.");
            self.cancel_beat(core, Slot::Timer);
            self.shared.store.save(keys::TIMER_REMAINING_MS, &remaining_ms);
            self.shared.timer_event_sender
                .send(TimerEvent::Paused { remaining_ms })
                .ok();
            self.publish_frame(core, now);
        }
        core.timer.state()
    }

    /// Zeroes the timer and drops any pending expiry overlay.
    pub async fn timer_reset(&self) -> TimerState {
        let now = self.shared.clock.now_ms();
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        self.cancel_beat(core, Slot::Timer);
        core.timer.reset();
        self.shared.store.save(keys::TIMER_REMAINING_MS, &0_i64);
        info!("Timer reset.");
        self.shared.timer_event_sender.send(TimerEvent::Reset).ok();
        self.publish_frame(core, now);
        core.timer.state()
    }

    /// Saves the alarm schedule. `time` must be a 24-hour `HH:MM`.
    pub async fn alarm_save(&self, enabled: bool, time: &str) -> Result<AlarmConfig, DeskClockError> {
        let time =
            parse_alarm_time(time).ok_or_else(|| DeskClockError::InvalidAlarmTime(time.to_string()))?;
        let config = AlarmConfig { enabled, time };
        let now = self.shared.clock.now_ms();
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        let transition = core.alarm.configure(config.clone());
        self.shared.store.save(keys::ALARM, &config);
        info!(enabled, time = %config.time, "Alarm saved.");
        self.shared.alarm_event_sender
            .send(AlarmEvent::Configured {
                enabled,
                time: config.time.clone(),
            })
            .ok();
        if let Some(transition) = transition {
            self.apply_alarm_transition(core, transition);
        }
        self.publish_frame(core, now);
        Ok(config)
    }

    /// Silences a ringing alarm. Does nothing otherwise.
    pub async fn alarm_stop(&self) -> bool {
        let now = self.shared.clock.now_ms();
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        match core.alarm.stop(now) {
            Some(transition) => {
                self.apply_alarm_transition(core, transition);
                self.publish_frame(core, now);
                true
            }
            None => false,
        }
    }

    pub async fn set_24h(&self, is_24h: bool) {
        let now = self.shared.clock.now_ms();
        let mut core = self.core.lock().await;
        core.preferences.is_24h = is_24h;
        self.shared.store.save(keys::IS_24H, &is_24h);
        self.publish_frame(&core, now);
    }

    pub async fn set_celsius(&self, is_celsius: bool) {
        let now = self.shared.clock.now_ms();
        let mut core = self.core.lock().await;
        core.preferences.is_celsius = is_celsius;
        self.shared.store.save(keys::IS_CELSIUS, &is_celsius);
        self.publish_frame(&core, now);
    }

    /// Accepts the latest reading from the external weather fetcher.
    pub async fn set_ambient(&self, reading: AmbientReading) {
        let mut core = self.core.lock().await;
        core.ambient = reading;
    }

    /// Renders a frame for the current instant without waiting for a tick.
    pub async fn snapshot(&self) -> DisplayFrame {
        let now = self.shared.clock.now_ms();
        let core = self.core.lock().await;
        self.render(&core, now)
    }

    pub async fn stopwatch_state(&self) -> StopwatchState {
        self.core.lock().await.stopwatch.state()
    }

    pub async fn timer_state(&self) -> TimerState {
        self.core.lock().await.timer.state()
    }

    pub async fn alarm_phase(&self) -> AlarmPhase {
        self.core.lock().await.alarm.phase()
    }

    pub async fn alarm_config(&self) -> AlarmConfig {
        self.core.lock().await.alarm.config().clone()
    }

    pub async fn current_mode(&self) -> Mode {
        self.core.lock().await.modes.current()
    }

    pub async fn preferences(&self) -> Preferences {
        self.core.lock().await.preferences
    }

    /// Labels of the heartbeats and deadline jobs currently registered.
    pub async fn active_heartbeats(&self) -> Vec<&'static str> {
        let mut labels = self.core.lock().await.heartbeats.labels();
        labels.sort_unstable();
        labels
    }

    pub fn config(&self) -> &DeskClockConfig {
        &self.shared.config
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.shared.system_event_sender.subscribe()
    }

    /// Subscribes to the `StopwatchEvent` stream.
    pub fn subscribe_stopwatch_events(&self) -> broadcast::Receiver<StopwatchEvent> {
        self.shared.stopwatch_event_sender.subscribe()
    }

    /// Subscribes to the `TimerEvent` stream.
    pub fn subscribe_timer_events(&self) -> broadcast::Receiver<TimerEvent> {
        self.shared.timer_event_sender.subscribe()
    }

    /// Subscribes to the `AlarmEvent` stream.
    pub fn subscribe_alarm_events(&self) -> broadcast::Receiver<AlarmEvent> {
        self.shared.alarm_event_sender.subscribe()
    }

    /// Subscribes to the `ModeEvent` stream.
    pub fn subscribe_mode_events(&self) -> broadcast::Receiver<ModeEvent> {
        self.shared.mode_event_sender.subscribe()
    }

    /// Subscribes to rendered display frames.
    pub fn subscribe_frames(&self) -> broadcast::Receiver<Arc<DisplayFrame>> {
        self.shared.frame_sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::alarm::SilenceReason;
    use crate::config::DisplayConfig;
    use crate::display::Overlay;
    use crate::time::ManualTimeSource;
    use chrono_tz::Tz;

    // 07:30:00 UTC on 2026-10-18.
    const AT_0730: EpochMs = 1_792_308_600_000;

    fn engine_at(now: EpochMs, store: Store) -> (DeskClockEngine, ManualTimeSource) {
        let clock = ManualTimeSource::new(now);
        let config = DeskClockConfig {
            display: DisplayConfig {
                timezone: Some(Tz::UTC),
            },
            ..Default::default()
        };
        let engine = DeskClockEngine::new(config, Arc::new(clock.clone()), store);
        (engine, clock)
    }

    fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn stopwatch_heartbeat_follows_running_state() {
        let store = Store::in_memory();
        let (engine, clock) = engine_at(AT_0730, store.clone());

        let state = engine.stopwatch_start_pause().await;
        assert!(state.running);
        assert_eq!(engine.active_heartbeats().await, vec!["stopwatch"]);

        clock.advance(1_500);
        let state = engine.stopwatch_start_pause().await;
        assert!(!state.running);
        assert_eq!(state.accumulated_ms, 1_500);
        assert!(engine.active_heartbeats().await.is_empty());
        assert_eq!(store.load_or(keys::STOPWATCH_ELAPSED_MS, -1_i64), 1_500);
    }

    #[tokio::test]
    async fn stopwatch_stays_true_to_wall_clock_when_beats_are_skipped() {
        let store = Store::in_memory();
        let (engine, clock) = engine_at(AT_0730, store.clone());
        engine.stopwatch_start_pause().await;

        // One late beat after a long stall stands in for dozens of missed ones.
        clock.advance(7_345);
        engine.stopwatch_beat().await;
        assert_eq!(store.load_or(keys::STOPWATCH_ELAPSED_MS, 0_i64), 7_345);

        clock.advance(55);
        engine.stopwatch_beat().await;
        assert_eq!(store.load_or(keys::STOPWATCH_ELAPSED_MS, 0_i64), 7_400);
        assert_eq!(engine.stopwatch_start_pause().await.accumulated_ms, 7_400);
    }

    #[tokio::test]
    async fn stale_stopwatch_beat_after_reset_changes_nothing() {
        let store = Store::in_memory();
        let (engine, clock) = engine_at(AT_0730, store.clone());
        engine.stopwatch_start_pause().await;
        clock.advance(3_000);
        engine.stopwatch_reset().await;

        clock.advance(3_000);
        engine.stopwatch_beat().await;
        assert_eq!(store.load_or(keys::STOPWATCH_ELAPSED_MS, -1_i64), 0);
        assert_eq!(engine.stopwatch_state().await, StopwatchState::default());
    }

    #[tokio::test]
    async fn backward_clock_jump_persists_zero_not_negative() {
        let store = Store::in_memory();
        let (engine, clock) = engine_at(AT_0730, store.clone());
        engine.stopwatch_start_pause().await;
        clock.advance(-5_000);
        engine.stopwatch_beat().await;
        assert_eq!(store.load_or(keys::STOPWATCH_ELAPSED_MS, -1_i64), 0);
    }

    #[tokio::test]
    async fn resets_are_idempotent() {
        let (engine, clock) = engine_at(AT_0730, Store::in_memory());
        engine.stopwatch_start_pause().await;
        engine.timer_start(10_000).await;
        clock.advance(2_000);

        let stopwatch_once = engine.stopwatch_reset().await;
        let timer_once = engine.timer_reset().await;
        assert_eq!(engine.stopwatch_reset().await, stopwatch_once);
        assert_eq!(engine.timer_reset().await, timer_once);
        assert_eq!(timer_once, TimerState::default());
        assert!(engine.active_heartbeats().await.is_empty());
    }

    #[tokio::test]
    async fn timer_pause_and_resume_continue_from_remaining() {
        let store = Store::in_memory();
        let (engine, clock) = engine_at(AT_0730, store.clone());
        engine.timer_start(5_000).await;
        assert_eq!(engine.active_heartbeats().await, vec!["timer"]);

        clock.advance(2_000);
        engine.timer_beat().await;
        let paused = engine.timer_pause().await;
        assert!(!paused.running);
        assert_eq!(paused.remaining_ms, 3_000);
        assert_eq!(store.load_or(keys::TIMER_REMAINING_MS, 0_i64), 3_000);
        assert!(engine.active_heartbeats().await.is_empty());

        clock.advance(30_000);
        let resumed = engine.timer_resume().await;
        assert!(resumed.running);
        assert_eq!(resumed.remaining_ms, 3_000);
        assert_eq!(resumed.end_epoch_ms, Some(AT_0730 + 32_000 + 3_000));
    }

    #[tokio::test]
    async fn ninety_second_timer_expires_exactly_once() {
        let store = Store::in_memory();
        let (engine, clock) = engine_at(AT_0730, store.clone());
        let mut timer_rx = engine.subscribe_timer_events();

        engine.timer_start(90_000).await;
        clock.advance(45_000);
        engine.timer_beat().await;
        clock.advance(45_000);
        engine.timer_beat().await;
        clock.advance(250);
        engine.timer_beat().await;

        let events = drain(&mut timer_rx);
        assert_eq!(
            events,
            vec![
                TimerEvent::Started {
                    remaining_ms: 90_000
                },
                TimerEvent::Expired {
                    at: AT_0730 + 90_000
                },
            ]
        );
        let state = engine.timer_state().await;
        assert!(!state.running);
        assert_eq!(state.remaining_ms, 0);
        assert_eq!(store.load_or(keys::TIMER_REMAINING_MS, -1_i64), 0);
        assert!(engine.active_heartbeats().await.is_empty());

        let frame = engine.snapshot().await;
        assert_eq!(frame.overlay, Some(Overlay::TimerExpired));
        assert_eq!(frame.panel(Mode::Timer).unwrap().primary_text, "01:30");

        clock.advance(5_000);
        assert_eq!(engine.snapshot().await.overlay, None);
    }

    #[tokio::test]
    async fn timer_reset_drops_pending_expiry_overlay() {
        let (engine, clock) = engine_at(AT_0730, Store::in_memory());
        engine.timer_start(1_000).await;
        clock.advance(1_000);
        engine.timer_beat().await;
        assert_eq!(engine.snapshot().await.overlay, Some(Overlay::TimerExpired));

        engine.timer_reset().await;
        assert_eq!(engine.snapshot().await.overlay, None);
    }

    #[tokio::test]
    async fn non_positive_timer_duration_is_ignored() {
        let (engine, _clock) = engine_at(AT_0730, Store::in_memory());
        let mut timer_rx = engine.subscribe_timer_events();
        assert_eq!(engine.timer_start(0).await, TimerState::default());
        assert_eq!(engine.timer_start(-10).await, TimerState::default());
        assert!(drain(&mut timer_rx).is_empty());
        assert!(engine.active_heartbeats().await.is_empty());
    }

    #[tokio::test]
    async fn timer_restart_reuses_configured_duration() {
        let (engine, clock) = engine_at(AT_0730, Store::in_memory());
        engine.timer_start(20_000).await;
        clock.advance(20_000);
        engine.timer_beat().await;

        let restarted = engine.timer_restart().await;
        assert!(restarted.running);
        assert_eq!(restarted.remaining_ms, 20_000);
        assert_eq!(engine.active_heartbeats().await, vec!["timer"]);
    }

    #[tokio::test]
    async fn alarm_rings_once_and_silences_after_a_minute() {
        let (engine, clock) = engine_at(AT_0730 - 1_000, Store::in_memory());
        let mut alarm_rx = engine.subscribe_alarm_events();
        engine.alarm_save(true, "07:30").await.unwrap();

        engine.clock_tick().await;
        assert_eq!(engine.alarm_phase().await, AlarmPhase::Armed);

        for _ in 0..60 {
            clock.advance(1_000);
            engine.clock_tick().await;
            assert!(matches!(engine.alarm_phase().await, AlarmPhase::Ringing { .. }));
        }
        assert_eq!(engine.active_heartbeats().await, vec!["alarm-silence"]);
        assert_eq!(engine.snapshot().await.overlay, Some(Overlay::AlarmRinging));

        clock.advance(1_000);
        engine.clock_tick().await;
        assert_eq!(engine.alarm_phase().await, AlarmPhase::Armed);
        assert!(engine.active_heartbeats().await.is_empty());

        let events = drain(&mut alarm_rx);
        assert_eq!(
            events,
            vec![
                AlarmEvent::Configured {
                    enabled: true,
                    time: "07:30".into()
                },
                AlarmEvent::Fired {
                    time: "07:30".into(),
                    at: AT_0730
                },
                AlarmEvent::Silenced {
                    reason: SilenceReason::TimedOut
                },
            ]
        );
    }

    #[tokio::test]
    async fn deadline_job_silences_a_ringing_alarm() {
        let (engine, _clock) = engine_at(AT_0730, Store::in_memory());
        engine.alarm_save(true, "07:30").await.unwrap();
        engine.clock_tick().await;
        assert!(matches!(engine.alarm_phase().await, AlarmPhase::Ringing { .. }));

        engine.alarm_time_out().await;
        assert_eq!(engine.alarm_phase().await, AlarmPhase::Armed);
        assert!(engine.active_heartbeats().await.is_empty());
    }

    #[tokio::test]
    async fn stop_and_disable_cancel_the_deadline_job() {
        let (engine, clock) = engine_at(AT_0730, Store::in_memory());
        engine.alarm_save(true, "07:30").await.unwrap();
        engine.clock_tick().await;

        assert!(engine.alarm_stop().await);
        assert!(!engine.alarm_stop().await);
        assert!(engine.active_heartbeats().await.is_empty());
        clock.advance(1_000);
        engine.clock_tick().await;
        assert_eq!(engine.alarm_phase().await, AlarmPhase::Armed);

        // Next day, same minute: rings again, then gets disabled mid-ring.
        clock.advance(86_400_000);
        engine.clock_tick().await;
        assert!(matches!(engine.alarm_phase().await, AlarmPhase::Ringing { .. }));
        engine.alarm_save(false, "07:30").await.unwrap();
        assert_eq!(engine.alarm_phase().await, AlarmPhase::Idle);
        assert!(engine.active_heartbeats().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_alarm_time_is_rejected() {
        let store = Store::in_memory();
        let (engine, _clock) = engine_at(AT_0730, store.clone());
        let err = engine.alarm_save(true, "25:99").await.unwrap_err();
        assert!(matches!(err, DeskClockError::InvalidAlarmTime(ref t) if t == "25:99"));
        assert_eq!(engine.alarm_config().await, AlarmConfig::default());
        assert_eq!(store.load_or(keys::ALARM, AlarmConfig::default()), AlarmConfig::default());
    }

    #[tokio::test]
    async fn persisted_values_restore_paused() {
        let store = Store::in_memory();
        store.save(keys::IS_24H, &false);
        store.save(keys::STOPWATCH_ELAPSED_MS, &12_345_i64);
        store.save(keys::TIMER_REMAINING_MS, &42_000_i64);
        store.save(
            keys::ALARM,
            &AlarmConfig {
                enabled: true,
                time: "6:05".into(),
            },
        );

        let (engine, _clock) = engine_at(AT_0730, store);
        let stopwatch = engine.stopwatch_state().await;
        assert!(!stopwatch.running);
        assert_eq!(stopwatch.accumulated_ms, 12_345);
        let timer = engine.timer_state().await;
        assert!(!timer.running);
        assert_eq!(timer.remaining_ms, 42_000);
        assert_eq!(engine.alarm_config().await.time, "06:05");
        assert_eq!(engine.alarm_phase().await, AlarmPhase::Armed);
        assert!(!engine.preferences().await.is_24h);
        assert!(engine.active_heartbeats().await.is_empty());
    }

    #[tokio::test]
    async fn unparseable_persisted_alarm_falls_back_to_default() {
        let store = Store::in_memory();
        store.save(
            keys::ALARM,
            &AlarmConfig {
                enabled: true,
                time: "noon".into(),
            },
        );
        let (engine, _clock) = engine_at(AT_0730, store);
        assert_eq!(engine.alarm_config().await, AlarmConfig::default());
        assert_eq!(engine.alarm_phase().await, AlarmPhase::Idle);
    }

    #[tokio::test]
    async fn auto_cycle_toggles_its_heartbeat_and_persists() {
        let store = Store::in_memory();
        let (engine, _clock) = engine_at(AT_0730, store.clone());
        let mut mode_rx = engine.subscribe_mode_events();

        engine.set_auto_cycle(true).await;
        assert!(store.load_or(keys::AUTO_MODE_ENABLED, false));
        assert_eq!(engine.active_heartbeats().await, vec!["auto-cycle"]);

        engine.auto_cycle_beat().await;
        assert_eq!(engine.current_mode().await, Mode::Date);
        assert_eq!(engine.cycle_mode().await, Mode::Temp);

        engine.set_auto_cycle(false).await;
        assert!(engine.active_heartbeats().await.is_empty());
        engine.auto_cycle_beat().await;
        assert_eq!(engine.current_mode().await, Mode::Temp);

        assert_eq!(
            drain(&mut mode_rx),
            vec![
                ModeEvent {
                    mode: Mode::Date,
                    automatic: true
                },
                ModeEvent {
                    mode: Mode::Temp,
                    automatic: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn clock_tick_publishes_a_frame_for_that_instant() {
        let (engine, _clock) = engine_at(AT_0730 + 9_000, Store::in_memory());
        let mut frames = engine.subscribe_frames();
        engine.set_ambient(AmbientReading {
            temperature_celsius: Some(18.3),
            location_status: "Porto".into(),
        })
        .await;

        engine.clock_tick().await;
        let frame = frames.try_recv().unwrap();
        assert_eq!(frame.tick, 1);
        assert_eq!(frame.now, AT_0730 + 9_000);
        assert_eq!(frame.active, Mode::Time);
        assert_eq!(frame.active_panel().unwrap().primary_text, "07:30:09");
        let temp = frame.panel(Mode::Temp).unwrap();
        assert_eq!((temp.primary_text.as_str(), temp.secondary_text.as_str()), ("18.3°C", "Porto"));

        engine.set_24h(false).await;
        engine.set_celsius(false).await;
        let frame = engine.snapshot().await;
        assert_eq!(frame.panel(Mode::Time).unwrap().primary_text, "7:30:09");
        assert_eq!(frame.panel(Mode::Temp).unwrap().primary_text, "64.9°F");
    }

    #[tokio::test]
    async fn start_and_shutdown_manage_all_heartbeats() {
        let store = Store::in_memory();
        store.save(keys::AUTO_MODE_ENABLED, &true);
        let (engine, _clock) = engine_at(AT_0730, store);
        let mut system_rx = engine.subscribe_system_events();

        engine.start().await;
        engine.start().await;
        engine.stopwatch_start_pause().await;
        assert_eq!(
            engine.active_heartbeats().await,
            vec!["auto-cycle", "clock", "stopwatch"]
        );

        engine.shutdown().await;
        assert!(engine.active_heartbeats().await.is_empty());

        let events = drain(&mut system_rx);
        assert!(matches!(events.first(), Some(SystemEvent::HeartbeatStarted { label: "clock", .. })));
        assert!(events.contains(&SystemEvent::EngineStarted { timestamp: AT_0730 }));
        assert_eq!(events.last(), Some(&SystemEvent::EngineShutdown));
    }

    #[tokio::test]
    async fn start_after_shutdown_rearms_running_engines() {
        let (engine, clock) = engine_at(AT_0730, Store::in_memory());
        let mut timer_rx = engine.subscribe_timer_events();
        engine.start().await;
        engine.timer_start(1_000).await;
        engine.stopwatch_start_pause().await;

        engine.shutdown().await;
        assert!(engine.active_heartbeats().await.is_empty());
        assert!(engine.timer_state().await.running);

        engine.start().await;
        assert_eq!(
            engine.active_heartbeats().await,
            vec!["clock", "stopwatch", "timer"]
        );

        clock.advance(1_000);
        engine.timer_beat().await;
        assert!(!engine.timer_state().await.running);
        assert!(drain(&mut timer_rx).contains(&TimerEvent::Expired { at: AT_0730 + 1_000 }));
        assert_eq!(engine.active_heartbeats().await, vec!["clock", "stopwatch"]);
    }

    #[tokio::test]
    async fn dropping_the_last_handle_releases_the_core() {
        let (engine, _clock) = engine_at(AT_0730, Store::in_memory());
        engine.start().await;
        engine.timer_start(60_000).await;
        engine.alarm_save(true, "07:30").await.unwrap();
        engine.clock_tick().await;
        assert!(engine.active_heartbeats().await.contains(&"alarm-silence"));

        let core = Arc::downgrade(&engine.core);
        drop(engine);
        assert!(core.upgrade().is_none());
    }
}
