//! # Playback Controller
//!
//! [`PlayerController`] owns one engine at a time and reconciles the
//! engine's asynchronous signals into a consistent, observable player state.
//!
//! ## Execution model
//!
//! The controller is single-threaded and cooperative. Nothing happens in the
//! background: engine signals are queued on a channel and deferred work
//! (ready callbacks, middleware builds, asynchronous errors) is queued on a
//! virtual-clock [`Scheduler`]. The host drives both by calling
//! [`advance`](PlayerController::advance) or
//! [`run_until_idle`](PlayerController::run_until_idle); engine signals are
//! always drained before the next task runs.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut player = PlayerController::builder()
//!     .config(PlayerConfig::builder().engine_order(["html5"]).build()?)
//!     .build()?;
//!
//! let mut events = player.subscribe();
//! player.src("https://cdn.example.com/movie.mp4");
//! let mut handle = player.play();
//! player.run_until_idle();
//!
//! assert_eq!(handle.try_resolution(), Some(PlayResolution::Started));
//! ```

mod commands;
mod events;
mod source;
pub mod state;

pub use state::{transition, PlaybackState, StateInput};

use crate::cache::PlayerCache;
use crate::config::PlayerConfig;
use crate::error::{MediaError, Result};
use crate::events::{EngineReceiver, EngineSignal, PlayerEvent};
use crate::middleware::{MiddlewareInstances, MiddlewareRegistry, Pipeline};
use crate::queue::{PlayQueue, RateGate};
use crate::registry::{EngineRegistry, PlayerId, PlayerRegistry};
use crate::scheduler::{Scheduler, TaskId, TaskOwner};
use crate::source::SourceDescriptor;
use crate::traits::PlaybackEngine;
use crate::tracks::{EngineTracks, TextTrackSnapshot, TrackSynchronizer};
use core_runtime::events::{EventBus, Receiver, DEFAULT_EVENT_BUFFER_SIZE};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

struct ReadyCallback {
    /// Engine commands wait for the engine itself, not only the player.
    needs_engine: bool,
    run: Box<dyn FnOnce(&mut PlayerController)>,
}

/// Upper bound on tasks run by a single `run_until_idle` call.
const MAX_IDLE_STEPS: usize = 100_000;

/// Orchestrates engine selection, lifecycle, command queueing and event
/// re-emission for one player.
pub struct PlayerController {
    id: PlayerId,
    config: PlayerConfig,
    engines: EngineRegistry,
    middleware: MiddlewareRegistry,
    players: PlayerRegistry,
    events: EventBus<PlayerEvent>,
    scheduler: Scheduler<PlayerController>,
    signal_tx: mpsc::UnboundedSender<EngineSignal>,
    signal_rx: EngineReceiver,

    // Engine lifecycle
    engine: Option<Box<dyn PlaybackEngine>>,
    engine_name: Option<String>,
    engine_id: Option<String>,
    generation: u64,
    /// The engine signalled ready and has not failed since.
    engine_ready: bool,
    /// Player-level readiness; ready callbacks run once this is set.
    is_ready: bool,
    ready_queue: Vec<ReadyCallback>,

    state: PlaybackState,
    cache: PlayerCache,
    error: Option<MediaError>,

    // Command queueing
    play_queue: PlayQueue,
    rate_gate: RateGate,
    wait_to_play: bool,
    pending_reset: bool,
    pending_init_time: bool,

    // Source assignment
    changing_source: bool,
    /// A source change loaded a new engine; cleared when it becomes ready.
    swap_pending: bool,
    source_task: Option<TaskId>,
    retry_sources: Option<Vec<SourceDescriptor>>,
    /// `(player src, engine src)` at the last engine `sourceset`.
    last_source: Option<(String, String)>,
    awaiting_engine_src: bool,
    has_started: bool,

    middleware_instances: MiddlewareInstances,
    pipeline: Pipeline,
    tracks: TrackSynchronizer,
    pending_text_tracks: Vec<TextTrackSnapshot>,

    disposed: bool,
}

// ============================================================================
// Construction
// ============================================================================

/// Builder for [`PlayerController`]. Registries default to the process-wide
/// instances.
#[derive(Debug, Default)]
pub struct PlayerControllerBuilder {
    config: Option<PlayerConfig>,
    engines: Option<EngineRegistry>,
    middleware: Option<MiddlewareRegistry>,
    players: Option<PlayerRegistry>,
    event_capacity: Option<usize>,
}

impl PlayerControllerBuilder {
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn engines(mut self, engines: EngineRegistry) -> Self {
        self.engines = Some(engines);
        self
    }

    pub fn middleware(mut self, middleware: MiddlewareRegistry) -> Self {
        self.middleware = Some(middleware);
        self
    }

    pub fn players(mut self, players: PlayerRegistry) -> Self {
        self.players = Some(players);
        self
    }

    /// Per-subscriber event buffer size.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Builds the controller, then assigns the configured sources or loads
    /// the first supported engine without a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the initial engine
    /// cannot be constructed.
    pub fn build(self) -> Result<PlayerController> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let cache = PlayerCache::new(config.default_playback_rate);

        let mut player = PlayerController {
            id: PlayerId::new(),
            config,
            engines: self.engines.unwrap_or_else(EngineRegistry::global),
            middleware: self.middleware.unwrap_or_else(MiddlewareRegistry::global),
            players: self.players.unwrap_or_else(PlayerRegistry::global),
            events: EventBus::new(self.event_capacity.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE)),
            scheduler: Scheduler::new(),
            signal_tx,
            signal_rx,
            engine: None,
            engine_name: None,
            engine_id: None,
            generation: 0,
            engine_ready: false,
            is_ready: false,
            ready_queue: Vec::new(),
            state: PlaybackState::Uninitialized,
            cache,
            error: None,
            play_queue: PlayQueue::new(),
            rate_gate: RateGate::new(),
            wait_to_play: false,
            pending_reset: false,
            pending_init_time: false,
            changing_source: false,
            swap_pending: false,
            source_task: None,
            retry_sources: None,
            last_source: None,
            awaiting_engine_src: false,
            has_started: false,
            middleware_instances: MiddlewareInstances::new(),
            pipeline: Pipeline::default(),
            tracks: TrackSynchronizer::new(),
            pending_text_tracks: Vec::new(),
            disposed: false,
        };

        player.players.register(player.id);
        info!(player_id = %player.id, "Player created");

        if !player.config.sources.is_empty() {
            let sources = player.config.sources.clone();
            player.src(sources);
        } else {
            let order = player.engine_order();
            match player.engines.supported(&order).into_iter().next() {
                Some(entry) => player.load_engine(&entry.name, None)?,
                None => warn!(player_id = %player.id, "No supported engine is registered"),
            }
        }

        Ok(player)
    }
}

impl PlayerController {
    pub fn builder() -> PlayerControllerBuilder {
        PlayerControllerBuilder::default()
    }

    /// Builds a controller over the process-wide registries.
    pub fn new(config: PlayerConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Player-level readiness.
    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    /// Whether the current engine has signalled readiness.
    pub fn is_engine_ready(&self) -> bool {
        self.engine_ready
    }

    pub fn engine_name(&self) -> Option<&str> {
        self.engine_name.as_deref()
    }

    pub fn engine_id(&self) -> Option<&str> {
        self.engine_id.as_deref()
    }

    /// Generation of the current engine; bumped on every load.
    pub fn engine_generation(&self) -> u64 {
        self.generation
    }

    pub fn engine_tracks(&self) -> Option<&EngineTracks> {
        self.engine.as_deref().map(|engine| engine.tracks())
    }

    /// The single active error, if any.
    pub fn error(&self) -> Option<&MediaError> {
        self.error.as_ref()
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn is_changing_source(&self) -> bool {
        self.changing_source
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Pending `play()` requests.
    pub fn queued_plays(&self) -> usize {
        self.play_queue.len()
    }

    /// Middleware attached for the current source.
    pub fn middleware_names(&self) -> Vec<String> {
        self.pipeline.names()
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus<PlayerEvent> {
        &self.events
    }

    pub(crate) fn engine_order(&self) -> Vec<String> {
        if self.config.engine_order.is_empty() {
            self.engines.default_order()
        } else {
            self.config.engine_order.clone()
        }
    }

    pub(crate) fn emit(&self, event: PlayerEvent) {
        trace!(player_id = %self.id, event = event.name(), "Emitting event");
        // No subscribers is not an error for the player.
        let _ = self.events.emit(event);
    }

    // ========================================================================
    // Clock & Scheduling
    // ========================================================================

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Handles every queued engine signal. Returns how many were handled.
    pub fn process_engine_signals(&mut self) -> usize {
        let mut handled = 0;
        while let Ok((generation, notice)) = self.signal_rx.try_recv() {
            handled += 1;
            self.handle_engine_signal(generation, notice);
        }
        handled
    }

    /// Moves the clock forward by `duration`, running every task that falls
    /// due on the way. Returns the number of tasks and signals handled.
    pub fn advance(&mut self, duration: Duration) -> usize {
        let target = self.scheduler.now().saturating_add(duration);
        let mut steps = self.process_engine_signals();
        while let Some(task) = self.scheduler.pop_due(target) {
            task.run(self);
            steps += 1 + self.process_engine_signals();
        }
        self.scheduler.advance_to(target);
        steps
    }

    /// Runs until no engine signal and no one-shot task is pending.
    /// Intervals alone count as idle.
    pub fn run_until_idle(&mut self) -> usize {
        let mut steps = self.process_engine_signals();
        while !self.disposed && self.scheduler.has_one_shot() {
            let Some(task) = self.scheduler.pop_due(Duration::MAX) else {
                break;
            };
            task.run(self);
            steps += 1 + self.process_engine_signals();

            if steps >= MAX_IDLE_STEPS {
                warn!(player_id = %self.id, steps, "Scheduler did not go idle; stopping");
                break;
            }
        }
        steps
    }

    pub fn set_timeout<F>(&mut self, delay: Duration, task: F) -> TaskId
    where
        F: FnOnce(&mut PlayerController) + 'static,
    {
        self.scheduler.set_timeout(TaskOwner::Controller, delay, task)
    }

    pub fn set_interval<F>(&mut self, period: Duration, task: F) -> TaskId
    where
        F: Fn(&mut PlayerController) + 'static,
    {
        self.scheduler.set_interval(TaskOwner::Controller, period, task)
    }

    pub fn request_animation_frame<F>(&mut self, task: F) -> TaskId
    where
        F: FnOnce(&mut PlayerController) + 'static,
    {
        self.scheduler.request_animation_frame(TaskOwner::Controller, task)
    }

    /// Like [`set_timeout`](Self::set_timeout), but cancelled when the
    /// current engine is disposed.
    pub fn set_engine_timeout<F>(&mut self, delay: Duration, task: F) -> TaskId
    where
        F: FnOnce(&mut PlayerController) + 'static,
    {
        self.scheduler
            .set_timeout(TaskOwner::Engine(self.generation), delay, task)
    }

    /// Like [`set_interval`](Self::set_interval), but cancelled when the
    /// current engine is disposed.
    pub fn set_engine_interval<F>(&mut self, period: Duration, task: F) -> TaskId
    where
        F: Fn(&mut PlayerController) + 'static,
    {
        self.scheduler
            .set_interval(TaskOwner::Engine(self.generation), period, task)
    }

    pub fn clear_timer(&mut self, id: TaskId) -> bool {
        self.scheduler.cancel(id)
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    // ========================================================================
    // Readiness
    // ========================================================================

    /// Runs `callback` once the player is ready. If it already is, the
    /// callback runs after the ready delay.
    pub fn on_ready<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut PlayerController) + 'static,
    {
        if self.disposed {
            return;
        }
        if self.is_ready {
            let delay = self.config.ready_delay();
            self.scheduler.set_timeout(TaskOwner::Controller, delay, callback);
        } else {
            self.ready_queue.push(ReadyCallback {
                needs_engine: false,
                run: Box::new(callback),
            });
        }
    }

    /// Runs `callback` immediately if both the player and its engine are
    /// ready, otherwise queues it until the engine signals ready. Callbacks
    /// still waiting for the ready flush keep their place ahead of it.
    pub(crate) fn on_ready_now<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut PlayerController) + 'static,
    {
        if self.disposed {
            return;
        }
        if self.is_ready && self.engine_ready && self.ready_queue.is_empty() {
            callback(self);
        } else {
            self.ready_queue.push(ReadyCallback {
                needs_engine: true,
                run: Box::new(callback),
            });
        }
    }

    /// Marks the player ready and schedules the ready flush.
    pub(crate) fn trigger_ready(&mut self) {
        self.is_ready = true;
        let delay = self.config.ready_delay();
        self.scheduler
            .set_timeout(TaskOwner::Controller, delay, |player| player.flush_ready());
    }

    fn flush_ready(&mut self) {
        if !self.is_ready || self.disposed {
            return;
        }
        let mut pending: VecDeque<ReadyCallback> = std::mem::take(&mut self.ready_queue).into();
        debug!(player_id = %self.id, callbacks = pending.len(), "Player ready");
        while let Some(callback) = pending.pop_front() {
            if self.disposed {
                return;
            }
            if callback.needs_engine && !self.engine_ready {
                pending.push_front(callback);
                break;
            }
            (callback.run)(self);
        }
        if !pending.is_empty() {
            debug!(player_id = %self.id, held = pending.len(), "Holding engine commands until the engine is ready");
            pending.extend(self.ready_queue.drain(..));
            self.ready_queue = pending.into();
        }
        self.emit(PlayerEvent::Ready);
        if self.wait_to_play {
            self.attempt_play(None);
        }
    }

    // ========================================================================
    // Disposal
    // ========================================================================

    /// Tears the player down. Pending `play()` requests resolve as
    /// terminated, the engine is disposed, every timer is cancelled and the
    /// player leaves the player registry. Later calls are no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        info!(player_id = %self.id, "Disposing player");

        self.disposed = true;
        let entries = self.play_queue.drain_to_terminated();
        self.settle_terminated(entries);
        self.wait_to_play = false;
        self.rate_gate.clear();
        self.ready_queue.clear();

        self.unload_engine(false);
        self.scheduler.cancel_all();
        self.middleware_instances.clear();
        self.pipeline = Pipeline::default();
        self.players.unregister(self.id);

        self.set_state(StateInput::Dispose);
        self.emit(PlayerEvent::Disposed);
    }
}

impl Drop for PlayerController {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for PlayerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerController")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("engine", &self.engine_name)
            .field("generation", &self.generation)
            .field("is_ready", &self.is_ready)
            .field("source", &self.cache.source)
            .field("disposed", &self.disposed)
            .finish()
    }
}
