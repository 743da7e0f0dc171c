//! Playback commands, getters and setters.
//!
//! Reads go through [`PlayerController::get`] and fall back to the cache when
//! no engine is ready. Writes made before the player is ready are queued and
//! replayed in order once it is.

use super::{PlaybackState, PlayerController, StateInput};
use crate::config::AutoplayMode;
use crate::error::{MediaError, PlaybackError, Result};
use crate::events::{MediaEvent, PlayerEvent};
use crate::middleware::{Getter, Mediator, Operation, Pipeline, Setter, Value};
use crate::queue::{AutoplayStep, PlayHandle, PlayResolution, TerminatedEntry, Waiter};
use crate::scheduler::TaskOwner;
use crate::source::SourceDescriptor;
use crate::traits::{PlaybackEngine, TimeRanges};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

impl PlayerController {
    // ========================================================================
    // Engine Access
    // ========================================================================

    /// Runs `op` against the ready engine and applies the failure policy to
    /// its result. Returns `None` when no engine is ready.
    fn with_engine<T>(
        &mut self,
        method: &str,
        op: impl FnOnce(&mut dyn PlaybackEngine, &Pipeline) -> Result<T>,
    ) -> Option<Result<T>> {
        if !self.engine_ready {
            return None;
        }
        let engine = self.engine.as_deref_mut()?;
        let result = op(engine, &self.pipeline);
        if let Err(err) = &result {
            self.handle_engine_failure(method, err);
        }
        Some(result)
    }

    fn handle_engine_failure(&mut self, method: &str, err: &PlaybackError) {
        let engine = self.engine_name.as_deref().unwrap_or("none");
        if err.marks_engine_unready() {
            warn!(player_id = %self.id, engine, method, error = %err, "Engine method unavailable; marking engine not ready");
            self.engine_ready = false;
        } else if matches!(err, PlaybackError::UndefinedMethod { .. }) {
            error!(player_id = %self.id, engine, method, "Engine does not implement method");
        } else {
            debug!(player_id = %self.id, engine, method, error = %err, "Engine call failed");
        }
    }

    /// Calls a direct engine method, logging any failure.
    pub(crate) fn engine_action(
        &mut self,
        method: &str,
        op: impl FnOnce(&mut dyn PlaybackEngine) -> Result<()>,
    ) {
        // Failures are already logged by the failure policy.
        let _ = self.with_engine(method, |engine, _| op(engine));
    }

    /// Reads `getter` through the middleware pipeline. `Ok(None)` means no
    /// engine is ready.
    pub fn get(&mut self, getter: Getter) -> Result<Option<Value>> {
        self.with_engine(getter.name(), |engine, pipeline| pipeline.get(getter, engine))
            .transpose()
    }

    /// Dispatches `operation` through the middleware pipeline.
    ///
    /// `Ok(None)` means no engine is ready, or the middleware terminated the
    /// call.
    pub fn call(&mut self, operation: Operation) -> Result<Option<Value>> {
        let name = operation.name();
        self.with_engine(name, move |engine, pipeline| pipeline.dispatch(operation, engine))
            .unwrap_or(Ok(None))
    }

    /// Writes through the pipeline once the player is ready.
    fn engine_set(&mut self, setter: Setter, value: Value) {
        self.on_ready_now(move |player| {
            let applied = player.with_engine(setter.name(), |engine, pipeline| {
                pipeline.set(setter, value, engine)
            });
            if let Some(Ok(false)) = applied {
                debug!(player_id = %player.id, setter = setter.name(), "Setter terminated by middleware");
            }
        });
    }

    fn read_number(&mut self, getter: Getter) -> Option<f64> {
        self.get(getter).ok().flatten().and_then(|value| value.as_number())
    }

    fn read_bool(&mut self, getter: Getter) -> Option<bool> {
        self.get(getter).ok().flatten().and_then(|value| value.as_bool())
    }

    fn read_ranges(&mut self, getter: Getter) -> Option<TimeRanges> {
        match self.get(getter) {
            Ok(Some(Value::Ranges(ranges))) => Some(ranges),
            _ => None,
        }
    }

    pub(crate) fn engine_src(&mut self) -> String {
        match self.get(Getter::Src) {
            Ok(Some(Value::Text(src))) => src,
            _ => String::new(),
        }
    }

    // ========================================================================
    // Play / Pause
    // ========================================================================

    /// Requests playback.
    ///
    /// The handle settles once the engine accepted or rejected the request,
    /// or with [`PlayResolution::Terminated`] if the request is invalidated by
    /// middleware, `reset()` or `dispose()`. Requests made before the player
    /// is ready (or while the source is changing) wait and are retried on
    /// the next `ready` or `loadstart`.
    pub fn play(&mut self) -> PlayHandle {
        if self.disposed {
            return PlayHandle::settled(PlayResolution::Terminated);
        }
        let (sender, handle) = PlayHandle::channel();
        self.attempt_play(Some(Waiter::Handle(sender)));
        handle
    }

    /// Like [`play`](Self::play), but `callback` receives the resolution.
    /// Callbacks of requests that wait together run in request order.
    pub fn play_then<F>(&mut self, callback: F)
    where
        F: FnOnce(PlayResolution) + 'static,
    {
        if self.disposed {
            callback(PlayResolution::Terminated);
            return;
        }
        self.attempt_play(Some(Waiter::Callback(Box::new(callback))));
    }

    pub(crate) fn attempt_play(&mut self, waiter: Option<Waiter>) {
        if let Some(waiter) = waiter {
            self.play_queue.enqueue(waiter);
        }
        self.wait_to_play = false;

        let src_ready = !self.changing_source
            && (!self.cache.src.is_empty() || !self.engine_src().is_empty());
        if !self.is_ready || !self.engine_ready || !src_ready {
            debug!(
                player_id = %self.id,
                ready = self.is_ready,
                engine_ready = self.engine_ready,
                src_ready,
                queued = self.play_queue.len(),
                "Deferring play"
            );
            self.wait_to_play = true;
            return;
        }

        let outcome = self
            .with_engine("play", |engine, pipeline| pipeline.mediate(Mediator::Play, None, engine))
            .unwrap_or_else(|| {
                Err(PlaybackError::MethodUnavailable {
                    engine: self.engine_name.clone(),
                    method: "play".to_string(),
                })
            });

        match outcome {
            Ok(Some(_)) => {
                let waiters = self.play_queue.drain_all();
                debug!(player_id = %self.id, waiters = waiters.len(), "Play started");
                self.settle_waiters(waiters, PlayResolution::Started);
            }
            Ok(None) => {
                info!(player_id = %self.id, "Play terminated by middleware");
                let entries = self.play_queue.drain_to_terminated();
                self.settle_terminated(entries);
            }
            Err(err) => {
                let reason = match err {
                    PlaybackError::PlaybackRejected(reason) => reason,
                    other => other.to_string(),
                };
                warn!(player_id = %self.id, reason = %reason, "Play rejected");
                let waiters = self.play_queue.drain_all();
                self.settle_waiters(waiters, PlayResolution::Rejected(reason));
            }
        }
    }

    fn settle_waiters(&mut self, waiters: Vec<Waiter>, resolution: PlayResolution) {
        for waiter in waiters {
            self.settle_waiter(waiter, resolution.clone());
        }
    }

    fn settle_waiter(&mut self, waiter: Waiter, resolution: PlayResolution) {
        match waiter {
            Waiter::Handle(sender) => {
                // The caller may have dropped its handle.
                let _ = sender.send(resolution);
            }
            Waiter::Callback(callback) => callback(resolution),
            Waiter::Autoplay(step) => {
                if !self.disposed {
                    self.scheduler
                        .set_timeout(TaskOwner::Controller, Duration::ZERO, move |player| {
                            player.on_autoplay_settled(step, resolution);
                        });
                }
            }
            Waiter::Reset => {
                if self.pending_reset && !self.disposed {
                    self.do_reset();
                }
            }
        }
    }

    pub(crate) fn settle_terminated(&mut self, entries: Vec<TerminatedEntry>) {
        for entry in entries {
            match entry {
                TerminatedEntry::Waiter(waiter) => {
                    self.settle_waiter(waiter, PlayResolution::Terminated)
                }
                TerminatedEntry::RestoreMuted(muted) => {
                    if !self.disposed {
                        self.set_muted(muted);
                    }
                }
            }
        }
    }

    /// Pauses playback once the player is ready.
    pub fn pause(&mut self) {
        self.on_ready_now(|player| {
            let _ = player.with_engine("pause", |engine, pipeline| {
                pipeline.mediate(Mediator::Pause, None, engine)
            });
        });
    }

    pub fn paused(&mut self) -> bool {
        self.read_bool(Getter::Paused) != Some(false)
    }

    // ========================================================================
    // Autoplay
    // ========================================================================

    /// Runs the configured controller-driven autoplay, if any.
    pub(crate) fn run_manual_autoplay(&mut self) {
        let Some(mode) = self.config.manual_autoplay() else {
            return;
        };
        if self.engine.is_none() {
            return;
        }

        debug!(player_id = %self.id, ?mode, "Attempting autoplay");
        if mode == AutoplayMode::Muted {
            self.autoplay_muted(mode);
        } else {
            self.attempt_play(Some(Waiter::Autoplay(AutoplayStep::Plain(mode))));
        }
    }

    fn autoplay_muted(&mut self, mode: AutoplayMode) {
        let previously_muted = self.muted();
        self.set_muted(true);
        self.play_queue
            .push_terminated(TerminatedEntry::RestoreMuted(previously_muted));
        self.attempt_play(Some(Waiter::Autoplay(AutoplayStep::Muted {
            mode,
            previously_muted,
        })));
    }

    fn on_autoplay_settled(&mut self, step: AutoplayStep, resolution: PlayResolution) {
        match (step, resolution) {
            (step, PlayResolution::Started) => {
                info!(player_id = %self.id, mode = ?step.mode(), "Autoplay succeeded");
                self.emit(PlayerEvent::AutoplaySuccess { mode: step.mode() });
            }
            (AutoplayStep::Plain(AutoplayMode::Any), PlayResolution::Rejected(reason)) => {
                debug!(player_id = %self.id, reason = %reason, "Autoplay rejected; retrying muted");
                self.autoplay_muted(AutoplayMode::Any);
            }
            (AutoplayStep::Muted { mode, previously_muted }, PlayResolution::Rejected(reason)) => {
                warn!(player_id = %self.id, ?mode, reason = %reason, "Muted autoplay rejected");
                self.set_muted(previously_muted);
                self.emit(PlayerEvent::AutoplayFailure { mode });
            }
            (step, resolution) => {
                warn!(player_id = %self.id, mode = ?step.mode(), ?resolution, "Autoplay failed");
                self.emit(PlayerEvent::AutoplayFailure { mode: step.mode() });
            }
        }
    }

    // ========================================================================
    // Reset
    // ========================================================================

    /// Returns the player to its initial state with the first supported
    /// engine and no source. While playing, the reset waits for the current
    /// play request to settle.
    pub fn reset(&mut self) {
        if self.disposed {
            return;
        }
        if self.paused() {
            self.do_reset();
        } else {
            debug!(player_id = %self.id, "Deferring reset until play settles");
            self.pending_reset = true;
            self.attempt_play(Some(Waiter::Reset));
        }
    }

    #[instrument(skip(self), fields(player_id = %self.id))]
    pub(crate) fn do_reset(&mut self) {
        self.pending_reset = false;
        info!(player_id = %self.id, "Resetting player");

        if let Some(engine) = self.engine.as_deref_mut() {
            engine.clear_text_tracks();
        }
        self.pending_text_tracks.clear();
        self.ready_queue.clear();

        let entries = self.play_queue.drain_to_terminated();
        self.wait_to_play = false;
        self.settle_terminated(entries);

        self.rate_gate.clear();
        self.pending_init_time = false;
        self.retry_sources = None;
        self.awaiting_engine_src = false;
        if let Some(task) = self.source_task.take() {
            self.scheduler.cancel(task);
        }
        self.changing_source = false;
        self.swap_pending = false;
        self.has_started = false;
        self.cache.reset(self.config.default_playback_rate);
        self.set_state(StateInput::Reset);

        let order = self.engine_order();
        match self.engines.supported(&order).into_iter().next() {
            Some(entry) => {
                if let Err(err) = self.load_engine(&entry.name, None) {
                    self.set_error(MediaError::from(&err));
                }
            }
            None => {
                warn!(player_id = %self.id, "No supported engine to load after reset");
                self.unload_engine(false);
            }
        }
        self.on_ready_now(|player| player.engine_action("reset", |engine| engine.reset()));

        self.clear_error();
        self.emit(PlayerEvent::PlayerReset);
    }

    // ========================================================================
    // Time
    // ========================================================================

    pub fn current_time(&mut self) -> f64 {
        if let Some(time) = self.read_number(Getter::CurrentTime) {
            self.cache.current_time = time;
        }
        self.cache.current_time
    }

    /// Seeks to `seconds`. Before the player is ready, or while the source is
    /// changing, the seek is deferred until the engine can play.
    pub fn set_current_time(&mut self, seconds: f64) -> Result<()> {
        if seconds.is_nan() {
            return Err(PlaybackError::InvalidValue {
                operation: Setter::CurrentTime.name(),
                expected: "a number",
            });
        }
        let seconds = seconds.max(0.0);

        if !self.is_ready || !self.engine_ready || self.changing_source {
            debug!(player_id = %self.id, seconds, "Deferring seek until canplay");
            self.cache.init_time = seconds;
            self.pending_init_time = true;
            return Ok(());
        }

        self.engine_set(Setter::CurrentTime, Value::Number(seconds));
        self.cache.init_time = 0.0;
        self.pending_init_time = false;
        if seconds.is_finite() {
            self.cache.current_time = seconds;
        }
        Ok(())
    }

    /// Applies a seek deferred by [`set_current_time`](Self::set_current_time).
    pub(crate) fn apply_init_time(&mut self) {
        if !self.pending_init_time {
            return;
        }
        self.pending_init_time = false;
        let seconds = self.cache.init_time;
        if let Err(err) = self.set_current_time(seconds) {
            debug!(player_id = %self.id, error = %err, "Deferred seek failed");
        }
    }

    /// Duration in seconds; `NaN` until known, infinite for live streams.
    pub fn duration(&self) -> f64 {
        self.cache.duration
    }

    /// Records a new duration. Negative values mean a live stream. Emits
    /// `durationchange` when the value changes to something known.
    pub fn set_duration(&mut self, seconds: f64) {
        let seconds = if seconds < 0.0 { f64::INFINITY } else { seconds };
        let previous = self.cache.duration;
        let unchanged = seconds == previous || (seconds.is_nan() && previous.is_nan());
        if unchanged {
            return;
        }

        self.cache.duration = seconds;
        if !seconds.is_nan() {
            self.emit(PlayerEvent::Media(MediaEvent::DurationChange));
        }
    }

    pub(crate) fn refresh_duration(&mut self) {
        if let Some(duration) = self.read_number(Getter::Duration) {
            self.set_duration(duration);
        }
    }

    pub fn remaining_time(&mut self) -> f64 {
        self.duration() - self.current_time()
    }

    pub fn is_live(&self) -> bool {
        self.cache.duration.is_infinite()
    }

    // ========================================================================
    // Volume & Rate
    // ========================================================================

    pub fn volume(&mut self) -> f64 {
        self.read_number(Getter::Volume)
            .filter(|volume| !volume.is_nan())
            .unwrap_or(self.cache.volume)
    }

    /// Sets the volume, clamped to `0.0..=1.0`.
    pub fn set_volume(&mut self, volume: f64) -> Result<()> {
        if volume.is_nan() {
            return Err(PlaybackError::InvalidValue {
                operation: Setter::Volume.name(),
                expected: "a number between 0 and 1",
            });
        }
        let volume = volume.clamp(0.0, 1.0);
        self.cache.remember_volume(volume);
        self.engine_set(Setter::Volume, Value::Number(volume));
        Ok(())
    }

    /// Last non-zero volume.
    pub fn last_volume(&self) -> f64 {
        self.cache.last_volume
    }

    pub fn muted(&mut self) -> bool {
        self.read_bool(Getter::Muted).unwrap_or(false)
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.engine_set(Setter::Muted, Value::Bool(muted));
    }

    pub fn playback_rate(&mut self) -> f64 {
        self.read_number(Getter::PlaybackRate)
            .unwrap_or(self.cache.last_playback_rate)
    }

    pub fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(PlaybackError::InvalidValue {
                operation: Setter::PlaybackRate.name(),
                expected: "a non-negative number",
            });
        }
        self.engine_set(Setter::PlaybackRate, Value::Number(rate));
        Ok(())
    }

    pub fn default_playback_rate(&self) -> f64 {
        self.config.default_playback_rate
    }

    // ========================================================================
    // Buffering & Status
    // ========================================================================

    pub fn buffered(&mut self) -> TimeRanges {
        self.read_ranges(Getter::Buffered).unwrap_or_default()
    }

    /// Fraction of the media buffered, `0.0..=1.0`.
    pub fn buffered_percent(&mut self) -> f64 {
        let duration = self.duration();
        if !duration.is_finite() || duration <= 0.0 {
            return 0.0;
        }
        let end = self.buffered().last_end().min(duration);
        end / duration
    }

    pub fn buffered_end(&mut self) -> f64 {
        self.buffered().last_end()
    }

    pub fn seekable(&mut self) -> TimeRanges {
        self.read_ranges(Getter::Seekable).unwrap_or_default()
    }

    pub fn played(&mut self) -> TimeRanges {
        self.read_ranges(Getter::Played).unwrap_or_default()
    }

    pub fn seeking(&mut self) -> bool {
        self.read_bool(Getter::Seeking).unwrap_or(false)
    }

    pub fn ended(&mut self) -> bool {
        self.read_bool(Getter::Ended).unwrap_or(false)
    }

    /// Asks the engine to reload its source.
    pub fn load(&mut self) {
        self.on_ready_now(|player| player.engine_action("load", |engine| engine.load()));
    }

    // ========================================================================
    // Sources
    // ========================================================================

    pub fn current_source(&self) -> &SourceDescriptor {
        &self.cache.source
    }

    pub fn current_sources(&self) -> &[SourceDescriptor] {
        &self.cache.sources
    }

    pub fn current_src(&self) -> &str {
        &self.cache.source.url
    }

    pub fn current_type(&self) -> &str {
        &self.cache.source.mime_type
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// Sets the active error and emits it. With `retry_on_error`, an error
    /// raised before playback began retries the remaining sources.
    pub fn set_error(&mut self, error: MediaError) {
        if self.disposed {
            return;
        }
        error!(
            player_id = %self.id,
            code = error.code.as_u16(),
            message = %error.message,
            "Player error"
        );
        self.error = Some(error.clone());
        self.set_state(StateInput::Error);
        self.emit(PlayerEvent::Error(error));

        if let Some(remaining) = self.retry_sources.take() {
            info!(player_id = %self.id, remaining = remaining.len(), "Retrying with remaining sources");
            self.clear_error();
            self.handle_src(remaining, true);
        }
    }

    pub fn clear_error(&mut self) {
        if self.error.take().is_none() {
            return;
        }
        if self.state == PlaybackState::Errored {
            let input = if self.engine_ready {
                StateInput::ErrorCleared
            } else {
                StateInput::LoadEngine
            };
            self.set_state(input);
        }
    }

    // ========================================================================
    // Events & State
    // ========================================================================

    /// Re-emits a collaborator event (fullscreen, picture-in-picture).
    pub fn trigger_passthrough(&self, name: impl Into<String>) {
        self.emit(PlayerEvent::Passthrough { name: name.into() });
    }

    pub(crate) fn set_state(&mut self, input: StateInput) {
        let next = super::transition(self.state, input);
        if next == self.state {
            return;
        }
        let from = self.state;
        self.state = next;
        debug!(player_id = %self.id, ?from, to = ?next, ?input, "State changed");
        self.emit(PlayerEvent::StateChanged { from, to: next });
    }
}
