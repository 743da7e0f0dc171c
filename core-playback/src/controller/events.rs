//! Engine signal handling and media event re-emission.

use super::{PlayerController, StateInput};
use crate::events::{EngineNotice, MediaEvent, PlayerEvent};
use crate::middleware::{Setter, Value};
use tracing::{debug, info, trace};

impl PlayerController {
    pub(crate) fn handle_engine_signal(&mut self, generation: u64, notice: EngineNotice) {
        if generation != self.generation || self.engine.is_none() {
            trace!(
                player_id = %self.id,
                generation,
                current = self.generation,
                ?notice,
                "Dropping signal from a disposed engine"
            );
            return;
        }

        match notice {
            EngineNotice::Ready => self.handle_engine_ready(),
            EngineNotice::Media(event) => self.handle_media_event(event),
            EngineNotice::SourceSet { src } => self.handle_engine_source_set(src),
        }
    }

    fn handle_engine_ready(&mut self) {
        if self.engine_ready {
            trace!(player_id = %self.id, "Engine already ready");
            return;
        }

        self.engine_ready = true;
        info!(
            player_id = %self.id,
            engine = ?self.engine_name,
            generation = self.generation,
            "Engine ready"
        );
        self.set_state(StateInput::EngineReady);
        self.trigger_ready();

        // Carry the player's volume over to the new engine.
        let volume = self.cache.volume;
        self.write_initial(Setter::Volume, Value::Number(volume));
        self.refresh_duration();

        if self.swap_pending {
            self.swap_pending = false;
            self.changing_source = false;
        }
    }

    fn write_initial(&mut self, setter: Setter, value: Value) {
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        if let Err(err) = self.pipeline.set(setter, value, engine) {
            debug!(player_id = %self.id, setter = setter.name(), error = %err, "Initial engine write failed");
        }
    }

    // ========================================================================
    // Media Events
    // ========================================================================

    fn handle_media_event(&mut self, event: MediaEvent) {
        if event.is_rate_gated() && self.rate_gate_closed() {
            trace!(player_id = %self.id, %event, "Holding event while rate is zero");
            self.rate_gate.hold(event);
            return;
        }
        self.dispatch_media_event(event);
    }

    /// Events are held while the engine is seeking at rate zero.
    fn rate_gate_closed(&self) -> bool {
        let Some(engine) = self.engine.as_deref() else {
            return false;
        };
        matches!(engine.playback_rate(), Ok(rate) if rate == 0.0) && matches!(engine.seeking(), Ok(true))
    }

    fn release_rate_gate(&mut self) {
        let held = self.rate_gate.release();
        if !held.is_empty() {
            debug!(player_id = %self.id, events = held.len(), "Releasing held events");
        }
        for event in held {
            self.dispatch_media_event(event);
        }
    }

    fn dispatch_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::LoadStart => self.on_load_start(),
            MediaEvent::DurationChange => self.refresh_duration(),
            MediaEvent::RateChange => self.on_rate_change(),
            MediaEvent::Error => self.on_engine_error(),
            MediaEvent::Play => {
                self.set_state(StateInput::Play);
                self.emit(PlayerEvent::Media(event));
                if !self.has_started {
                    self.has_started = true;
                    self.emit(PlayerEvent::FirstPlay);
                }
            }
            MediaEvent::Playing => {
                self.retry_sources = None;
                self.set_state(StateInput::Play);
                self.emit(PlayerEvent::Media(event));
            }
            MediaEvent::Pause => {
                self.set_state(StateInput::Pause);
                self.emit(PlayerEvent::Media(event));
            }
            MediaEvent::Seeking => {
                self.set_state(StateInput::Seeking);
                self.emit(PlayerEvent::Media(event));
            }
            MediaEvent::Seeked => {
                let paused = self.paused();
                self.set_state(StateInput::Seeked { paused });
                self.emit(PlayerEvent::Media(event));
            }
            MediaEvent::Ended => {
                self.set_state(StateInput::Ended);
                self.emit(PlayerEvent::Media(event));
            }
            MediaEvent::CanPlay => {
                self.emit(PlayerEvent::Media(event));
                self.apply_init_time();
            }
            other => self.emit(PlayerEvent::Media(other)),
        }
    }

    fn on_load_start(&mut self) {
        self.clear_error();
        self.set_state(StateInput::LoadStart);
        self.refresh_duration();
        self.adopt_engine_src();

        if self.paused() {
            self.has_started = false;
        }
        self.emit(PlayerEvent::Media(MediaEvent::LoadStart));

        if self.wait_to_play {
            self.attempt_play(None);
        }
        self.run_manual_autoplay();
    }

    fn on_rate_change(&mut self) {
        let rate = self
            .engine
            .as_deref()
            .and_then(|engine| engine.playback_rate().ok())
            .unwrap_or(self.cache.last_playback_rate);

        if rate > 0.0 && self.cache.last_playback_rate == 0.0 {
            self.release_rate_gate();
        }
        self.cache.last_playback_rate = rate;
        self.emit(PlayerEvent::Media(MediaEvent::RateChange));
    }

    fn on_engine_error(&mut self) {
        match self.engine.as_deref().and_then(|engine| engine.error()) {
            Some(error) => self.set_error(error),
            None => debug!(player_id = %self.id, "Engine reported an error without details"),
        }
    }
}
