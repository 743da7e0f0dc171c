//! Source assignment, engine loading and media objects.

use super::{PlayerController, StateInput};
use crate::error::{MediaError, PlaybackError, Result};
use crate::events::{EngineEvents, PlayerEvent};
use crate::media::MediaObject;
use crate::middleware::BuildOutcome;
use crate::scheduler::TaskOwner;
use crate::selector::{Selection, SourceSelector};
use crate::source::{filter_sources, SourceDescriptor, SourceInput};
use crate::traits::EngineInit;
use crate::tracks::{TextTrackList, TextTrackSnapshot, TrackId};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

impl PlayerController {
    // ========================================================================
    // Source Assignment
    // ========================================================================

    /// Assigns new sources.
    ///
    /// The input is flattened and filtered first. Middleware is built after
    /// the middleware delay, then the resolved source is handed to the first
    /// engine that can play it. Unplayable sources fall back to the next
    /// candidate; when none is left an asynchronous
    /// [`MediaErrorCode::SrcNotSupported`](crate::error::MediaErrorCode)
    /// error is raised.
    pub fn src(&mut self, input: impl Into<SourceInput>) {
        if self.disposed {
            warn!(player_id = %self.id, "src() called on a disposed player");
            return;
        }
        let sources = filter_sources(input.into(), &self.cache.sources);
        self.retry_sources = None;
        self.handle_src(sources, false);
    }

    pub(crate) fn handle_src(&mut self, sources: Vec<SourceDescriptor>, is_retry: bool) {
        if sources.is_empty() {
            warn!(player_id = %self.id, "No playable source given");
            self.schedule_no_supported_source();
            return;
        }

        self.changing_source = true;
        if !is_retry {
            self.cache.sources = sources.clone();
        }
        self.cache.update_source(&sources[0]);

        if let Some(task) = self.source_task.take() {
            self.scheduler.cancel(task);
        }
        let delay = self.config.middleware_delay();
        let task = self
            .scheduler
            .set_timeout(TaskOwner::Controller, delay, move |player| {
                player.source_task = None;
                player.resolve_source(sources, is_retry);
            });
        self.source_task = Some(task);
    }

    fn resolve_source(&mut self, sources: Vec<SourceDescriptor>, is_retry: bool) {
        let Some(first) = sources.first() else {
            return;
        };

        let (resolved, pipeline) = match self.middleware.build(first, &mut self.middleware_instances) {
            BuildOutcome::Resolved { source, pipeline } => (source, pipeline),
            BuildOutcome::Terminated { source, pipeline } => {
                info!(player_id = %self.id, source = %source, "Middleware terminated the source change");
                self.pipeline = pipeline;
                self.changing_source = false;
                self.trigger_ready();
                return;
            }
        };

        self.pipeline = pipeline;
        if !is_retry {
            self.cache.sources = sources.clone();
        }
        self.cache.adopt_resolved(&resolved);

        let outcome = match self.select_source(std::slice::from_ref(&resolved)) {
            Some(selection) => self.apply_selection(selection),
            None => Err(PlaybackError::NoSupportedSource),
        };

        match outcome {
            Ok(()) => {
                if let Some(engine) = self.engine_name.clone() {
                    self.pipeline.set_engine(&engine);
                }
                if self.config.retry_on_error && sources.len() > 1 {
                    self.retry_sources = Some(sources[1..].to_vec());
                }
            }
            Err(err) if sources.len() > 1 => {
                debug!(player_id = %self.id, error = %err, remaining = sources.len() - 1, "Falling back to next source");
                self.handle_src(sources[1..].to_vec(), false);
            }
            Err(err) => {
                warn!(player_id = %self.id, error = %err, "Sources exhausted");
                self.changing_source = false;
                if err.is_source_error() {
                    self.schedule_no_supported_source();
                } else {
                    self.set_error(MediaError::from(&err));
                }
                self.trigger_ready();
            }
        }
    }

    /// Picks the engine and source to use from `sources`, honouring the
    /// configured engine and source order.
    pub fn select_source(&self, sources: &[SourceDescriptor]) -> Option<Selection> {
        let order = self.engine_order();
        SourceSelector::new(&self.engines)
            .source_first(self.config.source_order)
            .with_config(&self.config)
            .select(&order, sources)
    }

    fn apply_selection(&mut self, selection: Selection) -> Result<()> {
        let same_engine = self.engine.is_some()
            && self
                .engine_name
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case(&selection.engine));

        if !same_engine {
            self.changing_source = true;
            self.load_engine(&selection.engine, Some(selection.source))?;
            self.swap_pending = true;
            return Ok(());
        }

        let source = selection.source;
        self.on_ready_now(move |player| {
            player.engine_action("setSource", |engine| engine.set_source(&source));
            player.changing_source = false;
        });
        Ok(())
    }

    fn schedule_no_supported_source(&mut self) {
        self.scheduler
            .set_timeout(TaskOwner::Controller, Duration::ZERO, |player| {
                player.set_error(MediaError::from(&PlaybackError::NoSupportedSource));
            });
    }

    // ========================================================================
    // Engine Lifecycle
    // ========================================================================

    /// Disposes the current engine and constructs `name`, optionally with a
    /// source to load immediately.
    #[instrument(skip(self, source), fields(player_id = %self.id))]
    pub(crate) fn load_engine(&mut self, name: &str, source: Option<SourceDescriptor>) -> Result<()> {
        let entry = self
            .engines
            .lookup(name)
            .ok_or_else(|| PlaybackError::UnknownEngine(name.to_string()))?;

        let muted = self.muted();
        self.unload_engine(true);

        self.generation += 1;
        let generation = self.generation;
        self.is_ready = false;
        self.engine_ready = false;
        self.set_state(StateInput::LoadEngine);

        let engine_id = format!("{}_{}_api", self.id, entry.name.to_ascii_lowercase());
        let start_time = source
            .as_ref()
            .filter(|source| source.url == self.cache.src && self.cache.current_time > 0.0)
            .map(|_| self.cache.current_time);
        let (audio_tracks, video_tracks) = self.tracks.pending_av_tracks();

        let init = EngineInit {
            engine: entry.name.clone(),
            player_id: self.id,
            engine_id: engine_id.clone(),
            source,
            autoplay: self.config.engine_autoplay(),
            muted,
            options: self.config.engine_options_for(&entry.name),
            audio_tracks,
            video_tracks,
            start_time,
            events: EngineEvents::new(generation, self.signal_tx.clone()),
        };

        let mut engine = entry.factory.create(init).map_err(|err| {
            error!(player_id = %self.id, engine = %entry.name, error = %err, "Engine construction failed");
            match err {
                err @ PlaybackError::EngineCreation { .. } => err,
                other => PlaybackError::EngineCreation {
                    engine: entry.name.clone(),
                    reason: other.to_string(),
                },
            }
        })?;

        let restored = self.tracks.restore(engine.tracks_mut());
        for snapshot in self.pending_text_tracks.drain(..) {
            if let Err(err) = engine.add_remote_text_track(snapshot.to_track()) {
                warn!(engine = %entry.name, error = %err, "Failed to add queued text track");
            }
        }

        let mounted = !engine.is_attached();
        if mounted {
            engine.attach();
        }

        self.engine = Some(engine);
        self.engine_name = Some(entry.name.clone());
        self.engine_id = Some(engine_id.clone());

        info!(
            player_id = %self.id,
            engine = %entry.name,
            generation,
            restored_tracks = restored,
            "Engine loaded"
        );
        self.emit(PlayerEvent::EngineLoaded {
            engine: entry.name,
            engine_id,
            mounted,
        });
        Ok(())
    }

    /// Disposes the current engine, optionally snapshotting its tracks for
    /// the next one. Tasks owned by the engine are cancelled.
    pub(crate) fn unload_engine(&mut self, capture_tracks: bool) {
        let Some(mut engine) = self.engine.take() else {
            return;
        };

        if capture_tracks {
            self.tracks.snapshot(engine.tracks());
        }
        self.is_ready = false;
        self.engine_ready = false;
        self.rate_gate.clear();

        engine.dispose();
        let cancelled = self
            .scheduler
            .cancel_owner(TaskOwner::Engine(self.generation));

        debug!(
            player_id = %self.id,
            engine = ?self.engine_name,
            generation = self.generation,
            cancelled_tasks = cancelled,
            "Engine disposed"
        );
        self.engine_name = None;
        self.engine_id = None;
    }

    /// Handles an engine-initiated source change.
    ///
    /// The player keeps its own source when the engine switched to a `blob:`
    /// URL that neither side reported last time, since that is the engine
    /// resolving the player's source rather than a new one.
    pub(crate) fn handle_engine_source_set(&mut self, src: String) {
        if !self.changing_source {
            let player_src = self.cache.source.url.clone();
            let keep_player_source = !player_src.is_empty()
                && !player_src.starts_with("blob:")
                && src.starts_with("blob:")
                && self
                    .last_source
                    .as_ref()
                    .map_or(true, |(player, engine)| *engine != src && *player != player_src);

            if src.is_empty() {
                self.awaiting_engine_src = true;
            } else if !keep_player_source {
                self.cache.update_source(&SourceDescriptor::from_url(src.clone()));
            }
        }

        self.last_source = Some((self.cache.source.url.clone(), src.clone()));
        debug!(player_id = %self.id, src = %core_runtime::logging::redact_url(&src), "Engine source set");
        self.emit(PlayerEvent::SourceSet { src });
    }

    /// Adopts the engine's source once it is known after an empty `sourceset`.
    pub(crate) fn adopt_engine_src(&mut self) {
        if !self.awaiting_engine_src {
            return;
        }
        self.awaiting_engine_src = false;
        let src = self.engine_src();
        if !src.is_empty() && src != self.cache.src {
            self.cache.update_source(&SourceDescriptor::from_url(src));
        }
    }

    // ========================================================================
    // Media Objects
    // ========================================================================

    /// Resets the player and loads `media` as a unit: sources, poster and
    /// remote text tracks. `ready` runs once the player is ready.
    pub fn load_media<F>(&mut self, media: MediaObject, ready: F)
    where
        F: FnOnce(&mut PlayerController) + 'static,
    {
        if self.disposed {
            return;
        }

        self.do_reset();

        let mut media = media;
        media.fill_artwork_from_poster();
        self.cache.media = Some(media.clone());

        if !media.src.is_empty() {
            self.src(media.src.clone());
        }
        if let Some(poster) = media.poster.clone() {
            self.set_poster(Some(poster));
        }
        for track in media.text_tracks {
            self.add_remote_text_track(track);
        }

        self.on_ready(ready);
    }

    /// The media object last passed to [`load_media`](Self::load_media), or
    /// one built from the current sources, poster and remote text tracks.
    pub fn get_media(&self) -> MediaObject {
        if let Some(media) = &self.cache.media {
            return media.clone();
        }

        let mut media = MediaObject::new(self.cache.sources.clone());
        if let Some(tracks) = self.text_tracks() {
            media.text_tracks = tracks
                .remote()
                .map(|track| TextTrackSnapshot {
                    kind: track.kind,
                    label: track.label.clone(),
                    language: track.language.clone(),
                    src: track.src.clone(),
                    ..TextTrackSnapshot::default()
                })
                .collect();
        }
        if let Some(poster) = &self.cache.poster {
            media.poster = Some(poster.clone());
            media.fill_artwork_from_poster();
        }
        media
    }

    pub fn poster(&self) -> Option<&str> {
        self.cache.poster.as_deref()
    }

    pub fn set_poster(&mut self, poster: Option<String>) {
        let poster = poster.filter(|url| !url.is_empty());
        if poster != self.cache.poster {
            self.cache.poster = poster;
            self.trigger_passthrough("posterchange");
        }
    }

    // ========================================================================
    // Text Tracks
    // ========================================================================

    pub fn text_tracks(&self) -> Option<&TextTrackList> {
        self.engine.as_deref().map(|engine| &engine.tracks().text)
    }

    /// Adds a remote text track to the current engine. Without an engine the
    /// track is queued for the next one and `None` is returned.
    pub fn add_remote_text_track(&mut self, track: TextTrackSnapshot) -> Option<TrackId> {
        let Some(engine) = self.engine.as_deref_mut() else {
            self.pending_text_tracks.push(track);
            return None;
        };
        match engine.add_remote_text_track(track.to_track()) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(player_id = %self.id, error = %err, "Failed to add remote text track");
                None
            }
        }
    }

    pub fn remove_remote_text_track(&mut self, id: TrackId) -> bool {
        self.engine
            .as_deref_mut()
            .and_then(|engine| engine.tracks_mut().text.remove(id))
            .is_some()
    }
}
