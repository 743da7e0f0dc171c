//! Scripted fake engine shared by the integration tests.
//!
//! Every engine a [`FakeFactory`] creates is recorded as a [`FakeHandle`],
//! which shares the engine's state and its event sink so tests can inspect
//! calls and emit signals as the engine would.

#![allow(dead_code)]

use core_playback::error::{MediaError, PlaybackError, Result};
use core_playback::tracks::{AudioTrack, EngineTracks};
use core_playback::{
    CanPlay, EngineEvents, EngineFactory, EngineInit, EngineRegistry, MediaEvent, MiddlewareRegistry,
    PlaybackEngine, PlayerConfig, PlayerController, PlayerEvent, PlayerRegistry, SourceDescriptor,
    TimeRanges,
};
use core_runtime::events::Receiver;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Engine State
// ============================================================================

#[derive(Debug, Clone)]
pub struct EngineState {
    pub paused: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub muted: bool,
    pub rate: f64,
    pub seeking: bool,
    pub ended: bool,
    pub src: String,
    pub buffered: TimeRanges,
    pub error: Option<MediaError>,
    pub calls: Vec<String>,
    /// `play()` fails with this reason while set.
    pub reject_play: Option<String>,
    /// `play()` fails unless the engine is muted.
    pub reject_unmuted_play: bool,
    /// Methods that fail with `MethodUnavailable`.
    pub unavailable: HashSet<&'static str>,
    pub disposed: bool,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            paused: true,
            current_time: 0.0,
            duration: f64::NAN,
            volume: 1.0,
            muted: false,
            rate: 1.0,
            seeking: false,
            ended: false,
            src: String::new(),
            buffered: TimeRanges::empty(),
            error: None,
            calls: Vec::new(),
            reject_play: None,
            reject_unmuted_play: false,
            unavailable: HashSet::new(),
            disposed: false,
        }
    }
}

pub type SharedState = Arc<Mutex<EngineState>>;

/// Test-side view of one created engine.
#[derive(Debug, Clone)]
pub struct FakeHandle {
    pub name: String,
    pub state: SharedState,
    pub events: EngineEvents,
    pub source: Option<SourceDescriptor>,
    pub muted_at_init: bool,
    pub autoplay: bool,
    pub options: serde_json::Value,
    pub audio_tracks: Vec<AudioTrack>,
    pub start_time: Option<f64>,
    pub engine_id: String,
}

impl FakeHandle {
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn called(&self, method: &str) -> bool {
        self.state.lock().calls.iter().any(|call| call == method)
    }

    pub fn emit(&self, event: MediaEvent) {
        self.events.emit(event);
    }

    pub fn ready(&self) {
        self.events.ready();
    }

    pub fn set(&self, update: impl FnOnce(&mut EngineState)) {
        update(&mut self.state.lock());
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

// ============================================================================
// Factory
// ============================================================================

pub struct FakeFactory {
    name: String,
    types: Vec<String>,
    supported: bool,
    auto_ready: bool,
    fail_create: bool,
    seed_audio: Vec<AudioTrack>,
    created: Arc<Mutex<Vec<FakeHandle>>>,
}

impl FakeFactory {
    pub fn new(name: &str, types: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            types: types.iter().map(|t| t.to_string()).collect(),
            supported: true,
            auto_ready: true,
            fail_create: false,
            seed_audio: Vec::new(),
            created: Arc::default(),
        }
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Engines stay not-ready until the test calls [`FakeHandle::ready`].
    pub fn manual_ready(mut self) -> Self {
        self.auto_ready = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Audio tracks a fresh engine discovers when none are carried over.
    pub fn with_audio_tracks(mut self, tracks: Vec<AudioTrack>) -> Self {
        self.seed_audio = tracks;
        self
    }

    pub fn created(&self) -> Arc<Mutex<Vec<FakeHandle>>> {
        Arc::clone(&self.created)
    }
}

impl EngineFactory for FakeFactory {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn can_play_type(&self, mime_type: &str) -> CanPlay {
        if self.types.iter().any(|t| t == mime_type) {
            CanPlay::Probably
        } else {
            CanPlay::No
        }
    }

    fn create(&self, init: EngineInit) -> Result<Box<dyn PlaybackEngine>> {
        if self.fail_create {
            return Err(PlaybackError::Internal("element could not be created".into()));
        }

        let state = SharedState::default();
        {
            let mut state = state.lock();
            state.muted = init.muted;
            state.calls.push("create".into());
            if let Some(source) = &init.source {
                state.src = source.url.clone();
            }
        }

        let mut tracks = EngineTracks::new();
        tracks.audio = if init.audio_tracks.is_empty() {
            self.seed_audio.clone()
        } else {
            init.audio_tracks.clone()
        };
        tracks.video = init.video_tracks.clone();

        let handle = FakeHandle {
            name: self.name.clone(),
            state: Arc::clone(&state),
            events: init.events.clone(),
            source: init.source.clone(),
            muted_at_init: init.muted,
            autoplay: init.autoplay,
            options: init.options.clone(),
            audio_tracks: init.audio_tracks.clone(),
            start_time: init.start_time,
            engine_id: init.engine_id.clone(),
        };
        self.created.lock().push(handle);

        if self.auto_ready {
            init.events.ready();
            if init.source.is_some() {
                init.events.emit(MediaEvent::LoadStart);
            }
        }

        Ok(Box::new(FakeEngine {
            state,
            events: init.events,
            tracks,
        }))
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct FakeEngine {
    state: SharedState,
    events: EngineEvents,
    tracks: EngineTracks,
}

impl FakeEngine {
    fn check(&self, method: &'static str) -> Result<()> {
        let state = self.state.lock();
        if state.disposed || state.unavailable.contains(method) {
            return Err(PlaybackError::unavailable("fake", method));
        }
        Ok(())
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().calls.push(call.into());
    }
}

impl PlaybackEngine for FakeEngine {
    fn play(&mut self) -> Result<()> {
        self.check("play")?;
        self.record("play");
        {
            let state = self.state.lock();
            if let Some(reason) = state.reject_play.clone() {
                return Err(PlaybackError::PlaybackRejected(reason));
            }
            if state.reject_unmuted_play && !state.muted {
                return Err(PlaybackError::PlaybackRejected("NotAllowedError".into()));
            }
        }
        self.state.lock().paused = false;
        self.events.emit(MediaEvent::Play);
        self.events.emit(MediaEvent::Playing);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.check("pause")?;
        self.record("pause");
        self.state.lock().paused = true;
        self.events.emit(MediaEvent::Pause);
        Ok(())
    }

    fn paused(&self) -> Result<bool> {
        self.check("paused")?;
        Ok(self.state.lock().paused)
    }

    fn current_time(&self) -> Result<f64> {
        self.check("currentTime")?;
        Ok(self.state.lock().current_time)
    }

    fn set_current_time(&mut self, seconds: f64) -> Result<()> {
        self.check("setCurrentTime")?;
        self.record(format!("setCurrentTime({})", seconds));
        self.state.lock().current_time = seconds;
        Ok(())
    }

    fn duration(&self) -> Result<f64> {
        Ok(self.state.lock().duration)
    }

    fn buffered(&self) -> Result<TimeRanges> {
        Ok(self.state.lock().buffered.clone())
    }

    fn seekable(&self) -> Result<TimeRanges> {
        let duration = self.state.lock().duration;
        if duration.is_finite() {
            Ok(TimeRanges::single(0.0, duration))
        } else {
            Ok(TimeRanges::empty())
        }
    }

    fn volume(&self) -> Result<f64> {
        self.check("volume")?;
        Ok(self.state.lock().volume)
    }

    fn set_volume(&mut self, volume: f64) -> Result<()> {
        self.check("setVolume")?;
        self.record(format!("setVolume({})", volume));
        self.state.lock().volume = volume;
        Ok(())
    }

    fn muted(&self) -> Result<bool> {
        Ok(self.state.lock().muted)
    }

    fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.record(format!("setMuted({})", muted));
        self.state.lock().muted = muted;
        Ok(())
    }

    fn playback_rate(&self) -> Result<f64> {
        Ok(self.state.lock().rate)
    }

    fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        self.record(format!("setPlaybackRate({})", rate));
        self.state.lock().rate = rate;
        self.events.emit(MediaEvent::RateChange);
        Ok(())
    }

    fn seeking(&self) -> Result<bool> {
        Ok(self.state.lock().seeking)
    }

    fn ended(&self) -> Result<bool> {
        Ok(self.state.lock().ended)
    }

    fn set_source(&mut self, source: &SourceDescriptor) -> Result<()> {
        self.record(format!("setSource({})", source.url));
        self.state.lock().src = source.url.clone();
        self.events.emit(MediaEvent::LoadStart);
        Ok(())
    }

    fn src(&self) -> Result<String> {
        Ok(self.state.lock().src.clone())
    }

    fn load(&mut self) -> Result<()> {
        self.record("load");
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.record("reset");
        let mut state = self.state.lock();
        state.src.clear();
        state.paused = true;
        Ok(())
    }

    fn error(&self) -> Option<MediaError> {
        self.state.lock().error.clone()
    }

    fn tracks(&self) -> &EngineTracks {
        &self.tracks
    }

    fn tracks_mut(&mut self) -> &mut EngineTracks {
        &mut self.tracks
    }

    fn dispose(&mut self) {
        let mut state = self.state.lock();
        state.calls.push("dispose".into());
        state.disposed = true;
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Isolated registries plus the factories registered in them.
pub struct Harness {
    pub engines: EngineRegistry,
    pub middleware: MiddlewareRegistry,
    pub players: PlayerRegistry,
    pub created: Vec<(String, Arc<Mutex<Vec<FakeHandle>>>)>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            engines: EngineRegistry::new(),
            middleware: MiddlewareRegistry::new(),
            players: PlayerRegistry::new(),
            created: Vec::new(),
        }
    }

    pub fn with_engine(mut self, factory: FakeFactory) -> Self {
        let name = factory.name.clone();
        self.created.push((name.clone(), factory.created()));
        self.engines.register(&name, factory).expect("register fake engine");
        self
    }

    /// The default pair: `html5` plays mp4, `hls` plays HLS.
    pub fn standard() -> Self {
        Self::new()
            .with_engine(FakeFactory::new("html5", &["video/mp4", "video/webm"]))
            .with_engine(FakeFactory::new("hls", &["application/x-mpegURL"]))
    }

    pub fn player(&self, config: PlayerConfig) -> PlayerController {
        PlayerController::builder()
            .config(config)
            .engines(self.engines.clone())
            .middleware(self.middleware.clone())
            .players(self.players.clone())
            .build()
            .expect("build player")
    }

    pub fn default_player(&self) -> PlayerController {
        self.player(PlayerConfig::default())
    }

    /// Every engine created for `name`, oldest first.
    pub fn handles(&self, name: &str) -> Vec<FakeHandle> {
        self.created
            .iter()
            .find(|(engine, _)| engine == name)
            .map(|(_, created)| created.lock().clone())
            .unwrap_or_default()
    }

    pub fn last(&self, name: &str) -> FakeHandle {
        self.handles(name)
            .last()
            .cloned()
            .unwrap_or_else(|| panic!("no `{}` engine created", name))
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn mp4(url: &str) -> SourceDescriptor {
    SourceDescriptor::new(url, "video/mp4")
}

pub fn hls(url: &str) -> SourceDescriptor {
    SourceDescriptor::new(url, "application/x-mpegURL")
}

/// Every event received so far.
pub fn drain(events: &mut Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn names(events: &[PlayerEvent]) -> Vec<String> {
    events.iter().map(|event| event.name().to_string()).collect()
}

pub fn count(events: &[PlayerEvent], predicate: impl Fn(&PlayerEvent) -> bool) -> usize {
    events.iter().filter(|event| predicate(event)).count()
}
