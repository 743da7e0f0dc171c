//! # Playback Events
//!
//! Two event surfaces meet in the controller:
//!
//! - **Engine signals**: engines report readiness, media events and source
//!   changes through the [`EngineEvents`] sink they receive at construction.
//!   Signals are tagged with the engine generation so the controller can drop
//!   anything a disposed engine still emits.
//! - **Player events**: everything observable about a player is published as
//!   a [`PlayerEvent`] on a `core_runtime::events::EventBus`.

use crate::config::AutoplayMode;
use crate::controller::PlaybackState;
use crate::error::MediaError;
use core_runtime::events::EventSeverity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;

// ============================================================================
// Media Events
// ============================================================================

/// Events every engine can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaEvent {
    LoadStart,
    LoadedMetadata,
    LoadedData,
    Progress,
    Abort,
    Suspend,
    Emptied,
    Stalled,
    TimeUpdate,
    Resize,
    VolumeChange,
    TextTrackChange,
    CanPlay,
    CanPlayThrough,
    Playing,
    Seeking,
    Seeked,
    Play,
    Pause,
    Ended,
    DurationChange,
    RateChange,
    Error,
}

impl MediaEvent {
    pub const ALL: [MediaEvent; 23] = [
        MediaEvent::LoadStart,
        MediaEvent::LoadedMetadata,
        MediaEvent::LoadedData,
        MediaEvent::Progress,
        MediaEvent::Abort,
        MediaEvent::Suspend,
        MediaEvent::Emptied,
        MediaEvent::Stalled,
        MediaEvent::TimeUpdate,
        MediaEvent::Resize,
        MediaEvent::VolumeChange,
        MediaEvent::TextTrackChange,
        MediaEvent::CanPlay,
        MediaEvent::CanPlayThrough,
        MediaEvent::Playing,
        MediaEvent::Seeking,
        MediaEvent::Seeked,
        MediaEvent::Play,
        MediaEvent::Pause,
        MediaEvent::Ended,
        MediaEvent::DurationChange,
        MediaEvent::RateChange,
        MediaEvent::Error,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MediaEvent::LoadStart => "loadstart",
            MediaEvent::LoadedMetadata => "loadedmetadata",
            MediaEvent::LoadedData => "loadeddata",
            MediaEvent::Progress => "progress",
            MediaEvent::Abort => "abort",
            MediaEvent::Suspend => "suspend",
            MediaEvent::Emptied => "emptied",
            MediaEvent::Stalled => "stalled",
            MediaEvent::TimeUpdate => "timeupdate",
            MediaEvent::Resize => "resize",
            MediaEvent::VolumeChange => "volumechange",
            MediaEvent::TextTrackChange => "texttrackchange",
            MediaEvent::CanPlay => "canplay",
            MediaEvent::CanPlayThrough => "canplaythrough",
            MediaEvent::Playing => "playing",
            MediaEvent::Seeking => "seeking",
            MediaEvent::Seeked => "seeked",
            MediaEvent::Play => "play",
            MediaEvent::Pause => "pause",
            MediaEvent::Ended => "ended",
            MediaEvent::DurationChange => "durationchange",
            MediaEvent::RateChange => "ratechange",
            MediaEvent::Error => "error",
        }
    }

    /// Events held back while the playback rate is zero and a seek is in
    /// progress.
    pub fn is_rate_gated(self) -> bool {
        matches!(
            self,
            MediaEvent::CanPlay | MediaEvent::CanPlayThrough | MediaEvent::Playing | MediaEvent::Seeked
        )
    }
}

impl fmt::Display for MediaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MediaEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        MediaEvent::ALL
            .iter()
            .copied()
            .find(|event| event.name() == lower)
            .ok_or_else(|| format!("Unknown media event: {}", s))
    }
}

// ============================================================================
// Engine Signals
// ============================================================================

/// What an engine can report to its controller.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotice {
    /// The engine accepts commands synchronously from now on.
    Ready,
    Media(MediaEvent),
    /// The engine's source changed; an empty `src` means it is not yet known.
    SourceSet { src: String },
}

pub(crate) type EngineSignal = (u64, EngineNotice);
pub(crate) type EngineReceiver = mpsc::UnboundedReceiver<EngineSignal>;

/// Sink an engine uses to signal its controller.
///
/// Sending never blocks. Signals sent after the controller went away are
/// silently discarded and reported as `false`.
#[derive(Debug, Clone)]
pub struct EngineEvents {
    generation: u64,
    sender: mpsc::UnboundedSender<EngineSignal>,
}

impl EngineEvents {
    pub(crate) fn new(generation: u64, sender: mpsc::UnboundedSender<EngineSignal>) -> Self {
        Self { generation, sender }
    }

    /// A sink wired to a fresh receiver, for driving engines in isolation.
    pub(crate) fn channel(generation: u64) -> (Self, EngineReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(generation, sender), receiver)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ready(&self) -> bool {
        self.send(EngineNotice::Ready)
    }

    pub fn emit(&self, event: MediaEvent) -> bool {
        self.send(EngineNotice::Media(event))
    }

    pub fn source_set(&self, src: impl Into<String>) -> bool {
        self.send(EngineNotice::SourceSet { src: src.into() })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn send(&self, notice: EngineNotice) -> bool {
        self.sender.send((self.generation, notice)).is_ok()
    }
}

// ============================================================================
// Player Events
// ============================================================================

/// Observable player events.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Re-emitted engine event.
    Media(MediaEvent),
    /// The player flushed its ready callbacks.
    Ready,
    SourceSet { src: String },
    Error(MediaError),
    PlayerReset,
    StateChanged {
        from: PlaybackState,
        to: PlaybackState,
    },
    EngineLoaded {
        engine: String,
        engine_id: String,
        /// The controller inserted the engine's element into the player.
        mounted: bool,
    },
    FirstPlay,
    AutoplaySuccess { mode: AutoplayMode },
    AutoplayFailure { mode: AutoplayMode },
    Disposed,
    /// Collaborator events (fullscreen, picture-in-picture) passed through.
    Passthrough { name: String },
}

impl PlayerEvent {
    pub fn name(&self) -> &str {
        match self {
            PlayerEvent::Media(event) => event.name(),
            PlayerEvent::Ready => "ready",
            PlayerEvent::SourceSet { .. } => "sourceset",
            PlayerEvent::Error(_) => "error",
            PlayerEvent::PlayerReset => "playerreset",
            PlayerEvent::StateChanged { .. } => "statechange",
            PlayerEvent::EngineLoaded { .. } => "engineloaded",
            PlayerEvent::FirstPlay => "firstplay",
            PlayerEvent::AutoplaySuccess { .. } => "autoplay-success",
            PlayerEvent::AutoplayFailure { .. } => "autoplay-failure",
            PlayerEvent::Disposed => "dispose",
            PlayerEvent::Passthrough { name } => name,
        }
    }

    pub fn is_media(&self, event: MediaEvent) -> bool {
        matches!(self, PlayerEvent::Media(inner) if *inner == event)
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> String {
        match self {
            PlayerEvent::Media(event) => format!("Media event: {}", event),
            PlayerEvent::Ready => "Player ready".to_string(),
            PlayerEvent::SourceSet { src } => format!(
                "Source set: {}",
                core_runtime::logging::redact_url(src)
            ),
            PlayerEvent::Error(err) => format!("Player error: {}", err),
            PlayerEvent::PlayerReset => "Player reset".to_string(),
            PlayerEvent::StateChanged { from, to } => {
                format!("State changed: {:?} -> {:?}", from, to)
            }
            PlayerEvent::EngineLoaded { engine, .. } => format!("Engine loaded: {}", engine),
            PlayerEvent::FirstPlay => "First play".to_string(),
            PlayerEvent::AutoplaySuccess { mode } => format!("Autoplay succeeded ({:?})", mode),
            PlayerEvent::AutoplayFailure { mode } => format!("Autoplay failed ({:?})", mode),
            PlayerEvent::Disposed => "Player disposed".to_string(),
            PlayerEvent::Passthrough { name } => format!("Passthrough event: {}", name),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            PlayerEvent::Error(_) | PlayerEvent::Media(MediaEvent::Error) => EventSeverity::Error,
            PlayerEvent::AutoplayFailure { .. }
            | PlayerEvent::Media(MediaEvent::Stalled)
            | PlayerEvent::Media(MediaEvent::Abort) => EventSeverity::Warning,
            PlayerEvent::Media(MediaEvent::TimeUpdate)
            | PlayerEvent::Media(MediaEvent::Progress)
            | PlayerEvent::StateChanged { .. } => EventSeverity::Debug,
            _ => EventSeverity::Info,
        }
    }
}
