//! # Engine Abstractions
//!
//! An *engine* is a pluggable playback backend (a native media element, an
//! MSE-based streaming engine, a casting session). The controller drives every
//! engine through the same capability set:
//!
//! - [`EngineFactory`]: registered once per name in the
//!   [`EngineRegistry`](crate::registry::EngineRegistry). Answers capability
//!   questions without an instance and constructs engines.
//! - [`PlaybackEngine`]: a live engine owned by exactly one controller.
//!
//! ## Threading Model
//!
//! Factories live in a process-wide registry and must be `Send + Sync`.
//! Engine instances are owned by a single-threaded controller and carry no
//! such bound.
//!
//! ## Failure model
//!
//! Every engine operation returns a [`Result`]. Two failures have special
//! meaning to the controller:
//!
//! - [`PlaybackError::MethodUnavailable`]: the operation exists but the engine
//!   cannot serve it right now (e.g. it was torn down mid-call). The
//!   controller marks the engine not-ready and re-raises.
//! - [`PlaybackError::UndefinedMethod`]: the engine does not implement the
//!   operation at all. Optional operations default to this.

use crate::error::{MediaError, PlaybackError, Result};
use crate::events::EngineEvents;
use crate::registry::PlayerId;
use crate::source::SourceDescriptor;
use crate::tracks::{AudioTrack, EngineTracks, TextTrack, TrackId, VideoTrack};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Capability Answers
// ============================================================================

/// Answer to "can you play this?", mirroring `'probably' | 'maybe' | ''`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanPlay {
    Probably,
    Maybe,
    No,
}

impl CanPlay {
    pub fn is_playable(self) -> bool {
        !matches!(self, CanPlay::No)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CanPlay::Probably => "probably",
            CanPlay::Maybe => "maybe",
            CanPlay::No => "",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "probably" => CanPlay::Probably,
            "maybe" => CanPlay::Maybe,
            _ => CanPlay::No,
        }
    }
}

impl fmt::Display for CanPlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Time Ranges
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

/// Ordered, possibly empty, list of time ranges (buffered, seekable, played).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRanges(Vec<TimeRange>);

impl TimeRanges {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(start: f64, end: f64) -> Self {
        Self(vec![TimeRange { start, end }])
    }

    pub fn from_ranges(ranges: Vec<TimeRange>) -> Self {
        Self(ranges)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn start(&self, index: usize) -> Option<f64> {
        self.0.get(index).map(|range| range.start)
    }

    pub fn end(&self, index: usize) -> Option<f64> {
        self.0.get(index).map(|range| range.end)
    }

    /// End of the last range, or `0.0` when empty.
    pub fn last_end(&self) -> f64 {
        self.0.last().map(|range| range.end).unwrap_or(0.0)
    }

    pub fn ranges(&self) -> &[TimeRange] {
        &self.0
    }
}

// ============================================================================
// Engine Construction
// ============================================================================

/// Everything an engine receives at construction.
#[derive(Debug, Clone)]
pub struct EngineInit {
    /// Registered engine name.
    pub engine: String,
    pub player_id: PlayerId,
    /// `{player_id}_{engine}_api`
    pub engine_id: String,
    /// Source to load immediately, if any.
    pub source: Option<SourceDescriptor>,
    pub autoplay: bool,
    pub muted: bool,
    /// Engine options merged from every case-insensitive config key match.
    pub options: serde_json::Value,
    /// Audio tracks carried over from the previous engine.
    pub audio_tracks: Vec<AudioTrack>,
    /// Video tracks carried over from the previous engine.
    pub video_tracks: Vec<VideoTrack>,
    /// Position to resume from when reloading the same source.
    pub start_time: Option<f64>,
    pub events: EngineEvents,
}

/// Registered capability predicates and constructor for one engine type.
pub trait EngineFactory: Send + Sync {
    /// Whether the engine works in this environment at all.
    fn is_supported(&self) -> bool;

    /// Support level for a bare MIME type.
    fn can_play_type(&self, mime_type: &str) -> CanPlay;

    /// Support level for a full source, given the engine's options.
    fn can_play_source(&self, source: &SourceDescriptor, options: &serde_json::Value) -> CanPlay {
        let _ = options;
        self.can_play_type(&source.mime_type)
    }

    fn create(&self, init: EngineInit) -> Result<Box<dyn PlaybackEngine>>;
}

// ============================================================================
// Live Engine
// ============================================================================

/// A live playback backend.
///
/// Setters that change observable state are expected to signal the matching
/// [`MediaEvent`](crate::events::MediaEvent) through the engine's
/// [`EngineEvents`] sink.
pub trait PlaybackEngine {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn paused(&self) -> Result<bool>;

    fn current_time(&self) -> Result<f64>;
    fn set_current_time(&mut self, seconds: f64) -> Result<()>;
    fn duration(&self) -> Result<f64>;

    fn buffered(&self) -> Result<TimeRanges>;
    fn seekable(&self) -> Result<TimeRanges>;
    fn played(&self) -> Result<TimeRanges> {
        Err(PlaybackError::undefined("played"))
    }

    fn volume(&self) -> Result<f64>;
    fn set_volume(&mut self, volume: f64) -> Result<()>;
    fn muted(&self) -> Result<bool>;
    fn set_muted(&mut self, muted: bool) -> Result<()>;

    fn playback_rate(&self) -> Result<f64>;
    fn set_playback_rate(&mut self, rate: f64) -> Result<()>;

    fn seeking(&self) -> Result<bool>;
    fn ended(&self) -> Result<bool>;

    fn set_source(&mut self, source: &SourceDescriptor) -> Result<()>;
    /// Current source URL, empty when none.
    fn src(&self) -> Result<String>;
    fn load(&mut self) -> Result<()>;
    /// Returns the engine to its initial, source-less state.
    fn reset(&mut self) -> Result<()>;

    fn error(&self) -> Option<MediaError> {
        None
    }

    fn tracks(&self) -> &EngineTracks;
    fn tracks_mut(&mut self) -> &mut EngineTracks;

    fn add_remote_text_track(&mut self, track: TextTrack) -> Result<TrackId> {
        Ok(self.tracks_mut().text.add(track))
    }

    fn clear_text_tracks(&mut self) {
        self.tracks_mut().text.clear();
    }

    /// Whether the engine's element already lives in the player (an adopted
    /// media element). Detached engines are inserted by the controller.
    fn is_attached(&self) -> bool {
        false
    }

    fn attach(&mut self) {}

    /// Releases every resource. No signal may be sent afterwards.
    fn dispose(&mut self) {}
}

// ============================================================================
// Source Handlers
// ============================================================================

/// A source handler embedded in an engine (e.g. an HLS or DASH handler on
/// top of a native element).
pub trait SourceHandler: Send + Sync {
    fn name(&self) -> &str;

    fn can_play_type(&self, mime_type: &str) -> CanPlay;

    fn can_handle_source(&self, source: &SourceDescriptor, options: &serde_json::Value) -> CanPlay {
        let _ = options;
        self.can_play_type(&source.mime_type)
    }
}

/// Ordered list of source handlers. The first handler giving a non-empty
/// answer wins.
#[derive(Clone, Default)]
pub struct SourceHandlers {
    handlers: Vec<Arc<dyn SourceHandler>>,
}

impl SourceHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` at `index`, or last when `None`.
    pub fn register(&mut self, handler: Arc<dyn SourceHandler>, index: Option<usize>) {
        let index = index.unwrap_or(self.handlers.len()).min(self.handlers.len());
        self.handlers.insert(index, handler);
    }

    pub fn can_play_type(&self, mime_type: &str) -> CanPlay {
        self.handlers
            .iter()
            .map(|handler| handler.can_play_type(mime_type))
            .find(|answer| answer.is_playable())
            .unwrap_or(CanPlay::No)
    }

    pub fn can_play_source(&self, source: &SourceDescriptor, options: &serde_json::Value) -> CanPlay {
        self.select(source, options)
            .map(|(_, answer)| answer)
            .unwrap_or(CanPlay::No)
    }

    /// First handler able to play `source`, with its answer.
    pub fn select(
        &self,
        source: &SourceDescriptor,
        options: &serde_json::Value,
    ) -> Option<(Arc<dyn SourceHandler>, CanPlay)> {
        self.handlers.iter().find_map(|handler| {
            let answer = handler.can_handle_source(source, options);
            answer.is_playable().then(|| (Arc::clone(handler), answer))
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for SourceHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandlers")
            .field("handlers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Prefix {
        name: &'static str,
        prefix: &'static str,
        answer: CanPlay,
    }

    impl SourceHandler for Prefix {
        fn name(&self) -> &str {
            self.name
        }

        fn can_play_type(&self, mime_type: &str) -> CanPlay {
            if mime_type.starts_with(self.prefix) {
                self.answer
            } else {
                CanPlay::No
            }
        }
    }

    #[test]
    fn test_can_play_strings() {
        assert_eq!(CanPlay::parse("probably"), CanPlay::Probably);
        assert_eq!(CanPlay::parse(""), CanPlay::No);
        assert_eq!(CanPlay::Maybe.to_string(), "maybe");
        assert!(!CanPlay::No.is_playable());
    }

    #[test]
    fn test_time_ranges() {
        let ranges = TimeRanges::from_ranges(vec![
            TimeRange { start: 0.0, end: 4.0 },
            TimeRange { start: 10.0, end: 12.5 },
        ]);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges.start(1), Some(10.0));
        assert_eq!(ranges.last_end(), 12.5);
        assert_eq!(TimeRanges::empty().last_end(), 0.0);
        assert_eq!(ranges.end(5), None);
    }

    #[test]
    fn test_source_handlers_first_non_empty_wins() {
        let mut handlers = SourceHandlers::new();
        handlers.register(
            Arc::new(Prefix { name: "native", prefix: "video/", answer: CanPlay::Maybe }),
            None,
        );
        handlers.register(
            Arc::new(Prefix { name: "hls", prefix: "application/x-mpegURL", answer: CanPlay::Probably }),
            None,
        );
        handlers.register(
            Arc::new(Prefix { name: "mp4-only", prefix: "video/mp4", answer: CanPlay::Probably }),
            Some(0),
        );

        assert_eq!(handlers.names(), vec!["mp4-only", "native", "hls"]);
        assert_eq!(handlers.can_play_type("video/mp4"), CanPlay::Probably);
        assert_eq!(handlers.can_play_type("video/webm"), CanPlay::Maybe);
        assert_eq!(handlers.can_play_type("audio/flac"), CanPlay::No);

        let source = SourceDescriptor::new("a.m3u8", "application/x-mpegURL");
        let (handler, answer) = handlers.select(&source, &serde_json::Value::Null).unwrap();
        assert_eq!(handler.name(), "hls");
        assert_eq!(answer, CanPlay::Probably);
    }
}
