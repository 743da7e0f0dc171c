//! # Track Lists & Track Synchronisation
//!
//! Engines embed an [`EngineTracks`] value holding their text, audio and
//! video track lists. When the controller swaps engines, the
//! [`TrackSynchronizer`] converts the outgoing engine's text tracks into plain
//! data ([`TextTrackSnapshot`]) and replays them into the incoming engine.
//!
//! ## Snapshot format
//!
//! Snapshots serialise to the JSON shape used by web players:
//!
//! ```json
//! [{"kind":"captions","label":"English","language":"en","id":"t1","mode":"showing",
//!   "src":null,"cues":[{"startTime":0.0,"endTime":1.5,"text":"Hello","id":"c1"}]}]
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle of a live track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(u64);

impl TrackId {
    fn next() -> Self {
        TrackId(NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

// ============================================================================
// Cues
// ============================================================================

/// A single timed text cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    #[serde(default)]
    pub id: String,
}

impl Cue {
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            text: text.into(),
            id: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Whether the cue is displayed at `time`.
    pub fn is_active_at(&self, time: f64) -> bool {
        self.start_time <= time && time < self.end_time
    }
}

// ============================================================================
// Text Tracks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTrackKind {
    #[default]
    Subtitles,
    Captions,
    Descriptions,
    Chapters,
    Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTrackMode {
    #[default]
    Disabled,
    Hidden,
    Showing,
}

/// A live text track owned by an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TextTrack {
    handle: TrackId,
    pub kind: TextTrackKind,
    pub label: String,
    pub language: String,
    pub id: String,
    pub mode: TextTrackMode,
    /// Remote WebVTT location. Tracks without one carry their cues inline.
    pub src: Option<String>,
    /// Added through the remote-track API rather than discovered in the media.
    pub remote: bool,
    cues: Vec<Cue>,
}

impl TextTrack {
    pub fn new(kind: TextTrackKind) -> Self {
        Self {
            handle: TrackId::next(),
            kind,
            label: String::new(),
            language: String::new(),
            id: String::new(),
            mode: TextTrackMode::default(),
            src: None,
            remote: false,
            cues: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_mode(mut self, mode: TextTrackMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn handle(&self) -> TrackId {
        self.handle
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    /// Adds a cue, keeping cues ordered by start time.
    pub fn add_cue(&mut self, cue: Cue) {
        let position = self
            .cues
            .iter()
            .position(|existing| existing.start_time > cue.start_time)
            .unwrap_or(self.cues.len());
        self.cues.insert(position, cue);
    }

    /// Removes the first cue with the given id.
    pub fn remove_cue(&mut self, id: &str) -> Option<Cue> {
        let index = self.cues.iter().position(|cue| cue.id == id)?;
        Some(self.cues.remove(index))
    }

    pub fn active_cues(&self, time: f64) -> impl Iterator<Item = &Cue> {
        self.cues.iter().filter(move |cue| cue.is_active_at(time))
    }

    /// Cue-only tracks have no remote source to reload from.
    pub fn is_cue_only(&self) -> bool {
        self.src.is_none()
    }
}

/// Ordered list of an engine's text tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextTrackList {
    tracks: Vec<TextTrack>,
}

impl TextTrackList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, track: TextTrack) -> TrackId {
        let handle = track.handle;
        self.tracks.push(track);
        handle
    }

    pub fn remove(&mut self, handle: TrackId) -> Option<TextTrack> {
        let index = self.tracks.iter().position(|track| track.handle == handle)?;
        Some(self.tracks.remove(index))
    }

    pub fn get(&self, handle: TrackId) -> Option<&TextTrack> {
        self.tracks.iter().find(|track| track.handle == handle)
    }

    pub fn get_mut(&mut self, handle: TrackId) -> Option<&mut TextTrack> {
        self.tracks.iter_mut().find(|track| track.handle == handle)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&TextTrack> {
        self.tracks.iter().find(|track| track.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextTrack> {
        self.tracks.iter()
    }

    pub fn remote(&self) -> impl Iterator<Item = &TextTrack> {
        self.tracks.iter().filter(|track| track.remote)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

// ============================================================================
// Audio / Video Tracks
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioTrack {
    pub id: String,
    pub kind: String,
    pub label: String,
    pub language: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoTrack {
    pub id: String,
    pub kind: String,
    pub label: String,
    pub language: String,
    pub selected: bool,
}

/// Track lists embedded by every engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineTracks {
    pub text: TextTrackList,
    pub audio: Vec<AudioTrack>,
    pub video: Vec<VideoTrack>,
}

impl EngineTracks {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Plain-data copy of a text track.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextTrackSnapshot {
    pub kind: TextTrackKind,
    pub label: String,
    pub language: String,
    pub id: String,
    pub mode: TextTrackMode,
    pub src: Option<String>,
    pub cues: Vec<Cue>,
}

impl From<&TextTrack> for TextTrackSnapshot {
    fn from(track: &TextTrack) -> Self {
        Self {
            kind: track.kind,
            label: track.label.clone(),
            language: track.language.clone(),
            id: track.id.clone(),
            mode: track.mode,
            src: track.src.clone(),
            cues: track.cues.clone(),
        }
    }
}

impl TextTrackSnapshot {
    /// Rebuilds a remote track. Cues are only replayed for cue-only tracks;
    /// tracks with a `src` reload their cues from it.
    pub fn to_track(&self) -> TextTrack {
        let mut track = TextTrack::new(self.kind)
            .with_label(self.label.clone())
            .with_language(self.language.clone())
            .with_id(self.id.clone())
            .with_mode(self.mode);
        track.src = self.src.clone();
        track.remote = true;
        if track.is_cue_only() {
            for cue in &self.cues {
                track.add_cue(cue.clone());
            }
        }
        track
    }
}

/// Snapshot of every track list of an engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackListSnapshot {
    pub text: Vec<TextTrackSnapshot>,
    pub audio: Vec<AudioTrack>,
    pub video: Vec<VideoTrack>,
}

impl TrackListSnapshot {
    pub fn capture(tracks: &EngineTracks) -> Self {
        Self {
            text: tracks.text.iter().map(TextTrackSnapshot::from).collect(),
            audio: tracks.audio.clone(),
            video: tracks.video.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.audio.is_empty() && self.video.is_empty()
    }

    /// Serialises the text tracks to the JSON array shape.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.text)?)
    }

    /// Parses a JSON array of text tracks.
    pub fn from_json(json: &str) -> Result<Self> {
        let text: Vec<TextTrackSnapshot> = serde_json::from_str(json)?;
        Ok(Self {
            text,
            ..Self::default()
        })
    }
}

// ============================================================================
// Synchroniser
// ============================================================================

/// Carries track state from one engine to the next.
///
/// A snapshot is taken once before disposal and consumed once on restore,
/// so each swap performs at most one conversion round-trip.
#[derive(Debug, Default)]
pub struct TrackSynchronizer {
    snapshot: Option<TrackListSnapshot>,
}

impl TrackSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the outgoing engine's tracks, replacing any unconsumed snapshot.
    pub fn snapshot(&mut self, tracks: &EngineTracks) -> &TrackListSnapshot {
        let snapshot = TrackListSnapshot::capture(tracks);
        debug!(
            text = snapshot.text.len(),
            audio = snapshot.audio.len(),
            video = snapshot.video.len(),
            "Captured track lists"
        );
        self.snapshot.insert(snapshot)
    }

    /// Audio and video tracks to hand the next engine at construction.
    pub fn pending_av_tracks(&self) -> (Vec<AudioTrack>, Vec<VideoTrack>) {
        self.snapshot
            .as_ref()
            .map(|snapshot| (snapshot.audio.clone(), snapshot.video.clone()))
            .unwrap_or_default()
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Takes the pending snapshot without replaying it.
    pub fn take(&mut self) -> Option<TrackListSnapshot> {
        self.snapshot.take()
    }

    /// Replays the pending text tracks into `tracks`. Returns how many were
    /// restored.
    pub fn restore(&mut self, tracks: &mut EngineTracks) -> usize {
        let Some(snapshot) = self.snapshot.take() else {
            return 0;
        };

        for text in &snapshot.text {
            tracks.text.add(text.to_track());
        }
        debug!(restored = snapshot.text.len(), "Restored text tracks");
        snapshot.text.len()
    }
}
