//! Per-controller cache of the last known engine state and source.
//!
//! The cache is owned by exactly one controller. It is reset whenever the
//! player resets and rehydrated from the live engine on getter calls.

use crate::media::MediaObject;
use crate::source::{find_mime_type, merge_sources, SourceDescriptor};

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerCache {
    pub current_time: f64,
    /// Seek target deferred until the engine can play.
    pub init_time: f64,
    /// `NaN` until known, `INFINITY` for live streams.
    pub duration: f64,
    pub volume: f64,
    /// Last non-zero volume, restored when unmuting through volume controls.
    pub last_volume: f64,
    pub last_playback_rate: f64,
    pub source: SourceDescriptor,
    pub sources: Vec<SourceDescriptor>,
    pub src: String,
    pub poster: Option<String>,
    pub media: Option<MediaObject>,
}

impl PlayerCache {
    pub fn new(default_playback_rate: f64) -> Self {
        Self {
            current_time: 0.0,
            init_time: 0.0,
            duration: f64::NAN,
            volume: 1.0,
            last_volume: 1.0,
            last_playback_rate: default_playback_rate,
            source: SourceDescriptor::default(),
            sources: Vec::new(),
            src: String::new(),
            poster: None,
            media: None,
        }
    }

    pub fn reset(&mut self, default_playback_rate: f64) {
        *self = Self::new(default_playback_rate);
    }

    /// Makes `source` the current source.
    ///
    /// A missing MIME type is looked up in the cached list first. If the URL
    /// is not part of the cached list, the list is replaced by this source.
    pub fn update_source(&mut self, source: &SourceDescriptor) {
        let mut source = source.clone();
        if !source.url.is_empty() && source.mime_type.is_empty() {
            source.mime_type = find_mime_type(&source.url, &self.sources).unwrap_or_default();
        }

        let known = self
            .sources
            .iter()
            .any(|cached| !cached.url.is_empty() && cached.url == source.url);
        if !known {
            self.sources = vec![source.clone()];
        }

        self.src = source.url.clone();
        self.source = source;
    }

    /// Makes a middleware-resolved `source` current, merging it into the
    /// cached list without duplicating existing `(url, type)` entries.
    pub fn adopt_resolved(&mut self, source: &SourceDescriptor) {
        merge_sources(&mut self.sources, std::slice::from_ref(source));
        self.src = source.url.clone();
        self.source = source.clone();
    }

    pub fn remember_volume(&mut self, volume: f64) {
        self.volume = volume;
        if volume > 0.0 {
            self.last_volume = volume;
        }
    }
}
