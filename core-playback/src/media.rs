//! Media objects: a source list plus presentation metadata, loaded as a unit
//! through `load_media`.

use crate::source::{mime_type_from_extension, SourceDescriptor};
use crate::tracks::TextTrackSnapshot;
use serde::{Deserialize, Serialize};

/// Artwork image for media sessions and posters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Artwork {
    pub src: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
}

impl Artwork {
    pub fn from_url(src: impl Into<String>) -> Self {
        let src = src.into();
        let mime_type = mime_type_from_extension(&src).unwrap_or_default().to_string();
        Self { src, mime_type }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaObject {
    pub src: Vec<SourceDescriptor>,
    pub poster: Option<String>,
    pub artwork: Vec<Artwork>,
    pub text_tracks: Vec<TextTrackSnapshot>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub description: Option<String>,
}

impl MediaObject {
    pub fn new(src: Vec<SourceDescriptor>) -> Self {
        Self {
            src,
            ..Self::default()
        }
    }

    pub fn with_poster(mut self, poster: impl Into<String>) -> Self {
        self.poster = Some(poster.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text_track(mut self, track: TextTrackSnapshot) -> Self {
        self.text_tracks.push(track);
        self
    }

    /// Artwork defaults to the poster when none is given.
    pub fn fill_artwork_from_poster(&mut self) {
        if self.artwork.is_empty() {
            if let Some(poster) = &self.poster {
                self.artwork.push(Artwork::from_url(poster.clone()));
            }
        }
    }
}
