//! # Media Sources
//!
//! A source is a `(url, mime type)` pair. Callers hand the controller a URL
//! string, a single descriptor or (possibly nested) lists of either;
//! [`filter_sources`] normalises that into a flat list of descriptors with a
//! MIME type wherever one can be inferred.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies playable media. Identity is the `(url, mime_type)` tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    #[serde(rename = "src", alias = "url")]
    pub url: String,
    #[serde(rename = "type", alias = "mimeType", default)]
    pub mime_type: String,
}

impl SourceDescriptor {
    pub fn new(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Descriptor with the MIME type inferred from the URL extension.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let mime_type = mime_type_from_extension(&url).unwrap_or_default().to_string();
        Self { url, mime_type }
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let url = core_runtime::logging::redact_url(&self.url);
        if self.mime_type.is_empty() {
            write!(f, "{}", url)
        } else {
            write!(f, "{} ({})", url, self.mime_type)
        }
    }
}

/// Anything a caller may pass to `src()`.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceInput {
    Url(String),
    Source(SourceDescriptor),
    List(Vec<SourceInput>),
}

impl From<&str> for SourceInput {
    fn from(url: &str) -> Self {
        SourceInput::Url(url.to_string())
    }
}

impl From<String> for SourceInput {
    fn from(url: String) -> Self {
        SourceInput::Url(url)
    }
}

impl From<SourceDescriptor> for SourceInput {
    fn from(source: SourceDescriptor) -> Self {
        SourceInput::Source(source)
    }
}

impl From<Vec<SourceDescriptor>> for SourceInput {
    fn from(sources: Vec<SourceDescriptor>) -> Self {
        SourceInput::List(sources.into_iter().map(SourceInput::Source).collect())
    }
}

impl From<Vec<SourceInput>> for SourceInput {
    fn from(inputs: Vec<SourceInput>) -> Self {
        SourceInput::List(inputs)
    }
}

/// Flatten `input` into descriptors, dropping entries without a URL and
/// filling missing MIME types.
///
/// `cached` sources are consulted first when inferring a MIME type, so a
/// URL the player has already seen keeps the type it was given.
pub fn filter_sources(input: SourceInput, cached: &[SourceDescriptor]) -> Vec<SourceDescriptor> {
    let mut out = Vec::new();
    flatten_into(input, cached, &mut out);
    out
}

fn flatten_into(input: SourceInput, cached: &[SourceDescriptor], out: &mut Vec<SourceDescriptor>) {
    match input {
        SourceInput::Url(url) => {
            if url.is_empty() {
                return;
            }
            let mime_type = find_mime_type(&url, cached).unwrap_or_default();
            out.push(SourceDescriptor { url, mime_type });
        }
        SourceInput::Source(mut source) => {
            if source.url.is_empty() {
                return;
            }
            if source.mime_type.is_empty() {
                source.mime_type = find_mime_type(&source.url, cached).unwrap_or_default();
            }
            out.push(source);
        }
        SourceInput::List(inputs) => {
            for input in inputs {
                flatten_into(input, cached, out);
            }
        }
    }
}

/// MIME type for `url`, preferring a typed entry in `cached`.
pub fn find_mime_type(url: &str, cached: &[SourceDescriptor]) -> Option<String> {
    cached
        .iter()
        .find(|source| source.url == url && !source.mime_type.is_empty())
        .map(|source| source.mime_type.clone())
        .or_else(|| mime_type_from_extension(url).map(str::to_string))
}

/// Extension of the path component of `url`, lower-cased.
pub fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// MIME type conventionally associated with the URL's extension.
pub fn mime_type_from_extension(url: &str) -> Option<&'static str> {
    let ext = url_extension(url)?;
    let mime = match ext.as_str() {
        "opus" | "ogv" => "video/ogg",
        "mp4" | "mov" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        "caf" => "audio/x-caf",
        "flac" => "audio/flac",
        "oga" => "audio/ogg",
        "wav" => "audio/wav",
        "m3u8" => "application/x-mpegURL",
        "mpd" => "application/dash+xml",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime)
}

/// Append every source of `incoming` not already present (by identity).
pub fn merge_sources(existing: &mut Vec<SourceDescriptor>, incoming: &[SourceDescriptor]) {
    for source in incoming {
        if !existing.contains(source) {
            existing.push(source.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_flattens_nested_lists() {
        let input = SourceInput::List(vec![
            "a.mp4".into(),
            SourceInput::List(vec![
                SourceDescriptor::new("b.webm", "").into(),
                "".into(),
                SourceDescriptor::new("c", "video/custom").into(),
            ]),
        ]);

        let sources = filter_sources(input, &[]);
        assert_eq!(
            sources,
            vec![
                SourceDescriptor::new("a.mp4", "video/mp4"),
                SourceDescriptor::new("b.webm", "video/webm"),
                SourceDescriptor::new("c", "video/custom"),
            ]
        );
    }

    #[test]
    fn test_filter_empty_input() {
        assert!(filter_sources("".into(), &[]).is_empty());
        assert!(filter_sources(SourceInput::List(vec![]), &[]).is_empty());
    }

    #[test]
    fn test_mime_type_inference() {
        assert_eq!(mime_type_from_extension("https://x/y/master.M3U8?t=1"), Some("application/x-mpegURL"));
        assert_eq!(mime_type_from_extension("clip.mpd#t=3"), Some("application/dash+xml"));
        assert_eq!(mime_type_from_extension("song.mp3"), Some("audio/mpeg"));
        assert_eq!(mime_type_from_extension("https://host.example/noext"), None);
        assert_eq!(mime_type_from_extension("https://host.example/dir.d/file"), None);
        assert_eq!(mime_type_from_extension("trailing."), None);
    }

    #[test]
    fn test_find_mime_type_prefers_cache() {
        let cached = vec![SourceDescriptor::new("stream.mp4", "application/x-custom")];
        assert_eq!(
            find_mime_type("stream.mp4", &cached).as_deref(),
            Some("application/x-custom")
        );
        assert_eq!(find_mime_type("other.mp4", &cached).as_deref(), Some("video/mp4"));
    }

    #[test]
    fn test_merge_dedupes_by_identity() {
        let mut existing = vec![SourceDescriptor::new("a.mp4", "video/mp4")];
        merge_sources(
            &mut existing,
            &[
                SourceDescriptor::new("a.mp4", "video/mp4"),
                SourceDescriptor::new("a.mp4", "video/webm"),
            ],
        );
        assert_eq!(existing.len(), 2);
    }

    #[test]
    fn test_descriptor_json_shape() {
        let source: SourceDescriptor =
            serde_json::from_str(r#"{"src":"a.m3u8","type":"application/x-mpegURL"}"#).unwrap();
        assert_eq!(source, SourceDescriptor::new("a.m3u8", "application/x-mpegURL"));

        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["src"], "a.m3u8");
        assert_eq!(json["type"], "application/x-mpegURL");
    }

    #[test]
    fn test_display_redacts_query() {
        let source = SourceDescriptor::new("https://cdn/a.mp4?sig=1", "video/mp4");
        assert_eq!(source.to_string(), "https://cdn/a.mp4?[REDACTED] (video/mp4)");
    }
}
