//! # Player Configuration
//!
//! Configuration for a [`PlayerController`](crate::controller::PlayerController):
//! engine order, source-selection priority, per-engine options, autoplay
//! policy and scheduling delays.
//!
//! ```rust
//! use core_playback::config::{AutoplayMode, PlayerConfig};
//!
//! let config = PlayerConfig::builder()
//!     .engine_order(["html5", "shaka"])
//!     .autoplay(AutoplayMode::Muted)
//!     .retry_on_error(true)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.engine_order, vec!["html5", "shaka"]);
//! ```

use crate::error::{PlaybackError, Result};
use crate::source::SourceDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Autoplay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoplayMode {
    /// Never start playback on load.
    #[default]
    Off,
    /// Ask the engine to autoplay natively.
    On,
    /// Start muted, restoring the previous muted state on failure.
    Muted,
    /// Call `play()` once the source starts loading.
    Play,
    /// Try `play()`, falling back to a muted play if it is rejected.
    Any,
}

impl AutoplayMode {
    /// Modes driven by the controller rather than the engine.
    pub fn is_manual(self) -> bool {
        matches!(self, AutoplayMode::Muted | AutoplayMode::Play | AutoplayMode::Any)
    }
}

/// Player configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Engines to try, in priority order.
    ///
    /// Default: empty, meaning the registry's registration order.
    #[serde(default)]
    pub engine_order: Vec<String>,

    /// Let source order dominate engine order during selection.
    ///
    /// Default: false (engine priority dominates).
    #[serde(default)]
    pub source_order: bool,

    /// Options per engine name. Every key matching an engine name
    /// case-insensitively contributes to that engine's options.
    #[serde(default)]
    pub engine_options: BTreeMap<String, serde_json::Value>,

    /// Default: [`AutoplayMode::Off`].
    #[serde(default)]
    pub autoplay: AutoplayMode,

    /// Treat [`AutoplayMode::On`] as [`AutoplayMode::Play`] instead of
    /// passing it to the engine.
    #[serde(default)]
    pub normalize_autoplay: bool,

    /// Retry with the remaining sources when the current one errors before
    /// playback starts.
    #[serde(default)]
    pub retry_on_error: bool,

    /// Default: 1.0.
    #[serde(default = "default_playback_rate")]
    pub default_playback_rate: f64,

    /// Sources assigned at construction.
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,

    /// Delay before queued ready callbacks run and `ready` is emitted.
    ///
    /// Default: 1 ms.
    #[serde(default = "default_ready_delay_ms")]
    pub ready_delay_ms: u64,

    /// Delay before the middleware pipeline is built for a new source.
    ///
    /// Default: 1 ms.
    #[serde(default = "default_middleware_delay_ms")]
    pub middleware_delay_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            engine_order: Vec::new(),
            source_order: false,
            engine_options: BTreeMap::new(),
            autoplay: AutoplayMode::default(),
            normalize_autoplay: false,
            retry_on_error: false,
            default_playback_rate: default_playback_rate(),
            sources: Vec::new(),
            ready_delay_ms: default_ready_delay_ms(),
            middleware_delay_ms: default_middleware_delay_ms(),
        }
    }
}

impl PlayerConfig {
    pub fn builder() -> PlayerConfigBuilder {
        PlayerConfigBuilder::default()
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if !self.default_playback_rate.is_finite() || self.default_playback_rate <= 0.0 {
            return Err(PlaybackError::Config(format!(
                "default_playback_rate must be a finite number > 0 (got {})",
                self.default_playback_rate
            )));
        }

        if let Some(name) = self.engine_order.iter().find(|name| name.trim().is_empty()) {
            return Err(PlaybackError::Config(format!(
                "engine_order contains an empty engine name ({:?})",
                name
            )));
        }

        for (name, options) in &self.engine_options {
            if !options.is_object() {
                return Err(PlaybackError::Config(format!(
                    "engine_options.{} must be a JSON object",
                    name
                )));
            }
        }

        if let Some(index) = self.sources.iter().position(SourceDescriptor::is_empty) {
            return Err(PlaybackError::Config(format!(
                "sources[{}] has an empty url",
                index
            )));
        }

        Ok(())
    }

    /// Options for `engine`, merged from every case-insensitively matching
    /// key in key order.
    pub fn engine_options_for(&self, engine: &str) -> serde_json::Value {
        let mut merged = serde_json::Map::new();
        for (name, options) in &self.engine_options {
            if !name.eq_ignore_ascii_case(engine) {
                continue;
            }
            if let Some(object) = options.as_object() {
                for (key, value) in object {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        serde_json::Value::Object(merged)
    }

    pub fn ready_delay(&self) -> Duration {
        Duration::from_millis(self.ready_delay_ms)
    }

    pub fn middleware_delay(&self) -> Duration {
        Duration::from_millis(self.middleware_delay_ms)
    }

    /// The mode the controller runs itself on `loadstart`, if any.
    pub fn manual_autoplay(&self) -> Option<AutoplayMode> {
        match self.autoplay {
            AutoplayMode::On if self.normalize_autoplay => Some(AutoplayMode::Play),
            mode if mode.is_manual() => Some(mode),
            _ => None,
        }
    }

    /// Whether the engine itself should autoplay.
    pub fn engine_autoplay(&self) -> bool {
        self.autoplay == AutoplayMode::On && !self.normalize_autoplay
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_playback_rate() -> f64 {
    1.0
}

fn default_ready_delay_ms() -> u64 {
    1
}

fn default_middleware_delay_ms() -> u64 {
    1
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`PlayerConfig`]. `build()` validates.
#[derive(Debug, Default)]
pub struct PlayerConfigBuilder {
    config: PlayerConfig,
}

impl PlayerConfigBuilder {
    pub fn engine_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.engine_order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn source_order(mut self, source_first: bool) -> Self {
        self.config.source_order = source_first;
        self
    }

    pub fn engine_options(mut self, engine: impl Into<String>, options: serde_json::Value) -> Self {
        self.config.engine_options.insert(engine.into(), options);
        self
    }

    pub fn autoplay(mut self, mode: AutoplayMode) -> Self {
        self.config.autoplay = mode;
        self
    }

    pub fn normalize_autoplay(mut self, normalize: bool) -> Self {
        self.config.normalize_autoplay = normalize;
        self
    }

    pub fn retry_on_error(mut self, retry: bool) -> Self {
        self.config.retry_on_error = retry;
        self
    }

    pub fn default_playback_rate(mut self, rate: f64) -> Self {
        self.config.default_playback_rate = rate;
        self
    }

    pub fn sources(mut self, sources: Vec<SourceDescriptor>) -> Self {
        self.config.sources = sources;
        self
    }

    pub fn ready_delay_ms(mut self, delay: u64) -> Self {
        self.config.ready_delay_ms = delay;
        self
    }

    pub fn middleware_delay_ms(mut self, delay: u64) -> Self {
        self.config.middleware_delay_ms = delay;
        self
    }

    pub fn build(self) -> Result<PlayerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert!(config.engine_order.is_empty());
        assert!(!config.source_order);
        assert_eq!(config.default_playback_rate, 1.0);
        assert_eq!(config.ready_delay(), Duration::from_millis(1));
        assert_eq!(config.autoplay, AutoplayMode::Off);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let config = PlayerConfig::from_json(
            r#"{"engineOrder":["html5"],"autoplay":"any","sources":[{"src":"a.mp4","type":"video/mp4"}]}"#,
        )
        .unwrap();

        assert_eq!(config.engine_order, vec!["html5"]);
        assert_eq!(config.autoplay, AutoplayMode::Any);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.middleware_delay_ms, 1);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(PlayerConfig::builder().default_playback_rate(0.0).build().is_err());
        assert!(PlayerConfig::builder().default_playback_rate(f64::NAN).build().is_err());
        assert!(PlayerConfig::builder().engine_order(["html5", ""]).build().is_err());
        assert!(PlayerConfig::builder()
            .engine_options("html5", json!(3))
            .build()
            .is_err());
        assert!(PlayerConfig::builder()
            .sources(vec![SourceDescriptor::default()])
            .build()
            .is_err());
        assert!(matches!(
            PlayerConfig::from_json("{\"autoplay\":\"sometimes\"}"),
            Err(PlaybackError::Serialization(_))
        ));
    }

    #[test]
    fn test_engine_options_merge_case_insensitively() {
        let config = PlayerConfig::builder()
            .engine_options("Html5", json!({"nativeTextTracks": false, "preload": "auto"}))
            .engine_options("html5", json!({"preload": "none"}))
            .engine_options("shaka", json!({"abr": true}))
            .build()
            .unwrap();

        let options = config.engine_options_for("HTML5");
        assert_eq!(options["nativeTextTracks"], false);
        assert_eq!(options["preload"], "none");
        assert!(options.get("abr").is_none());
        assert_eq!(config.engine_options_for("unknown"), json!({}));
    }

    #[test]
    fn test_autoplay_normalisation() {
        let config = PlayerConfig::builder().autoplay(AutoplayMode::On).build().unwrap();
        assert!(config.engine_autoplay());
        assert_eq!(config.manual_autoplay(), None);

        let config = PlayerConfig::builder()
            .autoplay(AutoplayMode::On)
            .normalize_autoplay(true)
            .build()
            .unwrap();
        assert!(!config.engine_autoplay());
        assert_eq!(config.manual_autoplay(), Some(AutoplayMode::Play));

        let config = PlayerConfig::builder().autoplay(AutoplayMode::Muted).build().unwrap();
        assert_eq!(config.manual_autoplay(), Some(AutoplayMode::Muted));
    }
}
