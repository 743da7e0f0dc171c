//! # Source Selection
//!
//! Picks the `(engine, source)` pair to play from an engine order and a list
//! of candidate sources.
//!
//! Selection is first-match, not best-match: the candidates are walked as a
//! nested loop and the first pair whose engine can play the source wins.
//! Which list forms the outer loop decides the priority axis:
//!
//! | `source_first` | outer loop | dominates      |
//! |----------------|------------|----------------|
//! | `false`        | engines    | engine order   |
//! | `true`         | sources    | source order   |

use crate::config::PlayerConfig;
use crate::registry::{EngineEntry, EngineRegistry};
use crate::source::SourceDescriptor;
use tracing::trace;

/// The pair chosen by [`SourceSelector::select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub engine: String,
    pub source: SourceDescriptor,
}

/// First-match source selector over an [`EngineRegistry`].
#[derive(Debug)]
pub struct SourceSelector<'a> {
    registry: &'a EngineRegistry,
    source_first: bool,
    config: Option<&'a PlayerConfig>,
}

impl<'a> SourceSelector<'a> {
    pub fn new(registry: &'a EngineRegistry) -> Self {
        Self {
            registry,
            source_first: false,
            config: None,
        }
    }

    pub fn source_first(mut self, source_first: bool) -> Self {
        self.source_first = source_first;
        self
    }

    /// Use `config` for the engine options passed to `can_play_source`.
    pub fn with_config(mut self, config: &'a PlayerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Returns the first playable pair, or `None`.
    pub fn select(&self, engine_order: &[String], sources: &[SourceDescriptor]) -> Option<Selection> {
        let engines = self.registry.supported(engine_order);

        let selection = if self.source_first {
            sources.iter().find_map(|source| {
                engines
                    .iter()
                    .find(|engine| self.can_play(engine, source))
                    .map(|engine| selection(engine, source))
            })
        } else {
            engines.iter().find_map(|engine| {
                sources
                    .iter()
                    .find(|source| self.can_play(engine, source))
                    .map(|source| selection(engine, source))
            })
        };

        trace!(
            engines = engines.len(),
            sources = sources.len(),
            source_first = self.source_first,
            selected = ?selection.as_ref().map(|s| s.engine.as_str()),
            "Source selection"
        );
        selection
    }

    fn can_play(&self, engine: &EngineEntry, source: &SourceDescriptor) -> bool {
        let options = self
            .config
            .map(|config| config.engine_options_for(&engine.name))
            .unwrap_or(serde_json::Value::Null);
        engine.factory.can_play_source(source, &options).is_playable()
    }
}

fn selection(engine: &EngineEntry, source: &SourceDescriptor) -> Selection {
    Selection {
        engine: engine.name.clone(),
        source: source.clone(),
    }
}
