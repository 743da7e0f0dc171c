//! # Process-wide Registries
//!
//! - [`EngineRegistry`]: engine name → [`EngineFactory`]. Names are
//!   case-insensitive keys; registration order is the default engine order.
//! - [`PlayerRegistry`]: ids of every live controller.
//!
//! Both are cheap-to-clone handles over shared state. The process-wide
//! instances are reached through `global()`; tests build private registries
//! with `new()` and inject them into the controller builder, or call
//! `reset()` on the global one.

use crate::error::{PlaybackError, Result};
use crate::traits::EngineFactory;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ============================================================================
// Engine Registry
// ============================================================================

/// A registered engine.
#[derive(Clone)]
pub struct EngineEntry {
    /// Name as given at registration.
    pub name: String,
    pub factory: Arc<dyn EngineFactory>,
}

impl fmt::Debug for EngineEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineEntry").field("name", &self.name).finish()
    }
}

impl EngineEntry {
    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

static GLOBAL_ENGINES: Lazy<EngineRegistry> = Lazy::new(EngineRegistry::new);

/// Name → engine factory map.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    entries: Arc<RwLock<Vec<EngineEntry>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the process-wide registry.
    pub fn global() -> Self {
        GLOBAL_ENGINES.clone()
    }

    /// Removes every registration.
    pub fn reset(&self) {
        self.entries.write().clear();
    }

    /// Registers `factory` under `name`.
    ///
    /// A second registration under an existing name is refused with
    /// [`PlaybackError::DuplicateEngine`] and logged as a warning; the first
    /// registration stays in place. Use [`replace`](Self::replace) to
    /// overwrite deliberately.
    pub fn register<F>(&self, name: &str, factory: F) -> Result<()>
    where
        F: EngineFactory + 'static,
    {
        self.register_arc(name, Arc::new(factory))
    }

    pub fn register_arc(&self, name: &str, factory: Arc<dyn EngineFactory>) -> Result<()> {
        validate_name(name)?;

        let mut entries = self.entries.write();
        if entries.iter().any(|entry| entry.matches(name)) {
            warn!(engine = name, "Engine is already registered; keeping the first registration");
            return Err(PlaybackError::DuplicateEngine(name.to_string()));
        }

        entries.push(EngineEntry {
            name: name.to_string(),
            factory,
        });
        info!(engine = name, "Registered engine");
        Ok(())
    }

    /// Registers `factory`, overwriting an existing registration in place.
    /// Returns `true` if a registration was replaced.
    pub fn replace<F>(&self, name: &str, factory: F) -> Result<bool>
    where
        F: EngineFactory + 'static,
    {
        validate_name(name)?;

        let factory: Arc<dyn EngineFactory> = Arc::new(factory);
        let mut entries = self.entries.write();
        if let Some(entry) = entries.iter_mut().find(|entry| entry.matches(name)) {
            entry.factory = factory;
            info!(engine = name, "Replaced engine registration");
            return Ok(true);
        }

        entries.push(EngineEntry {
            name: name.to_string(),
            factory,
        });
        Ok(false)
    }

    /// Removes a registration. Returns `true` if one existed.
    pub fn deregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| !entry.matches(name));
        let removed = entries.len() != before;
        if removed {
            info!(engine = name, "Deregistered engine");
        }
        removed
    }

    pub fn lookup(&self, name: &str) -> Option<EngineEntry> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.matches(name))
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Registered names in registration order.
    pub fn default_order(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// The engines of `order` that are registered and supported, in the same
    /// order. Unknown names are logged and skipped.
    pub fn supported(&self, order: &[String]) -> Vec<EngineEntry> {
        let mut supported = Vec::with_capacity(order.len());
        for name in order {
            match self.lookup(name) {
                Some(entry) if entry.factory.is_supported() => supported.push(entry),
                Some(_) => debug!(engine = %name, "Engine is not supported here"),
                None => warn!(engine = %name, "The engine was not found; skipping"),
            }
        }
        supported
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.default_order())
            .finish()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PlaybackError::Config(
            "Engine name must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Player Registry
// ============================================================================

/// Unique identifier of a player controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player_{}", self.0.simple())
    }
}

static GLOBAL_PLAYERS: Lazy<PlayerRegistry> = Lazy::new(PlayerRegistry::new);

/// Ids of every live controller.
#[derive(Debug, Clone, Default)]
pub struct PlayerRegistry {
    players: Arc<RwLock<HashSet<PlayerId>>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> Self {
        GLOBAL_PLAYERS.clone()
    }

    pub fn reset(&self) {
        self.players.write().clear();
    }

    pub fn register(&self, id: PlayerId) -> bool {
        self.players.write().insert(id)
    }

    pub fn unregister(&self, id: PlayerId) -> bool {
        self.players.write().remove(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.read().contains(&id)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.read().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }
}
