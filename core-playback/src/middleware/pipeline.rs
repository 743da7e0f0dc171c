//! Runtime dispatch of operations through an assembled middleware chain.

use super::registry::FactoryId;
use super::{Getter, Mediator, Middleware, Operation, Setter, Step, Value};
use crate::error::{PlaybackError, Result};
use crate::source::SourceDescriptor;
use crate::traits::PlaybackEngine;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Result of building a pipeline for a source.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Resolved {
        source: SourceDescriptor,
        pipeline: Pipeline,
    },
    /// A middleware stopped the build. `source` is the source as it stood
    /// at that point; `pipeline` holds the middleware that had joined.
    Terminated {
        source: SourceDescriptor,
        pipeline: Pipeline,
    },
}

impl BuildOutcome {
    pub fn source(&self) -> &SourceDescriptor {
        match self {
            BuildOutcome::Resolved { source, .. } | BuildOutcome::Terminated { source, .. } => source,
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, BuildOutcome::Terminated { .. })
    }
}

/// Ordered middleware chain for one source.
#[derive(Clone, Default)]
pub struct Pipeline {
    entries: Vec<(FactoryId, Rc<dyn Middleware>)>,
}

impl Pipeline {
    pub(crate) fn new(entries: Vec<(FactoryId, Rc<dyn Middleware>)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(_, middleware)| middleware.name().to_string())
            .collect()
    }

    pub fn factory_ids(&self) -> Vec<FactoryId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    /// Tells every middleware which engine the pipeline now drives.
    pub fn set_engine(&self, engine: &str) {
        for (_, middleware) in &self.entries {
            middleware.set_engine(engine);
        }
    }

    /// Reads `getter` from the engine, then lets middleware transform the
    /// value innermost-first (reverse registration order).
    pub fn get(&self, getter: Getter, engine: &dyn PlaybackEngine) -> Result<Value> {
        let value = read(engine, getter)?;
        if !getter.is_mediated() {
            return Ok(value);
        }
        Ok(self
            .entries
            .iter()
            .rev()
            .fold(value, |value, (_, middleware)| middleware.get(getter, value)))
    }

    /// Runs setter hooks in registration order and writes the result to the
    /// engine. Returns `Ok(false)` if a middleware terminated the chain, in
    /// which case the engine was not called.
    pub fn set(&self, setter: Setter, value: Value, engine: &mut dyn PlaybackEngine) -> Result<bool> {
        if !setter.is_mediated() {
            write(engine, setter, &value)?;
            return Ok(true);
        }

        let mut value = value;
        for (_, middleware) in &self.entries {
            match middleware.set(setter, value) {
                Step::Continue(next) => value = next,
                Step::Terminate => {
                    trace!(setter = setter.name(), middleware = middleware.name(), "Setter terminated");
                    return Ok(false);
                }
            }
        }
        write(engine, setter, &value)?;
        Ok(true)
    }

    /// Runs `call` hooks forward, invokes the engine unless terminated, then
    /// runs `called` hooks in reverse.
    ///
    /// Returns `Ok(None)` when the chain terminated.
    pub fn mediate(
        &self,
        mediator: Mediator,
        arg: Option<Value>,
        engine: &mut dyn PlaybackEngine,
    ) -> Result<Option<Value>> {
        let mut arg = arg;
        let mut terminated = false;
        for (_, middleware) in &self.entries {
            match middleware.call(mediator, arg) {
                Step::Continue(next) => arg = next,
                Step::Terminate => {
                    trace!(mediator = mediator.name(), middleware = middleware.name(), "Mediator terminated");
                    terminated = true;
                    break;
                }
            }
        }

        let outcome = if terminated {
            Ok(None)
        } else {
            invoke(engine, mediator).map(Some)
        };

        let result = outcome.as_ref().ok().and_then(Option::as_ref);
        for (_, middleware) in self.entries.iter().rev() {
            middleware.called(mediator, terminated, result);
        }

        outcome
    }

    /// Routes any operation by its class. Direct operations bypass the chain.
    pub fn dispatch(&self, operation: Operation, engine: &mut dyn PlaybackEngine) -> Result<Option<Value>> {
        match operation {
            Operation::Get(getter) => self.get(getter, engine).map(Some),
            Operation::Set(setter, value) => {
                let applied = self.set(setter, value, engine)?;
                Ok(applied.then_some(Value::Unit))
            }
            Operation::Mediate(mediator, arg) => self.mediate(mediator, arg, engine),
        }
    }
}

impl PartialEq for Pipeline {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|((a_id, a), (b_id, b))| a_id == b_id && Rc::ptr_eq(a, b))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("middleware", &self.names()).finish()
    }
}

// ============================================================================
// Engine Access
// ============================================================================

pub(crate) fn read(engine: &dyn PlaybackEngine, getter: Getter) -> Result<Value> {
    Ok(match getter {
        Getter::Buffered => Value::Ranges(engine.buffered()?),
        Getter::CurrentTime => Value::Number(engine.current_time()?),
        Getter::Duration => Value::Number(engine.duration()?),
        Getter::Muted => Value::Bool(engine.muted()?),
        Getter::Played => Value::Ranges(engine.played()?),
        Getter::Paused => Value::Bool(engine.paused()?),
        Getter::Seekable => Value::Ranges(engine.seekable()?),
        Getter::Volume => Value::Number(engine.volume()?),
        Getter::Ended => Value::Bool(engine.ended()?),
        Getter::PlaybackRate => Value::Number(engine.playback_rate()?),
        Getter::Seeking => Value::Bool(engine.seeking()?),
        Getter::Src => Value::Text(engine.src()?),
    })
}

pub(crate) fn write(engine: &mut dyn PlaybackEngine, setter: Setter, value: &Value) -> Result<()> {
    match setter {
        Setter::CurrentTime => engine.set_current_time(number(setter, value)?),
        Setter::Volume => engine.set_volume(number(setter, value)?),
        Setter::PlaybackRate => engine.set_playback_rate(number(setter, value)?),
        Setter::Muted => {
            let muted = value.as_bool().ok_or(PlaybackError::InvalidValue {
                operation: setter.name(),
                expected: "a boolean",
            })?;
            engine.set_muted(muted)
        }
    }
}

fn number(setter: Setter, value: &Value) -> Result<f64> {
    value.as_number().ok_or(PlaybackError::InvalidValue {
        operation: setter.name(),
        expected: "a number",
    })
}

pub(crate) fn invoke(engine: &mut dyn PlaybackEngine, mediator: Mediator) -> Result<Value> {
    match mediator {
        Mediator::Play => engine.play()?,
        Mediator::Pause => engine.pause()?,
    }
    Ok(Value::Unit)
}
