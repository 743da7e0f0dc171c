//! # Middleware
//!
//! Middleware sits between the controller and the engine and intercepts
//! three classes of operation:
//!
//! | Class    | Operations                                              | Order   |
//! |----------|---------------------------------------------------------|---------|
//! | getter   | buffered, currentTime, duration, muted, played, paused, seekable, volume, ended | reverse |
//! | setter   | currentTime, muted, volume                              | forward |
//! | mediator | play, pause                                             | forward `call`, reverse `called` |
//!
//! Operations outside these sets (e.g. `playbackRate`, `src`) bypass the
//! pipeline and reach the engine directly.
//!
//! A pipeline is assembled per source by the [`MiddlewareRegistry`] and stays
//! fixed until the next `src()` call.

mod pipeline;
mod registry;

pub use pipeline::{BuildOutcome, Pipeline};
pub use registry::{FactoryId, MiddlewareFactory, MiddlewareInstances, MiddlewareRegistry, ANY_TYPE};

use crate::source::SourceDescriptor;
use crate::traits::TimeRanges;
use std::fmt;

// ============================================================================
// Operations
// ============================================================================

/// Readable engine properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Getter {
    Buffered,
    CurrentTime,
    Duration,
    Muted,
    Played,
    Paused,
    Seekable,
    Volume,
    Ended,
    PlaybackRate,
    Seeking,
    Src,
}

impl Getter {
    pub fn name(self) -> &'static str {
        match self {
            Getter::Buffered => "buffered",
            Getter::CurrentTime => "currentTime",
            Getter::Duration => "duration",
            Getter::Muted => "muted",
            Getter::Played => "played",
            Getter::Paused => "paused",
            Getter::Seekable => "seekable",
            Getter::Volume => "volume",
            Getter::Ended => "ended",
            Getter::PlaybackRate => "playbackRate",
            Getter::Seeking => "seeking",
            Getter::Src => "src",
        }
    }

    /// Member of the allowed-getters set.
    pub fn is_mediated(self) -> bool {
        !matches!(self, Getter::PlaybackRate | Getter::Seeking | Getter::Src)
    }
}

/// Writable engine properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setter {
    CurrentTime,
    Muted,
    Volume,
    PlaybackRate,
}

impl Setter {
    pub fn name(self) -> &'static str {
        match self {
            Setter::CurrentTime => "setCurrentTime",
            Setter::Muted => "setMuted",
            Setter::Volume => "setVolume",
            Setter::PlaybackRate => "setPlaybackRate",
        }
    }

    /// Member of the allowed-setters set.
    pub fn is_mediated(self) -> bool {
        !matches!(self, Setter::PlaybackRate)
    }
}

/// Engine actions whose result middleware can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mediator {
    Play,
    Pause,
}

impl Mediator {
    pub fn name(self) -> &'static str {
        match self {
            Mediator::Play => "play",
            Mediator::Pause => "pause",
        }
    }
}

pub const ALLOWED_GETTERS: [Getter; 9] = [
    Getter::Buffered,
    Getter::CurrentTime,
    Getter::Duration,
    Getter::Muted,
    Getter::Played,
    Getter::Paused,
    Getter::Seekable,
    Getter::Volume,
    Getter::Ended,
];

pub const ALLOWED_SETTERS: [Setter; 3] = [Setter::CurrentTime, Setter::Muted, Setter::Volume];

pub const ALLOWED_MEDIATORS: [Mediator; 2] = [Mediator::Play, Mediator::Pause];

/// Values flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Number(f64),
    Ranges(TimeRanges),
    Text(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_ranges(&self) -> Option<&TimeRanges> {
        match self {
            Value::Ranges(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<TimeRanges> for Value {
    fn from(value: TimeRanges) -> Self {
        Value::Ranges(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// A single controller → engine operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Get(Getter),
    Set(Setter, Value),
    Mediate(Mediator, Option<Value>),
}

/// How an operation is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    Getter,
    Setter,
    Mediator,
    /// Not intercepted; calls the engine directly.
    Direct,
}

impl Operation {
    pub fn class(&self) -> OperationClass {
        match self {
            Operation::Get(getter) if getter.is_mediated() => OperationClass::Getter,
            Operation::Set(setter, _) if setter.is_mediated() => OperationClass::Setter,
            Operation::Mediate(..) => OperationClass::Mediator,
            _ => OperationClass::Direct,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Get(getter) => getter.name(),
            Operation::Set(setter, _) => setter.name(),
            Operation::Mediate(mediator, _) => mediator.name(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Middleware Trait
// ============================================================================

/// Result of [`Middleware::set_source`].
#[derive(Debug, Clone, PartialEq)]
pub enum SourceStep {
    /// Join the pipeline, passing this (possibly rewritten) source on.
    Continue(SourceDescriptor),
    /// Stay out of the pipeline for this source.
    Skip,
    /// Stop building the pipeline.
    Terminate,
}

/// Result of a setter or mediator hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    Continue(T),
    /// Stop the chain; the engine is not called.
    Terminate,
}

/// An interceptor between controller and engine.
///
/// Every hook has a pass-through default, so implementations only override
/// what they intercept. Instances are shared per controller; interior
/// mutability is up to the implementation.
pub trait Middleware {
    fn name(&self) -> &str {
        "middleware"
    }

    fn set_source(&self, source: &SourceDescriptor) -> SourceStep {
        SourceStep::Continue(source.clone())
    }

    /// Called once the pipeline is attached to `engine`.
    fn set_engine(&self, engine: &str) {
        let _ = engine;
    }

    fn get(&self, getter: Getter, value: Value) -> Value {
        let _ = getter;
        value
    }

    fn set(&self, setter: Setter, value: Value) -> Step<Value> {
        let _ = setter;
        Step::Continue(value)
    }

    fn call(&self, mediator: Mediator, arg: Option<Value>) -> Step<Option<Value>> {
        let _ = mediator;
        Step::Continue(arg)
    }

    /// Runs after the engine was called, or after the chain terminated.
    fn called(&self, mediator: Mediator, terminated: bool, result: Option<&Value>) {
        let _ = (mediator, terminated, result);
    }
}
