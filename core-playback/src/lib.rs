//! # Playback Orchestration Core
//!
//! Sits between a player's public API and interchangeable playback engines.
//!
//! ## Overview
//!
//! This crate handles:
//! - Engine registration and capability-based source selection
//! - Per-source middleware that can rewrite sources and intercept engine
//!   operations
//! - Engine lifecycle: load, ready, swap and dispose, with text tracks
//!   carried across swaps
//! - Command queueing while the engine is not ready, and reconciliation of
//!   asynchronous `play()` outcomes
//! - Re-emission of engine events as player events
//!
//! ## Architecture
//!
//! ```text
//!                 ┌────────────────────┐
//!  src()/play() ─>│  PlayerController  │── PlayerEvent ──> EventBus
//!                 └─────────┬──────────┘
//!        select             │ build             get/set/call
//!   ┌──────────────┐  ┌─────┴──────────┐  ┌─────────────────┐
//!   │SourceSelector│  │MiddlewareReg.  │─>│    Pipeline     │
//!   └──────┬───────┘  └────────────────┘  └────────┬────────┘
//!          │                                       │
//!   ┌──────┴───────┐   create          ┌───────────┴───────┐
//!   │EngineRegistry├──────────────────>│  PlaybackEngine   │
//!   └──────────────┘                   └─────── signals ───┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::{EngineRegistry, PlayerConfig, PlayerController};
//!
//! let engines = EngineRegistry::new();
//! engines.register("html5", Html5Factory::default())?;
//!
//! let mut player = PlayerController::builder()
//!     .engines(engines)
//!     .config(PlayerConfig::builder().engine_order(["html5"]).build()?)
//!     .build()?;
//!
//! player.src("https://cdn.example.com/movie.mp4");
//! let handle = player.play();
//! player.run_until_idle();
//! ```

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod media;
pub mod middleware;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod selector;
pub mod source;
pub mod tracks;
pub mod traits;

pub use config::{AutoplayMode, PlayerConfig, PlayerConfigBuilder};
pub use controller::{PlaybackState, PlayerController, PlayerControllerBuilder};
pub use error::{MediaError, MediaErrorCode, PlaybackError, Result};
pub use events::{EngineEvents, EngineNotice, MediaEvent, PlayerEvent};
pub use media::{Artwork, MediaObject};
pub use middleware::{
    Getter, Mediator, Middleware, MiddlewareRegistry, Operation, Pipeline, Setter, SourceStep, Step,
    Value,
};
pub use queue::{PlayHandle, PlayResolution};
pub use registry::{EngineEntry, EngineRegistry, PlayerId, PlayerRegistry};
pub use scheduler::{TaskId, TaskOwner};
pub use selector::{Selection, SourceSelector};
pub use source::{SourceDescriptor, SourceInput};
pub use tracks::{
    Cue, TextTrack, TextTrackKind, TextTrackList, TextTrackMode, TextTrackSnapshot, TrackId,
    TrackListSnapshot, TrackSynchronizer,
};
pub use traits::{CanPlay, EngineFactory, EngineInit, PlaybackEngine, TimeRange, TimeRanges};
