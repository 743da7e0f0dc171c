//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the player core:
//! - Logging and tracing infrastructure
//! - Typed event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the orchestration crates depend
//! on. It establishes the logging conventions and the event broadcasting
//! mechanism used to publish player state to UI collaborators.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
