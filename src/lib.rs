//! Workspace facade crate.
//!
//! Re-exports the workspace members behind feature flags so host
//! applications can depend on `player-core` alone and pick the layers
//! they need (`runtime` for logging and the event bus, `playback` for the
//! orchestration core).

#[cfg(feature = "runtime")]
pub use core_runtime as runtime;

#[cfg(feature = "playback")]
pub use core_playback as playback;
