//! Explicit playback state machine.
//!
//! ```text
//! Uninitialized ──load──> EngineLoading ──ready──> EngineReady
//!                              ^                       │
//!                              │ src / reset           v
//!                              └──────── { Playing, Paused, Seeking, Ended }
//!
//! Errored is reachable from every state.
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Uninitialized,
    EngineLoading,
    EngineReady,
    Playing,
    Paused,
    Seeking,
    Ended,
    Errored,
}

impl PlaybackState {
    /// States in which the engine has signalled readiness.
    pub fn is_engine_ready(self) -> bool {
        matches!(
            self,
            PlaybackState::EngineReady
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Seeking
                | PlaybackState::Ended
        )
    }
}

/// Inputs driving the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateInput {
    LoadEngine,
    EngineReady,
    LoadStart,
    Play,
    Pause,
    Seeking,
    Seeked { paused: bool },
    Ended,
    Error,
    ErrorCleared,
    Reset,
    Dispose,
}

/// Pure transition function. Inputs that do not apply to `state` leave it
/// unchanged.
pub fn transition(state: PlaybackState, input: StateInput) -> PlaybackState {
    use PlaybackState::*;

    match (state, input) {
        (_, StateInput::Error) => Errored,
        (_, StateInput::Dispose) => Uninitialized,
        (_, StateInput::LoadEngine) | (_, StateInput::Reset) => EngineLoading,

        (Uninitialized | EngineLoading, StateInput::EngineReady) => EngineReady,
        (Errored, StateInput::ErrorCleared) => EngineReady,
        (Errored | Playing | Paused | Seeking | Ended, StateInput::LoadStart) => EngineReady,

        (EngineReady | Paused | Seeking | Ended | Playing, StateInput::Play) => Playing,
        (EngineReady | Playing | Seeking, StateInput::Pause) => Paused,
        (EngineReady | Playing | Paused | Ended, StateInput::Seeking) => Seeking,
        (Seeking, StateInput::Seeked { paused: true }) => Paused,
        (Seeking, StateInput::Seeked { paused: false }) => Playing,
        (Playing | Paused | Seeking, StateInput::Ended) => Ended,

        (state, _) => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlaybackState::*;

    fn run(inputs: &[StateInput]) -> PlaybackState {
        inputs.iter().fold(Uninitialized, |state, input| transition(state, *input))
    }

    #[test]
    fn test_happy_path() {
        assert_eq!(
            run(&[
                StateInput::LoadEngine,
                StateInput::EngineReady,
                StateInput::LoadStart,
                StateInput::Play,
                StateInput::Seeking,
                StateInput::Seeked { paused: false },
                StateInput::Pause,
                StateInput::Play,
                StateInput::Ended,
            ]),
            Ended
        );
    }

    #[test]
    fn test_error_from_any_state() {
        for state in [Uninitialized, EngineLoading, EngineReady, Playing, Paused, Seeking, Ended, Errored] {
            assert_eq!(transition(state, StateInput::Error), Errored);
        }
    }

    #[test]
    fn test_engine_loading_reentered() {
        assert_eq!(transition(Playing, StateInput::LoadEngine), EngineLoading);
        assert_eq!(transition(Paused, StateInput::Reset), EngineLoading);
        assert_eq!(transition(Errored, StateInput::LoadEngine), EngineLoading);
    }

    #[test]
    fn test_ignored_inputs() {
        assert_eq!(transition(EngineLoading, StateInput::Play), EngineLoading);
        assert_eq!(transition(Errored, StateInput::Play), Errored);
        assert_eq!(transition(Paused, StateInput::EngineReady), Paused);
        assert_eq!(transition(Uninitialized, StateInput::LoadStart), Uninitialized);
    }

    #[test]
    fn test_recovery_after_error() {
        assert_eq!(transition(Errored, StateInput::ErrorCleared), EngineReady);
        assert_eq!(transition(Errored, StateInput::LoadStart), EngineReady);
        assert!(EngineReady.is_engine_ready());
        assert!(!Errored.is_engine_ready());
    }
}
