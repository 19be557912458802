//! Error types for the voice guidance adapter

use crate::instruction::SpokenInstruction;
use thiserror::Error;

/// Result type alias for setup and configuration operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors raised while building or configuring the adapter (not per-utterance failures)
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Speech engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which audio-session transition was being attempted when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioAction {
    /// Claim the ducking playback category and activate the session.
    Duck,
    /// Deactivate the session and let other audio resume.
    Unduck,
}

impl std::fmt::Display for AudioAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioAction::Duck => f.write_str("duck"),
            AudioAction::Unduck => f.write_str("unduck"),
        }
    }
}

/// Failure reported by an [`AudioSession`](crate::audio_session::AudioSession) call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioSessionError {
    #[error("category rejected: {0}")]
    CategoryRejected(String),

    #[error("activation failed: {0}")]
    ActivationFailed(String),

    #[error("deactivation failed: {0}")]
    DeactivationFailed(String),
}

/// Failure reported by a [`SpeechEngine`](crate::engine::SpeechEngine) when it cannot accept an utterance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("failed to launch synthesizer: {0}")]
    Launch(String),

    #[error("utterance rejected: {0}")]
    Rejected(String),
}

/// Per-request speech failure, delivered to completions and the delegate.
#[derive(Error, Debug, Clone)]
pub enum SpeechError {
    /// No voice could be resolved for the current locale.
    #[error("no voice available for locale {language_code}")]
    UnsupportedLocale { language_code: String },

    /// Ducking or unducking the audio session failed.
    #[error("unable to {action} audio{}: {source}", describe(.instruction))]
    UnableToControlAudio {
        instruction: Option<SpokenInstruction>,
        action: AudioAction,
        #[source]
        source: AudioSessionError,
    },

    /// The speech engine refused the utterance.
    #[error("speech engine error: {0}")]
    Engine(#[from] EngineError),
}

fn describe(instruction: &Option<SpokenInstruction>) -> String {
    match instruction {
        Some(i) => format!(" while speaking \"{}\"", i.text),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unable_to_control_audio_names_action_and_instruction() {
        let err = SpeechError::UnableToControlAudio {
            instruction: Some(SpokenInstruction::new("Turn left on Main Street")),
            action: AudioAction::Unduck,
            source: AudioSessionError::DeactivationFailed("busy".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("unduck"));
        assert!(msg.contains("Turn left on Main Street"));
        assert!(msg.contains("busy"));
    }

    #[test]
    fn unsupported_locale_message() {
        let err = SpeechError::UnsupportedLocale {
            language_code: "xx-YY".to_string(),
        };
        assert_eq!(err.to_string(), "no voice available for locale xx-YY");
    }
}
