//! # Guidance Voice - Spoken Navigation Instructions
//!
//! This crate adapts a speech engine to a navigation app's voice guidance: it turns route
//! instructions into utterances, ducks other audio while guidance speaks, and reports each
//! request's outcome exactly once.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Voice Controller                        │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Instruction  │→ │ Voice/Locale │→ │ SpeechEngine │       │
//! │  │ (attributed) │  │  resolution  │  │  (espeak-ng) │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │                                             ↓ SpeechEvent   │
//! │  ┌──────────────┐                    ┌──────────────┐       │
//! │  │ AudioSession │←───────────────────│ Event handler│       │
//! │  │ (duck/unduck)│   Interruptions    │ + completion │       │
//! │  └──────────────┘                    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod audio_session;
pub mod command_engine;
pub mod config;
pub mod controller;
pub mod driver;
pub mod engine;
pub mod error;
pub mod instruction;
pub mod locale;
pub mod placeholder;
pub mod voice;

pub use audio_session::{
    AudioInterruption, AudioSession, CategoryKind, CategoryOptions, InterruptionCenter, NullAudioSession,
    SessionCategory, SessionMode,
};
pub use command_engine::CommandSpeechEngine;
pub use config::{NavigationSettings, VoiceConfig, VoiceSettings};
pub use controller::{SpeechCompletion, UtteranceState, VoiceController, VoiceControllerDelegate};
pub use engine::{SpeechEngine, SpeechEvent, StopBoundary, Utterance, UtteranceContent, UtteranceId};
pub use error::{AudioAction, AudioSessionError, EngineError, SpeechError, VoiceError, VoiceResult};
pub use instruction::{AttributedText, RouteLegProgress, RouteStep, SpokenInstruction, TextRun};
pub use locale::Locale;
pub use placeholder::{PlaceholderAudioSession, PlaceholderEngine, SessionCall};
pub use voice::{voice_for_locale, Voice, VoiceQuality, ALEX_VOICE_IDENTIFIER};
