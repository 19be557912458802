//! Voices offered by a speech engine and the locale fallback used to pick one.

use crate::locale::Locale;
use serde::{Deserialize, Serialize};

/// Identifier of the high-quality US English voice used for `en-US` guidance.
/// It cannot render attributed text, so it is only ever given plain text.
pub const ALEX_VOICE_IDENTIFIER: &str = "com.apple.speech.synthesis.voice.Alex";

/// Voice quality tier, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceQuality {
    #[default]
    Default,
    Enhanced,
    Premium,
}

/// A voice the engine can speak with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voice {
    pub identifier: String,
    pub name: String,
    /// Language tag, e.g. `en-US`.
    pub language: String,
    #[serde(default)]
    pub quality: VoiceQuality,
}

impl Voice {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            language: language.into(),
            quality: VoiceQuality::Default,
        }
    }

    pub fn with_quality(mut self, quality: VoiceQuality) -> Self {
        self.quality = quality;
        self
    }
}

/// Pick the best voice for `locale`: an exact language+region match first, then any voice in the
/// same base language. Ties go to the highest quality, then to the first listed.
pub fn voice_for_locale<'a>(voices: &'a [Voice], locale: &Locale) -> Option<&'a Voice> {
    best(voices.iter().filter(|v| locale.matches(&v.language)))
        .or_else(|| best(voices.iter().filter(|v| locale.shares_language(&v.language))))
}

fn best<'a>(candidates: impl Iterator<Item = &'a Voice>) -> Option<&'a Voice> {
    candidates.fold(None, |chosen: Option<&Voice>, v| match chosen {
        Some(c) if c.quality >= v.quality => Some(c),
        _ => Some(v),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voices() -> Vec<Voice> {
        vec![
            Voice::new("en-gb-compact", "Daniel", "en-GB"),
            Voice::new("en-us-compact", "Samantha", "en-US"),
            Voice::new("en-us-enhanced", "Samantha (Enhanced)", "en-US").with_quality(VoiceQuality::Enhanced),
            Voice::new("de-compact", "Anna", "de-DE"),
        ]
    }

    #[test]
    fn exact_match_prefers_quality() {
        let voices = voices();
        let v = voice_for_locale(&voices, &Locale::new("en-US")).unwrap();
        assert_eq!(v.identifier, "en-us-enhanced");
    }

    #[test]
    fn falls_back_to_base_language() {
        let voices = voices();
        let v = voice_for_locale(&voices, &Locale::new("de-AT")).unwrap();
        assert_eq!(v.identifier, "de-compact");
    }

    #[test]
    fn first_listed_wins_on_tie() {
        let voices = voices();
        let v = voice_for_locale(&voices, &Locale::new("en-AU")).unwrap();
        assert_eq!(v.identifier, "en-us-enhanced");
        let v = voice_for_locale(&voices[..2], &Locale::new("en-AU")).unwrap();
        assert_eq!(v.identifier, "en-gb-compact");
    }

    #[test]
    fn none_for_unknown_language() {
        assert!(voice_for_locale(&voices(), &Locale::new("ja-JP")).is_none());
    }
}
