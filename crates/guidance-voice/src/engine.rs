//! **Speech engine** capability: the seam between the controller and whatever actually talks.
//!
//! An engine accepts `Utterance`s, stops on request, and reports lifecycle changes as
//! `SpeechEvent`s on the channel handed out by its constructor. The controller consumes those
//! events on its own task, so engines are free to produce them from any thread.

use crate::error::EngineError;
use crate::instruction::AttributedText;
use crate::voice::Voice;
use std::fmt;

/// Identifies one submitted utterance across its lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utterance#{}", self.0)
    }
}

/// What the engine should say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceContent {
    Plain(String),
    Attributed(AttributedText),
}

impl UtteranceContent {
    /// Text without speech attributes, for engines that cannot render them and for logging.
    pub fn plain_text(&self) -> String {
        match self {
            UtteranceContent::Plain(text) => text.clone(),
            UtteranceContent::Attributed(text) => text.plain_text(),
        }
    }
}

/// One unit of speech submitted to an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub content: UtteranceContent,
    pub voice: Voice,
}

/// Where a stop request takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBoundary {
    /// Cut the current utterance off at once.
    Immediate,
    /// Let the current word finish.
    Word,
}

/// Lifecycle notifications from an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEvent {
    Started(UtteranceId),
    Continued(UtteranceId),
    Paused(UtteranceId),
    Cancelled(UtteranceId),
    Finished(UtteranceId),
}

impl SpeechEvent {
    pub fn utterance(&self) -> UtteranceId {
        match *self {
            SpeechEvent::Started(id)
            | SpeechEvent::Continued(id)
            | SpeechEvent::Paused(id)
            | SpeechEvent::Cancelled(id)
            | SpeechEvent::Finished(id) => id,
        }
    }
}

/// Backend that turns utterances into audible speech.
pub trait SpeechEngine {
    /// Submit an utterance. An engine may queue it behind the active one or replace the active
    /// one; the controller stops the active utterance first when it wants preemption.
    fn speak(&mut self, utterance: Utterance) -> Result<(), EngineError>;

    /// Stop the active utterance and drop anything queued.
    fn stop(&mut self, boundary: StopBoundary);

    /// True while an utterance is speaking or paused.
    fn is_speaking(&self) -> bool;

    /// Voices this engine can speak with.
    fn voices(&self) -> Vec<Voice>;

    fn voice_with_identifier(&self, identifier: &str) -> Option<Voice> {
        self.voices().into_iter().find(|v| v.identifier == identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::TextRun;

    #[test]
    fn event_reports_its_utterance() {
        let id = UtteranceId(7);
        for event in [
            SpeechEvent::Started(id),
            SpeechEvent::Continued(id),
            SpeechEvent::Paused(id),
            SpeechEvent::Cancelled(id),
            SpeechEvent::Finished(id),
        ] {
            assert_eq!(event.utterance(), id);
        }
    }

    #[test]
    fn attributed_content_flattens_to_text() {
        let content = UtteranceContent::Attributed(AttributedText::new(vec![
            TextRun::plain("Exit onto "),
            TextRun {
                text: "Route 9".to_string(),
                pronunciation: Some("ɹut naɪn".to_string()),
                language: None,
            },
        ]));
        assert_eq!(content.plain_text(), "Exit onto Route 9");
    }
}
