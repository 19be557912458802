//! **Event driver**: feeds engine events and audio interruptions into a `VoiceController`.
//!
//! Engines report lifecycle changes on an mpsc channel and the platform posts interruptions
//! through an `InterruptionCenter`. `run` waits on both and applies each one on the calling
//! task, so the controller itself never needs a lock.

use crate::audio_session::{AudioInterruption, AudioSession};
use crate::controller::VoiceController;
use crate::engine::{SpeechEngine, SpeechEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{info, warn};

impl<E: SpeechEngine, S: AudioSession> VoiceController<E, S> {
    /// Apply engine events and interruption notifications until the engine's event channel
    /// closes. Safe to cancel (e.g. from `tokio::select!`) between events.
    pub async fn run(&mut self, engine_events: &mut mpsc::UnboundedReceiver<SpeechEvent>) {
        loop {
            enum Incoming {
                Speech(SpeechEvent),
                Interruption(AudioInterruption),
                InterruptionsLagged(u64),
                InterruptionsClosed,
                EngineClosed,
            }

            let incoming = if let Some(ref mut rx) = self.interruptions {
                tokio::select! {
                    event = engine_events.recv() => match event {
                        Some(e) => Incoming::Speech(e),
                        None => Incoming::EngineClosed,
                    },
                    note = rx.recv() => match note {
                        Ok(n) => Incoming::Interruption(n),
                        Err(RecvError::Lagged(skipped)) => Incoming::InterruptionsLagged(skipped),
                        Err(RecvError::Closed) => Incoming::InterruptionsClosed,
                    },
                }
            } else {
                match engine_events.recv().await {
                    Some(e) => Incoming::Speech(e),
                    None => Incoming::EngineClosed,
                }
            };

            match incoming {
                Incoming::Speech(event) => self.handle_event(event),
                Incoming::Interruption(interruption) => self.handle_interruption(interruption),
                Incoming::InterruptionsLagged(skipped) => {
                    warn!(skipped, "interruption notifications lagged");
                    self.handle_interruption(AudioInterruption::Began);
                }
                Incoming::InterruptionsClosed => {
                    info!("interruption source closed; no longer observing");
                    self.stop_observing_interruptions();
                }
                Incoming::EngineClosed => {
                    info!("speech engine event channel closed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::audio_session::{AudioInterruption, InterruptionCenter};
    use crate::config::VoiceConfig;
    use crate::controller::VoiceController;
    use crate::instruction::{RouteLegProgress, SpokenInstruction};
    use crate::placeholder::{PlaceholderAudioSession, PlaceholderEngine};
    use crate::voice::Voice;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn config() -> VoiceConfig {
        VoiceConfig {
            locale: Some("en-GB".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn run_resolves_completion_when_engine_finishes() {
        let (engine, mut events) = PlaceholderEngine::new(vec![Voice::new("en-gb", "Daniel", "en-GB")]);
        let session = PlaceholderAudioSession::new();
        let mut controller = VoiceController::new(engine.clone(), session.clone(), &config());

        let (done_tx, done_rx) = oneshot::channel();
        controller.speak(
            SpokenInstruction::new("Turn right"),
            &RouteLegProgress::default(),
            move |err| {
                let _ = done_tx.send(err.is_none());
            },
        );
        engine.finish_current();

        let outcome = tokio::select! {
            _ = controller.run(&mut events) => None,
            done = done_rx => done.ok(),
        };

        assert_eq!(outcome, Some(true));
        assert_eq!(session.activations(), 1);
        assert_eq!(session.deactivations(), 1);
    }

    #[tokio::test]
    async fn run_applies_interruptions() {
        let (engine, mut events) = PlaceholderEngine::new(vec![Voice::new("en-gb", "Daniel", "en-GB")]);
        let session = PlaceholderAudioSession::new();
        let center = InterruptionCenter::new();
        let mut controller = VoiceController::new(engine, session.clone(), &config());
        controller.start_observing_interruptions(&center);

        center.post(AudioInterruption::Began);
        let _ = tokio::time::timeout(Duration::from_millis(50), controller.run(&mut events)).await;

        assert_eq!(session.deactivations(), 1);
        assert!(controller.is_observing_interruptions());
    }

    #[tokio::test]
    async fn run_returns_when_engine_channel_closes() {
        let (engine, mut events) = PlaceholderEngine::new(Vec::new());
        let mut controller = VoiceController::new(engine, PlaceholderAudioSession::new(), &config());
        events.close();
        tokio_test::assert_ready!(tokio_test::task::spawn(controller.run(&mut events)).poll());
    }
}
