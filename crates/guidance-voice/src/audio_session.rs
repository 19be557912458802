//! Audio session control: claiming a ducking playback category while guidance speaks and
//! handing audio focus back afterwards.
//!
//! Also hosts the interruption notification channel (phone calls, other apps taking focus).

use crate::error::AudioSessionError;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Session category family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryKind {
    Playback,
    Ambient,
}

/// Session mode hint for the OS mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Short spoken prompts (navigation, assistants).
    VoicePrompt,
    /// Long-form spoken audio; used where voice-prompt mode is unavailable.
    SpokenAudio,
}

/// Mixing behaviour requested alongside the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryOptions {
    /// Lower the volume of other audio while the session is active.
    pub duck_others: bool,
    /// Play alongside other audio instead of interrupting it.
    pub mix_with_others: bool,
}

/// Full category request passed to [`AudioSession::set_category`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCategory {
    pub kind: CategoryKind,
    pub mode: SessionMode,
    pub options: CategoryOptions,
}

impl SessionCategory {
    /// The category used while guidance speaks: playback/voice-prompt, or ambient/spoken-audio
    /// on sessions without voice-prompt support. Always ducks and mixes.
    pub fn ducking(voice_prompt_supported: bool) -> Self {
        let options = CategoryOptions {
            duck_others: true,
            mix_with_others: true,
        };
        if voice_prompt_supported {
            Self {
                kind: CategoryKind::Playback,
                mode: SessionMode::VoicePrompt,
                options,
            }
        } else {
            Self {
                kind: CategoryKind::Ambient,
                mode: SessionMode::SpokenAudio,
                options,
            }
        }
    }
}

/// The process-wide audio session of the host platform.
pub trait AudioSession {
    fn set_category(&mut self, category: SessionCategory) -> Result<(), AudioSessionError>;

    /// Activate or deactivate. `notify_others` lets interrupted apps resume on deactivation.
    fn set_active(&mut self, active: bool, notify_others: bool) -> Result<(), AudioSessionError>;

    fn supports_voice_prompt_mode(&self) -> bool {
        true
    }
}

/// Claim the ducking category, then activate.
pub(crate) fn duck<S: AudioSession + ?Sized>(session: &mut S) -> Result<(), AudioSessionError> {
    let category = SessionCategory::ducking(session.supports_voice_prompt_mode());
    session.set_category(category)?;
    session.set_active(true, false)?;
    debug!(?category, "audio session ducked");
    Ok(())
}

/// Deactivate and notify others so their audio comes back up.
pub(crate) fn unduck<S: AudioSession + ?Sized>(session: &mut S) -> Result<(), AudioSessionError> {
    session.set_active(false, true)?;
    debug!("audio session released");
    Ok(())
}

/// Audio session for hosts without an OS-level session (desktop Linux, tests). Every call succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudioSession;

impl AudioSession for NullAudioSession {
    fn set_category(&mut self, _category: SessionCategory) -> Result<(), AudioSessionError> {
        Ok(())
    }

    fn set_active(&mut self, _active: bool, _notify_others: bool) -> Result<(), AudioSessionError> {
        Ok(())
    }
}

/// System audio interruption notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioInterruption {
    /// Another audio client took over (incoming call, alarm).
    Began,
    /// The interruption is over.
    Ended { should_resume: bool },
}

/// Fan-out point for interruption notifications. Platform glue posts; controllers subscribe.
#[derive(Debug, Clone)]
pub struct InterruptionCenter {
    tx: broadcast::Sender<AudioInterruption>,
}

impl InterruptionCenter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Deliver a notification to every subscriber. Returns how many received it.
    pub fn post(&self, interruption: AudioInterruption) -> usize {
        let delivered = self.tx.send(interruption).unwrap_or(0);
        info!(?interruption, delivered, "audio interruption posted");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AudioInterruption> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for InterruptionCenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ducking_category_falls_back_without_voice_prompt() {
        let modern = SessionCategory::ducking(true);
        assert_eq!(modern.kind, CategoryKind::Playback);
        assert_eq!(modern.mode, SessionMode::VoicePrompt);

        let legacy = SessionCategory::ducking(false);
        assert_eq!(legacy.kind, CategoryKind::Ambient);
        assert_eq!(legacy.mode, SessionMode::SpokenAudio);
        assert!(legacy.options.duck_others && legacy.options.mix_with_others);
    }

    #[test]
    fn post_without_subscribers_is_harmless() {
        let center = InterruptionCenter::new();
        assert_eq!(center.post(AudioInterruption::Began), 0);
    }

    #[test]
    fn subscribers_receive_posts() {
        let center = InterruptionCenter::new();
        let mut rx = center.subscribe();
        assert_eq!(center.subscriber_count(), 1);
        center.post(AudioInterruption::Ended { should_resume: true });
        assert_eq!(rx.try_recv().unwrap(), AudioInterruption::Ended { should_resume: true });
    }
}
