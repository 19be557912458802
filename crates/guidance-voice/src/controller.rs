//! **VoiceController**: speaks route instructions and keeps the audio session in step.
//!
//! The controller owns a [`SpeechEngine`] and an [`AudioSession`]. `speak` turns an instruction
//! into an utterance and submits it; engine lifecycle events come back through
//! [`VoiceController::handle_event`], which ducks other audio while speech plays, releases it
//! afterwards, and resolves the request's completion exactly once.
//!
//! ```text
//! speak ──► Queued ──Started──► Speaking ──Finished──► (completion)
//!                                 │   ▲
//!                           Paused│   │Continued
//!                                 ▼   │
//!                                Paused ──Cancelled──► (completion)
//! ```
//!
//! Only one utterance is active at a time. Speaking while another utterance is still playing
//! reports the interruption to the delegate and stops the old one, which then resolves through
//! its cancel path.

use crate::audio_session::{self, AudioInterruption, AudioSession, InterruptionCenter};
use crate::config::{NavigationSettings, VoiceConfig, VoiceSettings};
use crate::engine::{SpeechEngine, SpeechEvent, StopBoundary, Utterance, UtteranceContent, UtteranceId};
use crate::error::{AudioAction, AudioSessionError, SpeechError};
use crate::instruction::{RouteLegProgress, SpokenInstruction};
use crate::locale::Locale;
use crate::voice::{voice_for_locale, Voice};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// One-shot callback resolving a `speak` request. `None` means the instruction was spoken (or
/// skipped because guidance is muted).
pub type SpeechCompletion = Box<dyn FnOnce(Option<SpeechError>) + Send + 'static>;

/// Hooks the navigation UI implements to follow and adjust spoken guidance.
pub trait VoiceControllerDelegate: Send + Sync {
    /// Last chance to rewrite an instruction before it is spoken.
    fn will_speak(&self, instruction: SpokenInstruction) -> SpokenInstruction {
        instruction
    }

    /// `previous` was still playing when `next` was submitted and has been cut off.
    fn did_interrupt(&self, _previous: &SpokenInstruction, _next: &SpokenInstruction) {}

    /// Something went wrong outside of any single request's control, e.g. ducking failed.
    fn did_fail(&self, _error: &SpeechError) {}
}

/// Lifecycle position of a submitted utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceState {
    Queued,
    Speaking,
    Paused,
    Finished,
    Cancelled,
}

impl UtteranceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UtteranceState::Finished | UtteranceState::Cancelled)
    }
}

struct UtteranceRecord {
    id: UtteranceId,
    instruction: SpokenInstruction,
    state: UtteranceState,
    completion: Option<SpeechCompletion>,
    queued_at: DateTime<Utc>,
}

/// Speaks navigation instructions through `E` while managing audio focus through `S`.
pub struct VoiceController<E: SpeechEngine, S: AudioSession> {
    engine: E,
    session: S,
    delegate: Option<Arc<dyn VoiceControllerDelegate>>,
    settings: Arc<dyn VoiceSettings>,
    locale: Locale,
    muted: bool,
    preferred_voice_locale: Locale,
    preferred_voice_identifier: String,
    /// Submitted utterances that have not reached a terminal event yet, oldest first.
    records: VecDeque<UtteranceRecord>,
    last_instruction: Option<SpokenInstruction>,
    next_id: u64,
    pub(crate) interruptions: Option<broadcast::Receiver<AudioInterruption>>,
}

impl<E: SpeechEngine, S: AudioSession> VoiceController<E, S> {
    pub fn new(engine: E, session: S, config: &VoiceConfig) -> Self {
        info!("🗣️ Voice controller ready (locale {})", config.locale());
        Self {
            engine,
            session,
            delegate: None,
            settings: Arc::new(NavigationSettings::from(config)),
            locale: config.locale(),
            muted: config.muted,
            preferred_voice_locale: config.preferred_voice_locale(),
            preferred_voice_identifier: config.preferred_voice_identifier.clone(),
            records: VecDeque::new(),
            last_instruction: None,
            next_id: 1,
            interruptions: None,
        }
    }

    /// Replace the settings provider the volume is read from.
    pub fn with_settings(mut self, settings: Arc<dyn VoiceSettings>) -> Self {
        self.settings = settings;
        self
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn VoiceControllerDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn clear_delegate(&mut self) {
        self.delegate = None;
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn is_speaking(&self) -> bool {
        self.engine.is_speaking()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Muting while speech is playing cuts it off immediately.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        info!(muted, "voice guidance mute toggled");
        if muted && self.engine.is_speaking() {
            self.interrupt_speaking();
        }
    }

    /// Guidance volume as configured in the navigation settings.
    pub fn volume(&self) -> f32 {
        self.settings.voice_volume()
    }

    /// Speech plays at the system output volume; this setter exists for interface parity only.
    pub fn set_volume(&mut self, volume: f32) {
        debug!(volume, "ignoring volume change; speech follows system output volume");
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
    }

    /// Notification that the upcoming instruction list changed. Nothing is prefetched, so this
    /// is accepted and ignored.
    pub fn changed_incoming_spoken_instructions(&mut self, _instructions: &[SpokenInstruction]) {}

    /// State of an utterance that has not resolved yet.
    pub fn utterance_state(&self, id: UtteranceId) -> Option<UtteranceState> {
        self.record(id).map(|r| r.state)
    }

    /// Requests whose completion has not been invoked yet.
    pub fn pending_completions(&self) -> usize {
        self.records.iter().filter(|r| r.completion.is_some()).count()
    }

    /// Speak `instruction`. `completion` is invoked exactly once: right away when muted or when
    /// no voice fits the locale, otherwise when the utterance finishes or is cancelled.
    ///
    /// Returns the id of the submitted utterance, or `None` if nothing was submitted.
    pub fn speak<F>(
        &mut self,
        instruction: SpokenInstruction,
        progress: &RouteLegProgress,
        completion: F,
    ) -> Option<UtteranceId>
    where
        F: FnOnce(Option<SpeechError>) + Send + 'static,
    {
        if self.muted {
            debug!("muted, skipping \"{}\"", instruction.text);
            completion(None);
            return None;
        }

        let instruction = match self.delegate {
            Some(ref delegate) => delegate.will_speak(instruction),
            None => instruction,
        };

        let (content, voice) = match self.build_utterance(&instruction, progress) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("cannot speak \"{}\": {}", instruction.text, e);
                completion(Some(e));
                return None;
            }
        };

        if self.engine.is_speaking() {
            if let (Some(previous), Some(delegate)) = (self.records.back(), &self.delegate) {
                delegate.did_interrupt(&previous.instruction, &instruction);
            }
            info!("⚡ Interrupting active guidance for \"{}\"", instruction.text);
            self.engine.stop(StopBoundary::Immediate);
        }

        let id = UtteranceId(self.next_id);
        self.next_id += 1;

        let utterance = Utterance {
            id,
            content,
            voice,
        };
        debug!(%id, voice = %utterance.voice.identifier, "submitting utterance");

        self.records.push_back(UtteranceRecord {
            id,
            instruction: instruction.clone(),
            state: UtteranceState::Queued,
            completion: Some(Box::new(completion)),
            queued_at: Utc::now(),
        });
        self.last_instruction = Some(instruction);

        if let Err(e) = self.engine.speak(utterance) {
            warn!(%id, "engine rejected utterance: {}", e);
            if let Some(mut record) = self.take_record(id) {
                if let Some(completion) = record.completion.take() {
                    completion(Some(SpeechError::Engine(e)));
                }
            }
            return None;
        }

        Some(id)
    }

    /// Stop after the word being spoken.
    pub fn stop_speaking(&mut self) {
        self.engine.stop(StopBoundary::Word);
    }

    /// Stop mid-word.
    pub fn interrupt_speaking(&mut self) {
        self.engine.stop(StopBoundary::Immediate);
    }

    /// Apply one engine lifecycle event.
    ///
    /// Start/continue claim ducking; pause, cancel and finish release it. Cancel and finish also
    /// resolve the utterance's completion with the release error, if any.
    pub fn handle_event(&mut self, event: SpeechEvent) {
        let id = event.utterance();
        debug!(?event, "speech event");

        match event {
            SpeechEvent::Started(_) | SpeechEvent::Continued(_) => {
                self.set_state(id, UtteranceState::Speaking);
                if let Err(e) = self.duck_audio(id) {
                    self.report(&e);
                }
            }
            SpeechEvent::Paused(_) => {
                self.set_state(id, UtteranceState::Paused);
                if let Err(e) = self.unduck_audio(id) {
                    self.report(&e);
                }
            }
            SpeechEvent::Cancelled(_) | SpeechEvent::Finished(_) => {
                let result = self.unduck_audio(id);
                if let Err(ref e) = result {
                    self.report(e);
                }

                let terminal = if matches!(event, SpeechEvent::Finished(_)) {
                    UtteranceState::Finished
                } else {
                    UtteranceState::Cancelled
                };

                match self.take_record(id) {
                    Some(mut record) => {
                        record.state = terminal;
                        let elapsed = Utc::now() - record.queued_at;
                        info!(
                            %id,
                            state = ?record.state,
                            elapsed_ms = elapsed.num_milliseconds(),
                            "guidance utterance resolved"
                        );
                        if let Some(completion) = record.completion.take() {
                            completion(result.err());
                        }
                    }
                    None => debug!(%id, "terminal event for unknown utterance"),
                }
            }
        }
    }

    /// Subscribe to audio interruption notifications for as long as this controller lives.
    /// Replaces any earlier subscription.
    pub fn start_observing_interruptions(&mut self, center: &InterruptionCenter) {
        self.interruptions = Some(center.subscribe());
    }

    pub fn stop_observing_interruptions(&mut self) {
        self.interruptions = None;
    }

    pub fn is_observing_interruptions(&self) -> bool {
        self.interruptions.is_some()
    }

    /// Best-effort release of ducking. Pending completions are left alone.
    pub fn handle_interruption(&mut self, interruption: AudioInterruption) {
        info!(?interruption, "audio session interrupted");
        if let Err(e) = audio_session::unduck(&mut self.session) {
            warn!("failed to release audio after interruption: {}", e);
        }
    }

    /// Process queued interruption notifications without blocking. Returns how many were handled.
    pub fn drain_interruptions(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let Some(ref mut rx) = self.interruptions else {
                return handled;
            };
            match rx.try_recv() {
                Ok(interruption) => self.handle_interruption(interruption),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "interruption notifications lagged");
                    self.handle_interruption(AudioInterruption::Began);
                }
                Err(TryRecvError::Empty) => return handled,
                Err(TryRecvError::Closed) => {
                    self.interruptions = None;
                    return handled;
                }
            }
            handled += 1;
        }
    }

    fn build_utterance(
        &self,
        instruction: &SpokenInstruction,
        progress: &RouteLegProgress,
    ) -> Result<(UtteranceContent, Voice), SpeechError> {
        if self.locale == self.preferred_voice_locale {
            if let Some(voice) = self.engine.voice_with_identifier(&self.preferred_voice_identifier) {
                // The preferred voice can't render attributed text.
                return Ok((UtteranceContent::Plain(instruction.text.clone()), voice));
            }
        }

        let attributed = instruction.attributed_text(progress);
        let voices = self.engine.voices();
        let voice = attributed
            .language()
            .and_then(|language| voice_for_locale(&voices, &Locale::new(language)))
            .or_else(|| voice_for_locale(&voices, &self.locale))
            .cloned()
            .ok_or_else(|| SpeechError::UnsupportedLocale {
                language_code: self.locale.identifier(),
            })?;

        Ok((UtteranceContent::Attributed(attributed), voice))
    }

    fn duck_audio(&mut self, id: UtteranceId) -> Result<(), SpeechError> {
        audio_session::duck(&mut self.session).map_err(|e| self.audio_error(id, AudioAction::Duck, e))
    }

    fn unduck_audio(&mut self, id: UtteranceId) -> Result<(), SpeechError> {
        audio_session::unduck(&mut self.session).map_err(|e| self.audio_error(id, AudioAction::Unduck, e))
    }

    fn audio_error(&self, id: UtteranceId, action: AudioAction, source: AudioSessionError) -> SpeechError {
        let instruction = self
            .record(id)
            .map(|r| r.instruction.clone())
            .or_else(|| self.last_instruction.clone());
        SpeechError::UnableToControlAudio {
            instruction,
            action,
            source,
        }
    }

    fn report(&self, error: &SpeechError) {
        warn!("voice guidance error: {}", error);
        if let Some(ref delegate) = self.delegate {
            delegate.did_fail(error);
        }
    }

    fn record(&self, id: UtteranceId) -> Option<&UtteranceRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    fn set_state(&mut self, id: UtteranceId, state: UtteranceState) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.state = state;
        }
    }

    fn take_record(&mut self, id: UtteranceId) -> Option<UtteranceRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        self.records.remove(index)
    }
}

impl<E: SpeechEngine, S: AudioSession> Drop for VoiceController<E, S> {
    fn drop(&mut self) {
        self.interruptions = None;
        if self.engine.is_speaking() {
            self.engine.stop(StopBoundary::Immediate);
        }
        if self.records.is_empty() {
            return;
        }
        let released = audio_session::unduck(&mut self.session);
        if let (Err(e), Some(last)) = (&released, self.records.back().map(|r| r.id)) {
            self.report(&self.audio_error(last, AudioAction::Unduck, e.clone()));
        }
        for mut record in self.records.drain(..) {
            let error = released.as_ref().err().map(|source| SpeechError::UnableToControlAudio {
                instruction: Some(record.instruction.clone()),
                action: AudioAction::Unduck,
                source: source.clone(),
            });
            if let Some(completion) = record.completion.take() {
                completion(error);
            }
        }
    }
}
