//! Placeholder engine and audio session. Nothing is audible; use them to drive the controller
//! in tests and headless runs.
//!
//! Both types are cheap handles over shared state: keep a clone to inspect what the controller
//! did, or to make the engine finish/pause the utterance it is "speaking".

use crate::audio_session::{AudioSession, SessionCategory};
use crate::engine::{SpeechEngine, SpeechEvent, StopBoundary, Utterance, UtteranceId};
use crate::error::{AudioSessionError, EngineError};
use crate::voice::Voice;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct EngineState {
    voices: Vec<Voice>,
    queue: VecDeque<UtteranceId>,
    submitted: Vec<Utterance>,
    stops: Vec<StopBoundary>,
    paused: bool,
    reject_next: Option<String>,
}

/// Engine that queues utterances like a platform synthesizer and emits events on command.
///
/// `speak` starts the utterance right away when idle (emitting `Started`); `stop` cancels
/// everything queued. `finish_current`, `pause_current` and `continue_current` stand in for the
/// synthesizer reaching those points on its own.
#[derive(Debug, Clone)]
pub struct PlaceholderEngine {
    state: Arc<Mutex<EngineState>>,
    events: mpsc::UnboundedSender<SpeechEvent>,
}

impl PlaceholderEngine {
    pub fn new(voices: Vec<Voice>) -> (Self, mpsc::UnboundedReceiver<SpeechEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let state = EngineState {
            voices,
            ..Default::default()
        };
        (
            Self {
                state: Arc::new(Mutex::new(state)),
                events,
            },
            rx,
        )
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: SpeechEvent) {
        // Receiver gone means nobody is driving the controller any more.
        let _ = self.events.send(event);
    }

    /// Every utterance accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<Utterance> {
        self.state().submitted.clone()
    }

    /// Stop requests received so far.
    pub fn stops(&self) -> Vec<StopBoundary> {
        self.state().stops.clone()
    }

    /// The utterance currently at the head of the queue.
    pub fn current(&self) -> Option<UtteranceId> {
        self.state().queue.front().copied()
    }

    /// Make the next `speak` fail with `EngineError::Rejected`.
    pub fn reject_next(&self, reason: impl Into<String>) {
        self.state().reject_next = Some(reason.into());
    }

    /// Finish the head utterance and start the next queued one.
    pub fn finish_current(&self) -> Option<UtteranceId> {
        let (finished, next) = {
            let mut state = self.state();
            let finished = state.queue.pop_front()?;
            state.paused = false;
            (finished, state.queue.front().copied())
        };
        self.emit(SpeechEvent::Finished(finished));
        if let Some(next) = next {
            self.emit(SpeechEvent::Started(next));
        }
        Some(finished)
    }

    pub fn pause_current(&self) -> Option<UtteranceId> {
        let id = {
            let mut state = self.state();
            let id = *state.queue.front()?;
            state.paused = true;
            id
        };
        self.emit(SpeechEvent::Paused(id));
        Some(id)
    }

    pub fn continue_current(&self) -> Option<UtteranceId> {
        let id = {
            let mut state = self.state();
            if !state.paused {
                return None;
            }
            state.paused = false;
            *state.queue.front()?
        };
        self.emit(SpeechEvent::Continued(id));
        Some(id)
    }
}

impl SpeechEngine for PlaceholderEngine {
    fn speak(&mut self, utterance: Utterance) -> Result<(), EngineError> {
        let start = {
            let mut state = self.state();
            if let Some(reason) = state.reject_next.take() {
                return Err(EngineError::Rejected(reason));
            }
            state.queue.push_back(utterance.id);
            state.submitted.push(utterance.clone());
            state.queue.len() == 1
        };
        if start {
            self.emit(SpeechEvent::Started(utterance.id));
        }
        Ok(())
    }

    fn stop(&mut self, boundary: StopBoundary) {
        let cancelled: Vec<_> = {
            let mut state = self.state();
            state.stops.push(boundary);
            state.paused = false;
            state.queue.drain(..).collect()
        };
        for id in cancelled {
            self.emit(SpeechEvent::Cancelled(id));
        }
    }

    fn is_speaking(&self) -> bool {
        !self.state().queue.is_empty()
    }

    fn voices(&self) -> Vec<Voice> {
        self.state().voices.clone()
    }
}

/// A call the controller made on the audio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCall {
    SetCategory(SessionCategory),
    SetActive { active: bool, notify_others: bool },
}

#[derive(Debug, Default)]
struct SessionState {
    calls: Vec<SessionCall>,
    fail_category: Option<String>,
    fail_activation: Option<String>,
    fail_deactivation: Option<String>,
    voice_prompt_supported: bool,
}

/// Audio session that records every call and fails on demand.
#[derive(Debug, Clone)]
pub struct PlaceholderAudioSession {
    state: Arc<Mutex<SessionState>>,
}

impl PlaceholderAudioSession {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                voice_prompt_supported: true,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of `set_active(true, _)` attempts.
    pub fn activations(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SessionCall::SetActive { active: true, .. }))
            .count()
    }

    /// Number of `set_active(false, _)` attempts.
    pub fn deactivations(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SessionCall::SetActive { active: false, .. }))
            .count()
    }

    /// `Some(reason)` makes every `set_category` fail until reset with `None`.
    pub fn fail_category(&self, reason: Option<&str>) {
        self.state().fail_category = reason.map(str::to_string);
    }

    pub fn fail_activation(&self, reason: Option<&str>) {
        self.state().fail_activation = reason.map(str::to_string);
    }

    pub fn fail_deactivation(&self, reason: Option<&str>) {
        self.state().fail_deactivation = reason.map(str::to_string);
    }

    pub fn set_voice_prompt_supported(&self, supported: bool) {
        self.state().voice_prompt_supported = supported;
    }
}

impl Default for PlaceholderAudioSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSession for PlaceholderAudioSession {
    fn set_category(&mut self, category: SessionCategory) -> Result<(), AudioSessionError> {
        let mut state = self.state();
        state.calls.push(SessionCall::SetCategory(category));
        match state.fail_category {
            Some(ref reason) => Err(AudioSessionError::CategoryRejected(reason.clone())),
            None => Ok(()),
        }
    }

    fn set_active(&mut self, active: bool, notify_others: bool) -> Result<(), AudioSessionError> {
        let mut state = self.state();
        state.calls.push(SessionCall::SetActive { active, notify_others });
        let failure = if active {
            state.fail_activation.clone().map(AudioSessionError::ActivationFailed)
        } else {
            state.fail_deactivation.clone().map(AudioSessionError::DeactivationFailed)
        };
        failure.map_or(Ok(()), Err)
    }

    fn supports_voice_prompt_mode(&self) -> bool {
        self.state().voice_prompt_supported
    }
}
