//! **CommandSpeechEngine**: speech through the `espeak-ng` command-line synthesizer.
//!
//! For desktop hosts without a platform speech service. Each utterance runs one `espeak-ng`
//! process that plays straight to the default output device. A watcher thread reports
//! `Finished` when the process exits; `stop` kills it and reports `Cancelled`. `is_speaking` and
//! `stop` reap a process that already exited first, so a finished utterance is never cancelled.
//!
//! Attributed text is passed as SSML (`-m`) when it carries pronunciations or languages.
//! espeak-ng cannot stop at a word boundary, so `StopBoundary::Word` stops immediately.

use crate::config::VoiceConfig;
use crate::engine::{SpeechEngine, SpeechEvent, StopBoundary, Utterance, UtteranceContent, UtteranceId};
use crate::error::{EngineError, VoiceError, VoiceResult};
use crate::voice::Voice;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

struct ActiveProcess {
    id: UtteranceId,
    child: Child,
}

type Slot = Arc<Mutex<Option<ActiveProcess>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<ActiveProcess>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Speech engine backed by the `espeak-ng` binary. One utterance at a time; a new `speak`
/// replaces whatever is playing.
pub struct CommandSpeechEngine {
    bin: PathBuf,
    voices: Vec<Voice>,
    active: Slot,
    events: mpsc::UnboundedSender<SpeechEvent>,
}

impl CommandSpeechEngine {
    /// Locate `espeak-ng` (config path, then `PATH`), list its voices, and return the engine with
    /// its event receiver.
    pub fn new(config: &VoiceConfig) -> VoiceResult<(Self, mpsc::UnboundedReceiver<SpeechEvent>)> {
        let bin = config
            .espeak_bin
            .clone()
            .filter(|p| p.exists())
            .or_else(|| find_in_path("espeak-ng"))
            .or_else(|| find_in_path("espeak"))
            .ok_or_else(|| VoiceError::EngineUnavailable("espeak-ng not found on PATH".to_string()))?;

        let output = Command::new(&bin).arg("--voices").output()?;
        if !output.status.success() {
            return Err(VoiceError::EngineUnavailable(format!(
                "{} --voices failed: {}",
                bin.display(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        let voices = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
        info!(bin = ?bin, voices = voices.len(), "🔊 espeak-ng speech engine ready");

        let (events, rx) = mpsc::unbounded_channel();
        Ok((
            Self {
                bin,
                voices,
                active: Arc::new(Mutex::new(None)),
                events,
            },
            rx,
        ))
    }

    fn spawn(&self, utterance: &Utterance) -> Result<Child, EngineError> {
        let (text, ssml) = render(&utterance.content);

        let mut cmd = Command::new(&self.bin);
        cmd.arg("-v").arg(&utterance.voice.identifier);
        if ssml {
            cmd.arg("-m");
        }
        cmd.arg("--stdin");
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        debug!(target = "tts", command = ?cmd, "Running espeak-ng");
        let mut child = cmd.spawn().map_err(|e| EngineError::Launch(e.to_string()))?;
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EngineError::Launch(e.to_string()));
            }
        }
        Ok(child)
    }

    fn watch(&self, id: UtteranceId) {
        let active = Arc::clone(&self.active);
        let events = self.events.clone();
        thread::spawn(move || loop {
            thread::sleep(POLL_INTERVAL);
            let mut slot = lock(&active);
            let event = match slot.as_mut() {
                Some(process) if process.id == id => exit_event(process),
                // Stopped, replaced or reaped; whoever did that reported it.
                _ => return,
            };
            if let Some(event) = event {
                *slot = None;
                let _ = events.send(event);
                return;
            }
        });
    }

    /// Clear the slot if its process already exited, reporting how it ended. Returns whether a
    /// process is still running.
    fn reap(&self, slot: &mut Option<ActiveProcess>) -> bool {
        let Some(process) = slot.as_mut() else {
            return false;
        };
        let Some(event) = exit_event(process) else {
            return true;
        };
        *slot = None;
        let _ = self.events.send(event);
        false
    }
}

/// `Finished`/`Cancelled` once the process has exited, `None` while it runs.
fn exit_event(process: &mut ActiveProcess) -> Option<SpeechEvent> {
    match process.child.try_wait() {
        Ok(Some(status)) if status.success() => Some(SpeechEvent::Finished(process.id)),
        Ok(Some(_)) => Some(SpeechEvent::Cancelled(process.id)),
        Ok(None) => None,
        Err(e) => {
            warn!(id = %process.id, "lost track of espeak-ng: {}", e);
            Some(SpeechEvent::Cancelled(process.id))
        }
    }
}

impl SpeechEngine for CommandSpeechEngine {
    fn speak(&mut self, utterance: Utterance) -> Result<(), EngineError> {
        self.stop(StopBoundary::Immediate);

        let child = self.spawn(&utterance)?;
        *lock(&self.active) = Some(ActiveProcess {
            id: utterance.id,
            child,
        });
        let _ = self.events.send(SpeechEvent::Started(utterance.id));
        self.watch(utterance.id);
        Ok(())
    }

    fn stop(&mut self, _boundary: StopBoundary) {
        let mut slot = lock(&self.active);
        if !self.reap(&mut slot) {
            return;
        }
        let Some(mut process) = slot.take() else {
            return;
        };
        drop(slot);
        if let Err(e) = process.child.kill() {
            debug!(id = %process.id, "espeak-ng already exited: {}", e);
        }
        let _ = process.child.wait();
        let _ = self.events.send(SpeechEvent::Cancelled(process.id));
    }

    fn is_speaking(&self) -> bool {
        let mut slot = lock(&self.active);
        self.reap(&mut slot)
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }
}

impl Drop for CommandSpeechEngine {
    fn drop(&mut self) {
        self.stop(StopBoundary::Immediate);
    }
}

/// Text to feed espeak-ng, and whether it is SSML.
fn render(content: &UtteranceContent) -> (String, bool) {
    match content {
        UtteranceContent::Plain(text) => (text.clone(), false),
        UtteranceContent::Attributed(text) => {
            let rich = text
                .runs
                .iter()
                .any(|r| r.pronunciation.is_some() || r.language.is_some());
            if rich {
                (text.to_ssml(), true)
            } else {
                (text.plain_text(), false)
            }
        }
    }
}

/// Parse `espeak-ng --voices` output. Columns: Pty, Language, Age/Gender, VoiceName, File, ...
fn parse_voice_list(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            let (language, name) = (cols.get(1)?, cols.get(3)?);
            Some(Voice::new(*language, name.replace('_', " "), *language))
        })
        .collect()
}

fn find_in_path(bin: &str) -> Option<PathBuf> {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return p.exists().then_some(p);
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(bin))
        .find(|candidate| Path::new(candidate).is_file())
}
