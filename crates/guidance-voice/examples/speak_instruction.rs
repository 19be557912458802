//! Speak Instruction Demo: one instruction through espeak-ng.
//!
//! Usage: `cargo run --example speak_instruction -- "In 500 feet, turn left"`
//!
//! Reads `.env` and `config/voice.toml` (see `VoiceConfig`). Needs `espeak-ng` on PATH or
//! `GUIDANCE_VOICE__ESPEAK_BIN`. Press Ctrl+C to cut the instruction off.

use anyhow::Context;
use guidance_voice::{
    CommandSpeechEngine, InterruptionCenter, NullAudioSession, RouteLegProgress, SpeechError,
    SpokenInstruction, VoiceConfig, VoiceController, VoiceControllerDelegate,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

struct LoggingDelegate;

impl VoiceControllerDelegate for LoggingDelegate {
    fn did_interrupt(&self, previous: &SpokenInstruction, next: &SpokenInstruction) {
        info!("Interrupted \"{}\" with \"{}\"", previous.text, next.text);
    }

    fn did_fail(&self, error: &SpeechError) {
        warn!("Guidance error: {}", error);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let text = if text.trim().is_empty() {
        "In 500 feet, turn left onto Main Street".to_string()
    } else {
        text
    };

    let config = VoiceConfig::load().context("loading voice config")?;
    let (engine, mut events) = CommandSpeechEngine::new(&config).context("starting espeak-ng")?;

    let center = InterruptionCenter::new();
    let mut controller = VoiceController::new(engine, NullAudioSession, &config);
    controller.set_delegate(Arc::new(LoggingDelegate));
    controller.start_observing_interruptions(&center);

    info!("Locale {}, volume {:.2}", controller.locale(), controller.volume());

    let (done_tx, done_rx) = oneshot::channel();
    controller.speak(SpokenInstruction::new(text), &RouteLegProgress::default(), move |err| {
        let _ = done_tx.send(err);
    });

    let mut done_rx = done_rx;
    tokio::select! {
        _ = controller.run(&mut events) => warn!("Engine stopped before the instruction resolved"),
        outcome = &mut done_rx => match outcome {
            Ok(None) => info!("✅ Instruction spoken"),
            Ok(Some(e)) => warn!("Instruction failed: {}", e),
            Err(_) => warn!("Completion dropped"),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C, interrupting");
            controller.interrupt_speaking();
        }
    }

    Ok(())
}
