//! Integration tests for the voice guidance controller
//!
//! These drive the controller through the placeholder engine and audio session, so they run
//! without audio hardware. The espeak-ng test is ignored by default.

use guidance_voice::{
    AudioAction, AudioInterruption, InterruptionCenter, PlaceholderAudioSession, PlaceholderEngine,
    RouteLegProgress, RouteStep, SessionCall, SpeechError, SpeechEvent, SpokenInstruction,
    UtteranceContent, Voice, VoiceConfig, VoiceController, VoiceControllerDelegate,
    ALEX_VOICE_IDENTIFIER,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

type Controller = VoiceController<PlaceholderEngine, PlaceholderAudioSession>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn setup(locale: &str) -> (Controller, PlaceholderEngine, PlaceholderAudioSession, mpsc::UnboundedReceiver<SpeechEvent>) {
    init_tracing();
    let voices = vec![
        Voice::new(ALEX_VOICE_IDENTIFIER, "Alex", "en-US"),
        Voice::new("fr-fr", "Thomas", "fr-FR"),
    ];
    let (engine, events) = PlaceholderEngine::new(voices);
    let session = PlaceholderAudioSession::new();
    let config = VoiceConfig {
        locale: Some(locale.to_string()),
        ..Default::default()
    };
    let controller = VoiceController::new(engine.clone(), session.clone(), &config);
    (controller, engine, session, events)
}

fn pump(controller: &mut Controller, events: &mut mpsc::UnboundedReceiver<SpeechEvent>) {
    while let Ok(event) = events.try_recv() {
        controller.handle_event(event);
    }
}

#[derive(Default)]
struct Journal {
    entries: Mutex<Vec<String>>,
}

impl Journal {
    fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

impl VoiceControllerDelegate for Journal {
    fn did_interrupt(&self, previous: &SpokenInstruction, next: &SpokenInstruction) {
        self.push(format!("interrupt {} -> {}", previous.text, next.text));
    }

    fn did_fail(&self, error: &SpeechError) {
        self.push(format!("fail {}", error));
    }
}

fn completion_into(journal: &Arc<Journal>, label: &'static str) -> impl FnOnce(Option<SpeechError>) + Send + 'static {
    let journal = journal.clone();
    move |err| journal.push(format!("done {} {}", label, err.map_or("ok".to_string(), |e| e.to_string())))
}

#[test]
fn test_guidance_session_lifecycle() {
    let (mut controller, engine, session, mut events) = setup("en-US");
    let journal = Arc::new(Journal::default());
    controller.set_delegate(journal.clone());
    let progress = RouteLegProgress::default();

    controller.speak(SpokenInstruction::new("In 500 feet, turn left"), &progress, completion_into(&journal, "A"));
    pump(&mut controller, &mut events);
    controller.speak(SpokenInstruction::new("Turn left"), &progress, completion_into(&journal, "B"));
    pump(&mut controller, &mut events);
    engine.finish_current();
    pump(&mut controller, &mut events);

    assert_eq!(
        journal.entries(),
        vec![
            "interrupt In 500 feet, turn left -> Turn left".to_string(),
            "done A ok".to_string(),
            "done B ok".to_string(),
        ]
    );

    // Every claim is followed by a release.
    assert_eq!(session.activations(), 2);
    assert_eq!(session.deactivations(), 2);
    assert_eq!(controller.pending_completions(), 0);
}

#[test]
fn test_phonetic_road_names_reach_engine() {
    let (mut controller, engine, _session, mut events) = setup("fr-FR");
    let progress = RouteLegProgress {
        leg_index: 0,
        distance_remaining: 850.0,
        upcoming_step: Some(RouteStep {
            names: vec!["Rue de Rivoli".to_string()],
            phonetic_names: vec![Some("ʁy də ʁivɔli".to_string())],
        }),
    };

    controller.speak(
        SpokenInstruction::new("Tournez à droite sur Rue de Rivoli"),
        &progress,
        |_| {},
    );
    pump(&mut controller, &mut events);

    let submitted = engine.submitted();
    assert_eq!(submitted[0].voice.identifier, "fr-fr");
    match submitted[0].content {
        UtteranceContent::Attributed(ref text) => {
            assert_eq!(text.runs.len(), 2);
            assert_eq!(text.runs[1].pronunciation.as_deref(), Some("ʁy də ʁivɔli"));
        }
        ref other => panic!("expected attributed content, got {:?}", other),
    }
}

#[test]
fn test_unsupported_locale_completes_once_with_error() {
    let (mut controller, engine, session, _events) = setup("ko-KR");
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();

    controller.speak(SpokenInstruction::new("좌회전"), &RouteLegProgress::default(), move |err| {
        sink.lock().unwrap().push(err);
    });

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        Some(SpeechError::UnsupportedLocale { ref language_code }) if language_code == "ko-KR"
    ));
    assert!(engine.submitted().is_empty());
    assert!(session.calls().is_empty());
}

#[test]
fn test_cancel_with_failed_release_reports_unduck() {
    let (mut controller, _engine, session, mut events) = setup("en-US");
    let journal = Arc::new(Journal::default());
    controller.set_delegate(journal.clone());

    controller.speak(SpokenInstruction::new("Keep left"), &RouteLegProgress::default(), completion_into(&journal, "A"));
    pump(&mut controller, &mut events);
    session.fail_deactivation(Some("session busy"));
    controller.interrupt_speaking();
    pump(&mut controller, &mut events);

    let entries = journal.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].starts_with("fail unable to unduck audio"));
    assert!(entries[1].starts_with("done A unable to unduck audio"));
    assert_eq!(
        session.calls().last(),
        Some(&SessionCall::SetActive {
            active: false,
            notify_others: true
        })
    );
}

#[test]
fn test_legacy_session_uses_ambient_category() {
    let (mut controller, _engine, session, mut events) = setup("en-US");
    session.set_voice_prompt_supported(false);

    controller.speak(SpokenInstruction::new("Continue"), &RouteLegProgress::default(), |_| {});
    pump(&mut controller, &mut events);

    match session.calls().first() {
        Some(SessionCall::SetCategory(category)) => {
            assert_eq!(category.kind, guidance_voice::CategoryKind::Ambient);
            assert_eq!(category.mode, guidance_voice::SessionMode::SpokenAudio);
        }
        other => panic!("expected category call first, got {:?}", other),
    }
}

#[test]
fn test_audio_action_display() {
    assert_eq!(AudioAction::Duck.to_string(), "duck");
    assert_eq!(AudioAction::Unduck.to_string(), "unduck");
}

#[tokio::test]
async fn test_driver_with_interruptions() {
    let (mut controller, engine, session, mut events) = setup("en-US");
    let center = InterruptionCenter::new();
    controller.start_observing_interruptions(&center);

    let (done_tx, done_rx) = oneshot::channel();
    controller.speak(
        SpokenInstruction::new("Arrive at destination"),
        &RouteLegProgress::default(),
        move |err| {
            let _ = done_tx.send(err.is_none());
        },
    );

    center.post(AudioInterruption::Began);
    engine.finish_current();

    let spoken = tokio::time::timeout(Duration::from_secs(1), async {
        tokio::select! {
            _ = controller.run(&mut events) => None,
            done = done_rx => done.ok(),
        }
    })
    .await
    .expect("completion within a second");

    assert_eq!(spoken, Some(true));
    // Duck on start, release on interruption, release on finish.
    assert_eq!(session.activations(), 1);
    assert_eq!(session.deactivations(), 2);
}

#[test]
#[ignore] // Requires espeak-ng and an audio device
fn test_espeak_engine_speaks() {
    init_tracing();
    let config = VoiceConfig {
        locale: Some("en-US".to_string()),
        ..Default::default()
    };
    let (engine, mut events) = guidance_voice::CommandSpeechEngine::new(&config).expect("espeak-ng installed");
    let mut controller = VoiceController::new(engine, guidance_voice::NullAudioSession, &config);
    let (done_tx, done_rx) = std::sync::mpsc::channel();

    controller.speak(
        SpokenInstruction::new("In a quarter mile, turn right"),
        &RouteLegProgress::default(),
        move |err| {
            let _ = done_tx.send(err.is_none());
        },
    );

    while let Some(event) = events.blocking_recv() {
        controller.handle_event(event);
        if let Ok(ok) = done_rx.try_recv() {
            assert!(ok);
            return;
        }
    }
    panic!("engine closed before completion");
}
