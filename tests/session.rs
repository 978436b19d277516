//! Outcome handling tests
//!
//! Verify the side-effect table for the closed outcome set: exactly one
//! handler per segment, transcript appends before playback, wake-word
//! rejections silent.

use parlance::session::{NoticeKind, SessionSettings, SessionState, apply_outcome, encode_segment};
use parlance::transcript::Role;
use parlance::{SegmentOutcome, SystemStatus, Transcript};

const MIN_SEGMENT_BYTES: usize = 1000;

fn settings() -> SessionSettings {
    SessionSettings {
        wake_word_enabled: true,
        wake_word_text: "hey parlance".to_string(),
        speaker_verification_enabled: false,
        speaker_enrolled: false,
    }
}

#[test]
fn success_appends_user_then_assistant_then_queues_playback() {
    let mut state = SessionState::new(settings());

    let effects = apply_outcome(
        &mut state,
        SegmentOutcome::Success {
            user_text: Some("你好".to_string()),
            reply_text: Some("你好呀".to_string()),
            audio_url: Some("/a.mp3".to_string()),
        },
    );

    let messages = state.transcript.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].text, "你好");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].text, "你好呀");
    assert_eq!(messages[1].audio_ref.as_deref(), Some("/a.mp3"));

    assert_eq!(effects.play.as_deref(), Some("/a.mp3"));
    assert!(effects.notices.is_empty());
}

#[test]
fn success_without_reply_text_plays_nothing() {
    let mut state = SessionState::new(settings());

    let effects = apply_outcome(
        &mut state,
        SegmentOutcome::Success {
            user_text: Some("hello".to_string()),
            reply_text: None,
            audio_url: Some("/a.mp3".to_string()),
        },
    );

    assert_eq!(state.transcript.len(), 1);
    assert_eq!(state.transcript.messages()[0].role, Role::User);
    assert!(effects.play.is_none());
}

#[test]
fn wake_word_rejection_is_completely_silent() {
    let mut state = SessionState::new(settings());

    let effects = apply_outcome(&mut state, SegmentOutcome::WakeWordRejected);

    assert!(state.transcript.is_empty());
    assert!(effects.notices.is_empty());
    assert!(effects.play.is_none());
}

#[test]
fn speaker_rejection_appends_one_system_message_without_playback() {
    let mut state = SessionState::new(settings());

    let effects = apply_outcome(
        &mut state,
        SegmentOutcome::SpeakerRejected {
            reason: "voice mismatch".to_string(),
        },
    );

    assert_eq!(state.transcript.len(), 1);
    assert_eq!(state.transcript.messages()[0].role, Role::System);
    assert_eq!(state.transcript.messages()[0].text, "voice mismatch");
    assert!(effects.play.is_none());
}

#[test]
fn enrollment_required_appends_message_and_notifies_once() {
    let mut state = SessionState::new(settings());

    let first = apply_outcome(
        &mut state,
        SegmentOutcome::EnrollmentRequired {
            prompt: "please enroll".to_string(),
        },
    );
    let second = apply_outcome(
        &mut state,
        SegmentOutcome::EnrollmentRequired {
            prompt: "please enroll".to_string(),
        },
    );

    // Each rejected segment gets its transcript entry, but the notification
    // is one-shot
    assert_eq!(state.transcript.len(), 2);
    assert_eq!(first.notices.len(), 1);
    assert_eq!(first.notices[0].kind, NoticeKind::Info);
    assert!(second.notices.is_empty());
    assert!(first.play.is_none());
}

#[test]
fn server_error_with_text_appends_message_and_notice() {
    let mut state = SessionState::new(settings());

    let effects = apply_outcome(
        &mut state,
        SegmentOutcome::ServerError {
            message: Some("model crashed".to_string()),
        },
    );

    assert_eq!(state.transcript.len(), 1);
    assert_eq!(state.transcript.messages()[0].text, "model crashed");
    assert_eq!(effects.notices.len(), 1);
    assert_eq!(effects.notices[0].kind, NoticeKind::Error);
}

#[test]
fn server_error_without_text_only_notifies() {
    let mut state = SessionState::new(settings());

    let effects = apply_outcome(&mut state, SegmentOutcome::ServerError { message: None });

    assert!(state.transcript.is_empty());
    assert_eq!(effects.notices.len(), 1);
}

#[test]
fn transport_error_leaves_transcript_unchanged() {
    let mut state = SessionState::new(settings());
    state.transcript.push(Role::User, "earlier turn");

    let effects = apply_outcome(
        &mut state,
        SegmentOutcome::TransportError {
            reason: "connection reset".to_string(),
        },
    );

    assert_eq!(state.transcript.len(), 1);
    assert_eq!(effects.notices.len(), 1);
    assert_eq!(effects.notices[0].kind, NoticeKind::Error);
    // generic text, not the raw transport detail
    assert!(!effects.notices[0].text.contains("connection reset"));
    assert!(effects.play.is_none());
}

#[test]
fn wake_word_rejection_is_the_only_silent_outcome() {
    // wake_word_rejected never appends a message or notification; all other
    // outcomes append at least one of {message, notification}
    let outcomes = vec![
        SegmentOutcome::Success {
            user_text: Some("hi".to_string()),
            reply_text: Some("hello".to_string()),
            audio_url: None,
        },
        SegmentOutcome::WakeWordRejected,
        SegmentOutcome::SpeakerRejected {
            reason: "mismatch".to_string(),
        },
        SegmentOutcome::EnrollmentRequired {
            prompt: "enroll".to_string(),
        },
        SegmentOutcome::ServerError { message: None },
        SegmentOutcome::TransportError {
            reason: "timeout".to_string(),
        },
    ];

    for outcome in outcomes {
        let mut state = SessionState::new(settings());
        let silent = matches!(outcome, SegmentOutcome::WakeWordRejected);
        let effects = apply_outcome(&mut state, outcome);

        let visible = !state.transcript.is_empty() || !effects.notices.is_empty();
        assert_eq!(visible, !silent);
    }
}

#[test]
fn settings_built_from_status_snapshot() {
    let status: SystemStatus = serde_json::from_str(
        r#"{"status":"success","kws_enabled":false,"sv_enabled":true,
            "kws_text":"stand up","sv_enrolled":false,"models_loaded":true}"#,
    )
    .unwrap();

    let settings = SessionSettings::from_status(&status);
    assert!(!settings.wake_word_enabled);
    assert!(settings.speaker_verification_enabled);
    assert_eq!(settings.wake_word_text, "stand up");
    assert!(!settings.speaker_enrolled);
}

#[test]
fn undersized_segment_is_never_dispatched() {
    // 44-byte WAV header plus 2 bytes per sample: 100 samples encode well
    // below the minimum, so the tick produces no request at all
    let samples = vec![0.1f32; 100];
    assert!(encode_segment(&samples, MIN_SEGMENT_BYTES).is_none());
}

#[test]
fn empty_buffer_produces_no_segment() {
    assert!(encode_segment(&[], 0).is_none());
}

#[test]
fn adequate_buffer_encodes_one_wav_segment() {
    let samples = vec![0.1f32; 1000];
    let segment = encode_segment(&samples, MIN_SEGMENT_BYTES).unwrap();

    assert!(segment.len() >= MIN_SEGMENT_BYTES);
    assert_eq!(&segment[0..4], b"RIFF");
}

#[test]
fn threshold_is_on_encoded_bytes_not_sample_count() {
    // 500 samples encode to 1044 bytes, clearing a 1000-byte minimum even
    // though the sample count alone sits below it
    let samples = vec![0.1f32; 500];
    assert!(encode_segment(&samples, MIN_SEGMENT_BYTES).is_some());
    assert!(encode_segment(&samples, 2000).is_none());
}

#[test]
fn clearing_twice_matches_clearing_once() {
    let mut once = Transcript::new();
    once.push(Role::User, "hello");
    once.clear();

    let mut twice = Transcript::new();
    twice.push(Role::User, "hello");
    twice.clear();
    twice.clear();

    assert!(once.is_empty());
    assert!(twice.is_empty());
    assert_eq!(once.len(), twice.len());
}
