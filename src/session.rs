//! Continuous voice interaction session
//!
//! Drives the capture → segment → dispatch → outcome → playback loop.
//! Segments are dispatched strictly one at a time: the tick that dispatches
//! awaits the reply, and audio captured meanwhile accumulates in the capture
//! buffer until the next drain coalesces it into one segment.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::client::{AssistantClient, SegmentOutcome, SystemStatus};
use crate::config::Config;
use crate::transcript::{Role, Transcript};
use crate::voice::{AudioCapture, PlaybackQueue, SAMPLE_RATE, samples_to_wav};
use crate::Result;

/// User-adjustable session configuration
///
/// `speaker_enrolled` mirrors the server and is not locally authoritative:
/// with verification enabled and no profile enrolled, every segment
/// classifies as enrollment-required until enrollment succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Wake-word gating enabled
    pub wake_word_enabled: bool,
    /// Wake word phrase sent with each segment
    pub wake_word_text: String,
    /// Speaker verification enabled
    pub speaker_verification_enabled: bool,
    /// A speaker profile is enrolled on the server
    pub speaker_enrolled: bool,
}

impl SessionSettings {
    /// Build settings from a server status snapshot
    #[must_use]
    pub fn from_status(status: &SystemStatus) -> Self {
        Self {
            wake_word_enabled: status.kws_enabled,
            wake_word_text: status.kws_text.clone(),
            speaker_verification_enabled: status.sv_enabled,
            speaker_enrolled: status.sv_enrolled,
        }
    }
}

/// Severity of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Informational, dismissible
    Info,
    /// Error, dismissible
    Error,
}

/// A single dismissible notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub kind: NoticeKind,
    /// Notification text
    pub text: String,
}

impl Notice {
    fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

/// Session-scoped conversational state
///
/// Owned by the session that drives it; lifecycle is tied to session start
/// and end rather than process lifetime.
#[derive(Debug)]
pub struct SessionState {
    /// Current settings
    pub settings: SessionSettings,
    /// Append-only conversation log
    pub transcript: Transcript,
    enrollment_notified: bool,
}

impl SessionState {
    /// Create state with the given initial settings
    #[must_use]
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            transcript: Transcript::new(),
            enrollment_notified: false,
        }
    }
}

/// Side effects produced by handling one classified outcome
#[derive(Debug, Default)]
pub struct OutcomeEffects {
    /// Notifications to surface
    pub notices: Vec<Notice>,
    /// Clip URL to enqueue for playback, after any transcript appends
    pub play: Option<String>,
}

/// Run exactly one outcome handler for a dispatched segment
///
/// Transcript appends happen here, before the caller enqueues any playback,
/// so transcript and audio always reflect the same turn. Wake-word rejection
/// is deliberately silent; every other outcome yields at least one of
/// {message, notification}.
pub fn apply_outcome(state: &mut SessionState, outcome: SegmentOutcome) -> OutcomeEffects {
    let mut effects = OutcomeEffects::default();

    match outcome {
        SegmentOutcome::Success {
            user_text,
            reply_text,
            audio_url,
        } => {
            if let Some(text) = user_text {
                state.transcript.push(Role::User, text);
            }
            if let Some(text) = reply_text {
                state
                    .transcript
                    .push_with_audio(Role::Assistant, text, audio_url.clone());
                effects.play = audio_url;
            }
        }
        SegmentOutcome::WakeWordRejected => {
            tracing::debug!("wake word not detected, segment ignored");
        }
        SegmentOutcome::SpeakerRejected { reason } => {
            state.transcript.push(Role::System, reason);
        }
        SegmentOutcome::EnrollmentRequired { prompt } => {
            state.transcript.push(Role::System, prompt.clone());
            if !state.enrollment_notified {
                state.enrollment_notified = true;
                effects.notices.push(Notice::info(prompt));
            }
        }
        SegmentOutcome::ServerError { message } => {
            if let Some(text) = &message {
                state.transcript.push(Role::System, text.clone());
            }
            effects.notices.push(Notice::error(
                message.unwrap_or_else(|| "audio processing failed".to_string()),
            ));
        }
        SegmentOutcome::TransportError { reason } => {
            tracing::debug!(reason, "segment dispatch failed");
            effects
                .notices
                .push(Notice::error("could not reach the assistant server"));
        }
    }

    effects
}

/// A live continuous voice session
pub struct Session {
    client: AssistantClient,
    capture: AudioCapture,
    playback: PlaybackQueue,
    /// Conversational state, readable by the embedding UI
    pub state: SessionState,
    segment_interval: Duration,
    min_segment_bytes: usize,
    printed: usize,
    running: bool,
}

impl Session {
    /// Open the microphone, build the REST client, and bootstrap settings
    /// from the server status snapshot
    ///
    /// # Errors
    ///
    /// Returns `Error::PermissionDenied` if the microphone is unavailable,
    /// or a config error for a bad server URL. A failed status check is not
    /// fatal: the session starts with local defaults and a warning.
    pub async fn start(config: &Config) -> Result<Self> {
        let client = AssistantClient::new(&config.base_url, config.request_timeout)?;
        let capture = AudioCapture::open()?;
        let playback = PlaybackQueue::spawn();

        let initial = SessionSettings {
            wake_word_enabled: config.voice.wake_word_enabled,
            wake_word_text: config.voice.wake_word_text.clone(),
            speaker_verification_enabled: config.voice.speaker_verification_enabled,
            speaker_enrolled: false,
        };
        let mut state = SessionState::new(initial);

        bootstrap(&client, &mut state).await;

        Ok(Self {
            client,
            capture,
            playback,
            state,
            segment_interval: config.voice.segment_interval,
            min_segment_bytes: config.voice.min_segment_bytes,
            printed: 0,
            running: false,
        })
    }

    /// Run the capture loop until the shutdown channel fires
    ///
    /// # Errors
    ///
    /// Returns `Error::PermissionDenied` if capture cannot start; no loop
    /// iteration runs in that case. Per-segment errors never escape the
    /// loop.
    pub async fn run(&mut self, shutdown: &mut mpsc::Receiver<()>) -> Result<()> {
        self.capture.start()?;
        self.running = true;

        tracing::info!(
            interval_ms = self.segment_interval.as_millis(),
            wake_word = %self.state.settings.wake_word_text,
            "listening"
        );

        let mut interval = tokio::time::interval(self.segment_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the immediate first tick so the first segment spans a full interval
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                _ = interval.tick() => {
                    let samples = self.capture.take_buffer();
                    self.dispatch_samples(samples).await;
                }
            }
        }

        self.stop().await;
        Ok(())
    }

    /// Stop the session: flush a final segment, then release the microphone
    ///
    /// Idempotent: a second call is a no-op and the microphone is released
    /// exactly once.
    pub async fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        // Halt production before the final drain so nothing accumulates
        // behind it
        self.capture.stop();
        let tail = self.capture.take_buffer();
        self.dispatch_samples(tail).await;

        tracing::info!("session stopped");
    }

    /// Clear the conversation locally and ask the server to forget history
    ///
    /// The local transcript is cleared regardless of the server reply, so
    /// repeated calls converge on the same empty state.
    pub async fn clear_conversation(&mut self) {
        self.state.transcript.clear();
        self.printed = 0;

        if let Err(e) = self.client.clear_history().await {
            tracing::warn!(error = %e, "server history clear failed");
        }
    }

    /// Update the wake word, keeping local settings in sync with the server
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an empty phrase (no network call) or
    /// the transport/server error from the request
    pub async fn update_wake_word(&mut self, keyword: &str) -> Result<()> {
        let confirmed = self.client.update_keyword(keyword).await?;
        self.state.settings.wake_word_text.clone_from(&confirmed);
        self.state
            .transcript
            .push(Role::System, format!("wake word updated to \"{confirmed}\""));
        self.flush_output(OutcomeEffects::default());
        Ok(())
    }

    /// Encode and dispatch one drained buffer as a segment
    ///
    /// Undersized segments are discarded with no dispatch and no state
    /// change. The await here is what bounds the session to one in-flight
    /// dispatch.
    async fn dispatch_samples(&mut self, samples: Vec<f32>) {
        let Some(segment) = encode_segment(&samples, self.min_segment_bytes) else {
            return;
        };

        let settings = &self.state.settings;
        let outcome = self
            .client
            .process_audio(
                segment,
                settings.wake_word_enabled,
                settings.speaker_verification_enabled,
                &settings.wake_word_text,
            )
            .await;

        let effects = apply_outcome(&mut self.state, outcome);
        self.flush_output(effects);
    }

    /// Print new transcript entries, surface notices, then enqueue playback
    fn flush_output(&mut self, effects: OutcomeEffects) {
        for message in &self.state.transcript.messages()[self.printed..] {
            println!("[{}] {}", message.role, message.text);
        }
        self.printed = self.state.transcript.len();

        for notice in &effects.notices {
            match notice.kind {
                NoticeKind::Info => tracing::info!("{}", notice.text),
                NoticeKind::Error => tracing::error!("{}", notice.text),
            }
        }

        if let Some(url) = effects.play {
            self.playback.enqueue(self.client.absolute_url(&url));
        }
    }
}

/// Encode a drained capture buffer into a dispatchable segment
///
/// Returns `None` when there is nothing worth dispatching: an empty buffer,
/// an encoding failure, or an encoded segment below `min_bytes`. A `None`
/// means no request and no state change for that tick.
#[must_use]
pub fn encode_segment(samples: &[f32], min_bytes: usize) -> Option<Vec<u8>> {
    if samples.is_empty() {
        return None;
    }

    let segment = match samples_to_wav(samples, SAMPLE_RATE) {
        Ok(segment) => segment,
        Err(e) => {
            tracing::warn!(error = %e, "segment encoding failed");
            return None;
        }
    };

    if segment.len() < min_bytes {
        tracing::trace!(bytes = segment.len(), "segment below minimum size, discarded");
        return None;
    }

    Some(segment)
}

/// Populate settings from `/system_status` and `/check_enrollment`
///
/// Failures degrade to local defaults with a warning; the session still
/// starts so the user can retry once the server is reachable.
async fn bootstrap(client: &AssistantClient, state: &mut SessionState) {
    match client.system_status().await {
        Ok(status) => {
            if !status.models_loaded {
                tracing::warn!("server models still loading, replies may be delayed");
            }
            state.settings = SessionSettings::from_status(&status);
        }
        Err(e) => {
            tracing::warn!(error = %e, "status check failed, using local defaults");
        }
    }

    match client.check_enrollment().await {
        Ok(enrolled) => state.settings.speaker_enrolled = enrolled,
        Err(e) => tracing::debug!(error = %e, "enrollment check failed"),
    }
}
