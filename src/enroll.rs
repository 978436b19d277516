//! Speaker enrollment sub-flow
//!
//! A dedicated, non-segmented recording gated on a minimum duration: clips
//! shorter than three seconds are never submitted, the user is re-prompted
//! instead.

use std::time::{Duration, Instant};

use crate::client::AssistantClient;
use crate::voice::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use crate::{Error, Result};

/// Minimum elapsed recording time before an enrollment clip may be submitted
pub const MIN_ENROLL_DURATION: Duration = Duration::from_secs(3);

/// Whether an elapsed recording time clears the submission gate
#[must_use]
pub fn meets_minimum_duration(elapsed: Duration) -> bool {
    elapsed >= MIN_ENROLL_DURATION
}

/// An in-progress enrollment recording
///
/// The microphone is released when the recording is finished or dropped.
pub struct EnrollmentRecording {
    capture: AudioCapture,
    started: Instant,
}

impl EnrollmentRecording {
    /// Open the microphone and start recording
    ///
    /// # Errors
    ///
    /// Returns `Error::PermissionDenied` if the microphone is unavailable
    pub fn begin() -> Result<Self> {
        let mut capture = AudioCapture::open()?;
        capture.clear_buffer();
        capture.start()?;

        tracing::debug!("enrollment recording started");
        Ok(Self {
            capture,
            started: Instant::now(),
        })
    }

    /// Wall-clock time recorded so far
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop recording and return the clip as WAV bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::EnrollmentTooShort` when stopped before the minimum
    /// duration; the microphone is released either way
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.capture.stop();

        let elapsed = self.elapsed();
        if !meets_minimum_duration(elapsed) {
            return Err(Error::EnrollmentTooShort {
                elapsed_secs: elapsed.as_secs(),
                min_secs: MIN_ENROLL_DURATION.as_secs(),
            });
        }

        let samples = self.capture.take_buffer();
        samples_to_wav(&samples, SAMPLE_RATE)
    }
}

/// Interactive enrollment loop for the CLI
///
/// Re-prompts on a too-short recording, offers a retry on server failure,
/// and submits at most one POST per completed recording.
///
/// # Errors
///
/// Returns error if the user cancels, the microphone is unavailable, or the
/// final retry is declined
pub async fn run_interactive(client: &AssistantClient) -> Result<()> {
    println!(
        "Speak into your microphone for at least {} seconds.",
        MIN_ENROLL_DURATION.as_secs()
    );

    loop {
        if !confirm("Start recording?")? {
            return Err(Error::Validation("enrollment cancelled".to_string()));
        }

        let recording = EnrollmentRecording::begin()?;
        println!("Recording... press Enter to stop.");
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);

        let clip = match recording.finish() {
            Ok(clip) => clip,
            Err(e @ Error::EnrollmentTooShort { .. }) => {
                println!("{e}; please record again.");
                continue;
            }
            Err(e) => return Err(e),
        };

        println!("Submitting enrollment clip...");
        match client.enroll_speaker(clip).await {
            Ok(()) => {
                println!("Speaker enrolled.");
                return Ok(());
            }
            Err(e) => {
                eprintln!("Enrollment failed: {e}");
                if !confirm("Retry?")? {
                    return Err(e);
                }
            }
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .map_err(|e| Error::Io(std::io::Error::other(e)))
}
