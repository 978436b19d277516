//! REST client for the assistant server
//!
//! One multipart POST per capture segment, plus the enrollment, keyword,
//! status, and history endpoints. The segment dispatcher classifies every
//! reply into a closed set of outcomes and never propagates an error past
//! the segment boundary.

use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Categorical result of dispatching one capture segment
///
/// Closed set: every dispatched segment produces exactly one of these, and
/// all transport or parse failures collapse into `TransportError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Utterance recognized and answered
    Success {
        /// Transcription of the user's utterance
        user_text: Option<String>,
        /// Assistant reply text
        reply_text: Option<String>,
        /// Locator of a playable reply clip
        audio_url: Option<String>,
    },
    /// Speech did not contain the configured wake word; silently ignored
    WakeWordRejected,
    /// Voice did not match the enrolled profile
    SpeakerRejected {
        /// Server-supplied rejection reason
        reason: String,
    },
    /// Speaker verification enabled but no profile enrolled
    EnrollmentRequired {
        /// Server-supplied enrollment prompt
        prompt: String,
    },
    /// Structured failure returned by the server
    ServerError {
        /// Explanatory text, when the server supplied any
        message: Option<String>,
    },
    /// Request failed before a structured reply was received
    TransportError {
        /// Underlying failure description (logged, not shown verbatim)
        reason: String,
    },
}

/// Wire reply from `POST /process_audio`
#[derive(Debug, Deserialize)]
pub struct ProcessAudioReply {
    /// Status code string (closed set, unknown values rejected)
    pub status: String,
    /// Reply or error text
    #[serde(default)]
    pub message: Option<String>,
    /// Transcription of the user's utterance
    #[serde(default)]
    pub user_message: Option<String>,
    /// Locator of a playable reply clip
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// Wire reply from `GET /system_status`
#[derive(Debug, Clone, Deserialize)]
#[allow(clippy::struct_excessive_bools)] // mirrors the server payload
pub struct SystemStatus {
    /// "success" or "error"
    pub status: String,
    /// Wake-word gating enabled on the server
    #[serde(default)]
    pub kws_enabled: bool,
    /// Speaker verification enabled on the server
    #[serde(default)]
    pub sv_enabled: bool,
    /// Configured wake word phrase
    #[serde(default)]
    pub kws_text: String,
    /// A speaker profile is enrolled
    #[serde(default)]
    pub sv_enrolled: bool,
    /// Server models finished loading
    #[serde(default)]
    pub models_loaded: bool,
    /// Error text when status != success
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusReply {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnrollmentReply {
    status: String,
    #[serde(default)]
    enrolled: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeywordReply {
    status: String,
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Thin REST wrapper around the assistant server
pub struct AssistantClient {
    http: reqwest::Client,
    base_url: String,
}

impl AssistantClient {
    /// Create a client for the given base URL with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is invalid or the HTTP client cannot
    /// be built
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        url::Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {base_url}: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a server-relative locator (e.g. an `audio_url`) to absolute
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Dispatch one capture segment and classify the reply
    ///
    /// Never fails: transport and parse failures collapse into
    /// `SegmentOutcome::TransportError`.
    pub async fn process_audio(
        &self,
        segment: Vec<u8>,
        kws_enabled: bool,
        sv_enabled: bool,
        kws_text: &str,
    ) -> SegmentOutcome {
        let size = segment.len();

        let part = match reqwest::multipart::Part::bytes(segment)
            .file_name("segment.wav")
            .mime_str("audio/wav")
        {
            Ok(part) => part,
            Err(e) => {
                return SegmentOutcome::TransportError {
                    reason: e.to_string(),
                };
            }
        };

        let form = reqwest::multipart::Form::new()
            .part("audio", part)
            .text("kws_enabled", if kws_enabled { "1" } else { "0" })
            .text("sv_enabled", if sv_enabled { "1" } else { "0" })
            .text("kws_text", kws_text.to_string());

        tracing::debug!(bytes = size, "dispatching segment");

        let response = match self
            .http
            .post(format!("{}/process_audio", self.base_url))
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "segment dispatch failed");
                return SegmentOutcome::TransportError {
                    reason: e.to_string(),
                };
            }
        };

        match response.json::<ProcessAudioReply>().await {
            Ok(reply) => classify_reply(reply),
            Err(e) => {
                tracing::warn!(error = %e, "malformed reply");
                SegmentOutcome::TransportError {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Fetch the server status snapshot consumed at session start
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status
    pub async fn system_status(&self) -> Result<SystemStatus> {
        let status: SystemStatus = self
            .http
            .get(format!("{}/system_status", self.base_url))
            .send()
            .await?
            .json()
            .await?;

        if status.status != "success" {
            return Err(Error::Server(
                status
                    .message
                    .unwrap_or_else(|| "system status check failed".to_string()),
            ));
        }

        Ok(status)
    }

    /// Check whether a speaker profile is enrolled
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status
    pub async fn check_enrollment(&self) -> Result<bool> {
        let reply: EnrollmentReply = self
            .http
            .get(format!("{}/check_enrollment", self.base_url))
            .send()
            .await?
            .json()
            .await?;

        if reply.status != "success" {
            return Err(Error::Server(
                reply
                    .message
                    .unwrap_or_else(|| "enrollment check failed".to_string()),
            ));
        }

        Ok(reply.enrolled)
    }

    /// Submit an enrollment clip
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a structured server failure
    pub async fn enroll_speaker(&self, clip: Vec<u8>) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(clip)
            .file_name("enroll.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Transport(e.to_string()))?;

        let form = reqwest::multipart::Form::new().part("audio", part);

        let reply: StatusReply = self
            .http
            .post(format!("{}/enroll_speaker", self.base_url))
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;

        if reply.status != "success" {
            return Err(Error::Server(
                reply
                    .message
                    .unwrap_or_else(|| "enrollment failed".to_string()),
            ));
        }

        tracing::info!("speaker enrolled");
        Ok(())
    }

    /// Update the wake word; returns the server-confirmed phrase
    ///
    /// Empty input is rejected client-side before any network call.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an empty keyword, or a transport or
    /// server error from the request
    pub async fn update_keyword(&self, keyword: &str) -> Result<String> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(Error::Validation("wake word must not be empty".to_string()));
        }

        let form = reqwest::multipart::Form::new().text("keyword", keyword.to_string());

        let reply: KeywordReply = self
            .http
            .post(format!("{}/update_keyword", self.base_url))
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;

        if reply.status != "success" {
            return Err(Error::Server(
                reply
                    .message
                    .unwrap_or_else(|| "keyword update failed".to_string()),
            ));
        }

        let confirmed = reply.keyword.unwrap_or_else(|| keyword.to_string());
        tracing::info!(keyword = %confirmed, "wake word updated");
        Ok(confirmed)
    }

    /// Ask the server to forget session history
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a structured server failure
    pub async fn clear_history(&self) -> Result<()> {
        let reply: StatusReply = self
            .http
            .post(format!("{}/clear_history", self.base_url))
            .send()
            .await?
            .json()
            .await?;

        if reply.status != "success" {
            return Err(Error::Server(
                reply
                    .message
                    .unwrap_or_else(|| "history clear failed".to_string()),
            ));
        }

        Ok(())
    }
}

/// Map a structured reply onto the closed outcome set
///
/// Unrecognized status strings are rejected explicitly as `ServerError`
/// rather than falling through a default branch.
#[must_use]
pub fn classify_reply(reply: ProcessAudioReply) -> SegmentOutcome {
    match reply.status.as_str() {
        "success" => SegmentOutcome::Success {
            user_text: reply.user_message,
            reply_text: reply.message,
            audio_url: reply.audio_url,
        },
        "kws_failed" => SegmentOutcome::WakeWordRejected,
        "sv_failed" => SegmentOutcome::SpeakerRejected {
            reason: reply
                .message
                .unwrap_or_else(|| "voice did not match the enrolled profile".to_string()),
        },
        "sv_enroll_required" => SegmentOutcome::EnrollmentRequired {
            prompt: reply
                .message
                .unwrap_or_else(|| "speaker verification requires enrollment".to_string()),
        },
        "error" => SegmentOutcome::ServerError {
            message: reply.message,
        },
        other => SegmentOutcome::ServerError {
            message: Some(format!("unrecognized status \"{other}\"")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(status: &str) -> ProcessAudioReply {
        ProcessAudioReply {
            status: status.to_string(),
            message: None,
            user_message: None,
            audio_url: None,
        }
    }

    #[test]
    fn success_carries_all_fields() {
        let outcome = classify_reply(ProcessAudioReply {
            status: "success".to_string(),
            message: Some("你好呀".to_string()),
            user_message: Some("你好".to_string()),
            audio_url: Some("/a.mp3".to_string()),
        });

        assert_eq!(
            outcome,
            SegmentOutcome::Success {
                user_text: Some("你好".to_string()),
                reply_text: Some("你好呀".to_string()),
                audio_url: Some("/a.mp3".to_string()),
            }
        );
    }

    #[test]
    fn wake_word_rejection_is_silent_variant() {
        assert_eq!(
            classify_reply(reply("kws_failed")),
            SegmentOutcome::WakeWordRejected
        );
    }

    #[test]
    fn rejection_variants_default_their_text() {
        assert!(matches!(
            classify_reply(reply("sv_failed")),
            SegmentOutcome::SpeakerRejected { .. }
        ));
        assert!(matches!(
            classify_reply(reply("sv_enroll_required")),
            SegmentOutcome::EnrollmentRequired { .. }
        ));
    }

    #[test]
    fn unknown_status_rejected_explicitly() {
        let outcome = classify_reply(reply("bogus_status"));
        match outcome {
            SegmentOutcome::ServerError { message } => {
                assert!(message.unwrap().contains("bogus_status"));
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
    }

    #[test]
    fn absolute_url_resolution() {
        let client =
            AssistantClient::new("http://127.0.0.1:5000", Duration::from_secs(30)).unwrap();

        assert_eq!(
            client.absolute_url("/a.mp3"),
            "http://127.0.0.1:5000/a.mp3"
        );
        assert_eq!(
            client.absolute_url("http://other/a.mp3"),
            "http://other/a.mp3"
        );
        assert_eq!(client.absolute_url("a.mp3"), "http://127.0.0.1:5000/a.mp3");
    }

    #[test]
    fn invalid_base_url_rejected() {
        let result = AssistantClient::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
