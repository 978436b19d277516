//! Parlance - continuous voice interaction client
//!
//! This library provides the core functionality for the parlance client:
//! - Continuous microphone capture and fixed-cadence segmentation
//! - Segment dispatch with closed-set outcome classification
//! - Append-only conversation transcript and FIFO clip playback
//! - Streaming chat channel with bounded reconnection
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Session                          │
//! │  Capture ─► Segment ─► Dispatch ─► Outcome handlers  │
//! │                             │              │         │
//! │                        Transcript     Playback FIFO  │
//! └──────────────────────┬───────────────────────────────┘
//!                        │ REST (multipart) / WebSocket
//! ┌──────────────────────▼───────────────────────────────┐
//! │              Assistant server (opaque)               │
//! │     wake word │ speaker verify │ ASR │ LLM │ TTS     │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod channel;
pub mod client;
pub mod config;
pub mod enroll;
pub mod error;
pub mod session;
pub mod transcript;
pub mod voice;

pub use channel::{ChannelEvent, ChatChannel, ConnectionState};
pub use client::{AssistantClient, ProcessAudioReply, SegmentOutcome, SystemStatus, classify_reply};
pub use config::Config;
pub use enroll::{EnrollmentRecording, MIN_ENROLL_DURATION};
pub use error::{Error, Result};
pub use session::{
    Notice, NoticeKind, OutcomeEffects, Session, SessionSettings, SessionState, apply_outcome,
    encode_segment,
};
pub use transcript::{ConversationMessage, Role, Transcript};
