//! Audio capture and playback
//!
//! Capture feeds the session's segmentation loop; playback drains a FIFO
//! queue of clips returned by the server.

mod capture;
mod playback;

pub use capture::{AudioCapture, MAX_BUFFER_SECS, SAMPLE_RATE, samples_to_wav};
pub use playback::{AudioPlayback, DecodedClip, PlaybackQueue, decode_clip};
