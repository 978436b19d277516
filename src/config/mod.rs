//! Configuration management for the parlance voice client
//!
//! Layered: built-in defaults ← optional TOML file ← CLI flags (with their
//! env-var fallbacks), applied on top by the binary.

pub mod file;

use std::time::Duration;

use crate::{Error, Result};

/// Default REST base URL (assistant server)
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Default WebSocket URL (streaming chat channel)
const DEFAULT_WS_URL: &str = "ws://127.0.0.1:5000/ws";

/// Default per-request timeout
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default segment cadence
const DEFAULT_SEGMENT_INTERVAL: Duration = Duration::from_millis(2000);

/// Segments below this size are discarded as near-silence
const DEFAULT_MIN_SEGMENT_BYTES: usize = 1000;

/// Default wake word phrase
const DEFAULT_WAKE_WORD: &str = "hey parlance";

/// Parlance client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Assistant server REST base URL
    pub base_url: String,

    /// Streaming chat channel WebSocket URL
    pub ws_url: String,

    /// Per-request timeout for dispatches
    pub request_timeout: Duration,

    /// Voice session configuration
    pub voice: VoiceConfig,

    /// Chat channel reconnect policy
    pub channel: ChannelConfig,
}

/// Voice capture/session configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// How often the capture buffer is drained into a segment
    pub segment_interval: Duration,

    /// Minimum encoded segment size worth dispatching
    pub min_segment_bytes: usize,

    /// Wake-word gating flag sent with each segment
    pub wake_word_enabled: bool,

    /// Wake word phrase sent with each segment
    pub wake_word_text: String,

    /// Speaker verification flag sent with each segment
    pub speaker_verification_enabled: bool,
}

/// Chat channel reconnect policy
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    /// Max automatic reconnect attempts after an unexpected close
    pub max_reconnect_attempts: u32,

    /// Fixed delay between reconnect attempts
    pub reconnect_delay: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            segment_interval: DEFAULT_SEGMENT_INTERVAL,
            min_segment_bytes: DEFAULT_MIN_SEGMENT_BYTES,
            wake_word_enabled: true,
            wake_word_text: DEFAULT_WAKE_WORD.to_string(),
            speaker_verification_enabled: false,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            voice: VoiceConfig::default(),
            channel: ChannelConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the config file. CLI flags (and
    /// their env-var fallbacks) are layered on top by the binary, which
    /// re-validates afterwards.
    ///
    /// # Errors
    ///
    /// Returns error if the resulting base URL is not a valid URL
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        config.apply_file(&file::load_config_file());
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from a parsed config file
    pub fn apply_file(&mut self, file: &file::ParlanceConfigFile) {
        if let Some(url) = &file.server.base_url {
            self.base_url.clone_from(url);
        }
        if let Some(url) = &file.server.ws_url {
            self.ws_url.clone_from(url);
        }
        if let Some(secs) = file.server.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = file.voice.segment_interval_ms {
            self.voice.segment_interval = Duration::from_millis(ms);
        }
        if let Some(bytes) = file.voice.min_segment_bytes {
            self.voice.min_segment_bytes = bytes;
        }
        if let Some(enabled) = file.voice.wake_word_enabled {
            self.voice.wake_word_enabled = enabled;
        }
        if let Some(text) = &file.voice.wake_word_text {
            self.voice.wake_word_text.clone_from(text);
        }
        if let Some(enabled) = file.voice.speaker_verification_enabled {
            self.voice.speaker_verification_enabled = enabled;
        }
        if let Some(attempts) = file.channel.max_reconnect_attempts {
            self.channel.max_reconnect_attempts = attempts;
        }
        if let Some(ms) = file.channel.reconnect_delay_ms {
            self.channel.reconnect_delay = Duration::from_millis(ms);
        }
    }

    /// Check that endpoint URLs are well-formed
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on an invalid URL
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {}: {e}", self.base_url)))?;
        url::Url::parse(&self.ws_url)
            .map_err(|e| Error::Config(format!("invalid WebSocket URL {}: {e}", self.ws_url)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.voice.min_segment_bytes, 1000);
        assert_eq!(config.channel.max_reconnect_attempts, 5);
        assert_eq!(config.channel.reconnect_delay, Duration::from_secs(3));
    }

    #[test]
    fn file_overlay_keeps_unset_fields() {
        let file: file::ParlanceConfigFile = toml::from_str(
            r#"
            [server]
            base_url = "http://10.1.1.1:5000"

            [voice]
            segment_interval_ms = 2500
            "#,
        )
        .unwrap();

        let mut config = Config::default();
        config.apply_file(&file);

        assert_eq!(config.base_url, "http://10.1.1.1:5000");
        assert_eq!(config.voice.segment_interval, Duration::from_millis(2500));
        // untouched by the file
        assert_eq!(config.ws_url, DEFAULT_WS_URL);
        assert!(config.voice.wake_word_enabled);
    }

    #[test]
    fn invalid_url_rejected() {
        let config = Config {
            base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
