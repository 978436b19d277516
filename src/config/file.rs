//! TOML configuration file loading
//!
//! Supports `~/.config/parlance/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ParlanceConfigFile {
    /// Server endpoints
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Voice capture and session configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Streaming chat channel configuration
    #[serde(default)]
    pub channel: ChannelFileConfig,
}

/// Server endpoint configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// REST base URL (e.g. "http://192.168.1.10:5000")
    pub base_url: Option<String>,

    /// WebSocket URL for the chat channel (e.g. "ws://192.168.1.10:5000/ws")
    pub ws_url: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Voice capture/session configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Segment cadence in milliseconds (2000-2500 typical)
    pub segment_interval_ms: Option<u64>,

    /// Segments smaller than this many bytes are discarded without dispatch
    pub min_segment_bytes: Option<usize>,

    /// Enable wake-word gating on the server
    pub wake_word_enabled: Option<bool>,

    /// Wake word phrase sent with each segment
    pub wake_word_text: Option<String>,

    /// Enable speaker verification on the server
    pub speaker_verification_enabled: Option<bool>,
}

/// Chat channel configuration
#[derive(Debug, Default, Deserialize)]
pub struct ChannelFileConfig {
    /// Max automatic reconnect attempts after an unexpected close
    pub max_reconnect_attempts: Option<u32>,

    /// Delay between reconnect attempts, in milliseconds
    pub reconnect_delay_ms: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ParlanceConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
#[must_use]
pub fn load_config_file() -> ParlanceConfigFile {
    let Some(path) = config_file_path() else {
        return ParlanceConfigFile::default();
    };

    if !path.exists() {
        return ParlanceConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config_file(&content, &path),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ParlanceConfigFile::default()
        }
    }
}

fn parse_config_file(content: &str, path: &std::path::Path) -> ParlanceConfigFile {
    match toml::from_str(content) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config file, using defaults"
            );
            ParlanceConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/parlance/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parlance").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_leaves_missing_fields_none() {
        let file: ParlanceConfigFile = toml::from_str(
            r#"
            [server]
            base_url = "http://10.0.0.2:5000"

            [voice]
            wake_word_text = "hello there"
            "#,
        )
        .unwrap();

        assert_eq!(file.server.base_url.as_deref(), Some("http://10.0.0.2:5000"));
        assert!(file.server.ws_url.is_none());
        assert_eq!(file.voice.wake_word_text.as_deref(), Some("hello there"));
        assert!(file.voice.segment_interval_ms.is_none());
        assert!(file.channel.max_reconnect_attempts.is_none());
    }

    #[test]
    fn empty_file_parses_to_defaults() {
        let file: ParlanceConfigFile = toml::from_str("").unwrap();
        assert!(file.server.base_url.is_none());
        assert!(file.voice.wake_word_enabled.is_none());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let parsed = parse_config_file("not [valid toml", std::path::Path::new("test.toml"));
        assert!(parsed.server.base_url.is_none());
    }
}
