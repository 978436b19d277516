use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parlance::voice::{AudioCapture, AudioPlayback, DecodedClip};
use parlance::{AssistantClient, ChatChannel, Config, Session};

/// Parlance - continuous voice interaction client
#[derive(Parser)]
#[command(name = "parlance", version, about)]
struct Cli {
    /// Assistant server base URL
    #[arg(long, env = "PARLANCE_SERVER_URL")]
    server: Option<String>,

    /// Chat channel WebSocket URL
    #[arg(long, env = "PARLANCE_WS_URL")]
    ws_url: Option<String>,

    /// Wake word phrase sent with each segment
    #[arg(long, env = "PARLANCE_WAKE_WORD")]
    wake_word: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the server status snapshot
    Status,
    /// Record and submit a speaker enrollment clip
    Enroll,
    /// Update the wake word phrase
    SetKeyword {
        /// New wake word (must be non-empty)
        keyword: String,
    },
    /// Ask the server to forget conversation history
    ClearHistory,
    /// Text chat over the streaming WebSocket channel
    Chat,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parlance=info",
        1 => "info,parlance=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(server) = cli.server {
        config.base_url = server;
    }
    if let Some(ws_url) = cli.ws_url {
        config.ws_url = ws_url;
    }
    if let Some(wake_word) = cli.wake_word {
        config.voice.wake_word_text = wake_word;
    }
    config.validate()?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Status => cmd_status(&config).await,
            Command::Enroll => cmd_enroll(&config).await,
            Command::SetKeyword { keyword } => cmd_set_keyword(&config, &keyword).await,
            Command::ClearHistory => cmd_clear_history(&config).await,
            Command::Chat => cmd_chat(&config).await,
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
        };
    }

    run_session(&config).await
}

/// Run the continuous voice session until Ctrl-C
#[allow(clippy::future_not_send)]
async fn run_session(config: &Config) -> anyhow::Result<()> {
    tracing::info!(server = %config.base_url, "starting voice session");

    let mut session = Session::start(config).await?;

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    println!("Listening. Press Ctrl-C to stop.");
    session.run(&mut shutdown_rx).await?;

    Ok(())
}

/// Print the server status snapshot
async fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let client = AssistantClient::new(&config.base_url, config.request_timeout)?;

    let status = client.system_status().await?;
    println!("Server:               {}", config.base_url);
    println!("Models loaded:        {}", status.models_loaded);
    println!("Wake word enabled:    {}", status.kws_enabled);
    println!("Wake word:            {}", status.kws_text);
    println!("Speaker verification: {}", status.sv_enabled);

    let enrolled = client.check_enrollment().await.unwrap_or(status.sv_enrolled);
    println!("Speaker enrolled:     {enrolled}");

    Ok(())
}

/// Record and submit a speaker enrollment clip
async fn cmd_enroll(config: &Config) -> anyhow::Result<()> {
    let client = AssistantClient::new(&config.base_url, config.request_timeout)?;
    parlance::enroll::run_interactive(&client).await?;
    Ok(())
}

/// Update the wake word phrase
async fn cmd_set_keyword(config: &Config, keyword: &str) -> anyhow::Result<()> {
    let client = AssistantClient::new(&config.base_url, config.request_timeout)?;
    let confirmed = client.update_keyword(keyword).await?;
    println!("Wake word updated to \"{confirmed}\"");
    Ok(())
}

/// Ask the server to forget conversation history
async fn cmd_clear_history(config: &Config) -> anyhow::Result<()> {
    let client = AssistantClient::new(&config.base_url, config.request_timeout)?;
    client.clear_history().await?;
    println!("Conversation history cleared");
    Ok(())
}

/// Text chat over the streaming WebSocket channel
async fn cmd_chat(config: &Config) -> anyhow::Result<()> {
    use tokio::io::AsyncBufReadExt;

    let mut channel = ChatChannel::new(config.ws_url.clone(), config.channel);
    channel.connect().await?;

    println!("Connected to {}. Type a message, Ctrl-C to quit.", config.ws_url);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            event = channel.recv() => {
                match event {
                    Some(parlance::ChannelEvent::Connected) => {
                        println!("[server] connected");
                    }
                    Some(parlance::ChannelEvent::AsrResult { text }) => {
                        println!("[you] {text}");
                    }
                    Some(parlance::ChannelEvent::LlmResponse { text, audio_url }) => {
                        println!("[assistant] {text}");
                        if let Some(url) = audio_url {
                            tracing::debug!(url, "reply clip available");
                        }
                    }
                    Some(parlance::ChannelEvent::Error { message }) => {
                        eprintln!("[error] {message}");
                    }
                    None => {
                        eprintln!("channel disconnected");
                        break;
                    }
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(text) if !text.trim().is_empty() => {
                        if !channel.send_text(text.trim()).await {
                            eprintln!("not connected, message dropped");
                        }
                    }
                    Some(_) => {}
                    None => {
                        channel.disconnect().await;
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Test microphone input with a per-second level readout
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    let mut capture = AudioCapture::open()?;
    capture.start()?;

    println!(
        "Capturing at {} Hz for {duration} seconds; say something.",
        capture.sample_rate()
    );

    for second in 1..=duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let rms = level_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bar = "#".repeat((rms * 100.0).min(40.0) as usize);
        println!("[{second:2}s] rms {rms:.4}  peak {peak:.4}  {bar}");
    }

    capture.stop();
    println!("A moving bar means the microphone works.");

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn level_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a short tone
fn test_speaker() -> anyhow::Result<()> {
    const TONE_HZ: f32 = 440.0;
    const TONE_RATE: u32 = 24000;
    const TONE_SECS: usize = 2;

    println!("Playing a {TONE_SECS}s {TONE_HZ} Hz tone...");

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..TONE_RATE as usize * TONE_SECS)
        .map(|i| {
            let t = i as f32 / TONE_RATE as f32;
            (2.0 * std::f32::consts::PI * TONE_HZ * t).sin() * 0.3
        })
        .collect();

    let playback = AudioPlayback::new()?;
    playback.play(&DecodedClip {
        samples,
        sample_rate: TONE_RATE,
    })?;

    println!("If you heard the tone, output works.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_parse_from_flags() {
        let cli = Cli::try_parse_from([
            "parlance",
            "--server",
            "http://10.0.0.9:5000",
            "--ws-url",
            "ws://10.0.0.9:5000/ws",
            "--wake-word",
            "stand up",
        ])
        .unwrap();

        assert_eq!(cli.server.as_deref(), Some("http://10.0.0.9:5000"));
        assert_eq!(cli.ws_url.as_deref(), Some("ws://10.0.0.9:5000/ws"));
        assert_eq!(cli.wake_word.as_deref(), Some("stand up"));
    }

    #[test]
    fn overrides_default_to_none() {
        let cli = Cli::try_parse_from(["parlance"]).unwrap();
        assert!(cli.server.is_none());
        assert!(cli.ws_url.is_none());
        assert!(cli.wake_word.is_none());
    }
}
