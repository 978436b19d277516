//! Audio playback of server-returned clips
//!
//! Clips play through a FIFO queue: one clip at a time, in enqueue order,
//! never interrupting a clip already in progress. Playback failures surface
//! as notifications only and never end the session.

use std::io::Cursor;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Decoded audio clip ready for playback
#[derive(Debug, Clone)]
pub struct DecodedClip {
    /// Mono f32 samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Native sample rate of the clip
    pub sample_rate: u32,
}

impl DecodedClip {
    /// Clip duration derived from sample count
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let millis = (self.samples.len() as u64 * 1000) / u64::from(self.sample_rate);
        Duration::from_millis(millis)
    }
}

/// Plays decoded clips on the default output device
pub struct AudioPlayback {
    device: Device,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Playback("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self { device })
    }

    /// Play a clip to completion (blocking)
    ///
    /// # Errors
    ///
    /// Returns `Error::Playback` if no output config supports the clip's
    /// sample rate or the stream fails
    pub fn play(&self, clip: &DecodedClip) -> Result<()> {
        if clip.samples.is_empty() {
            return Ok(());
        }
        self.play_blocking(clip)
    }

    fn play_blocking(&self, clip: &DecodedClip) -> Result<()> {
        let config = self.output_config(clip.sample_rate)?;
        let channels = usize::from(config.channels);

        let samples = Arc::new(clip.samples.clone());
        let position = Arc::new(Mutex::new(0usize));
        let finished = Arc::new(Mutex::new(false));

        let samples_cb = Arc::clone(&samples);
        let position_cb = Arc::clone(&position);
        let finished_cb = Arc::clone(&finished);

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position_cb.lock().unwrap();

                    for frame in data.chunks_mut(channels) {
                        let sample = if *pos < samples_cb.len() {
                            samples_cb[*pos]
                        } else {
                            *finished_cb.lock().unwrap() = true;
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }

                        if *pos < samples_cb.len() {
                            *pos += 1;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Playback(e.to_string()))?;

        stream.play().map_err(|e| Error::Playback(e.to_string()))?;

        // Poll for completion, bounded by the clip duration plus slack
        let timeout = clip.duration() + Duration::from_millis(500);
        let start = std::time::Instant::now();

        while !*finished.lock().unwrap() {
            if start.elapsed() > timeout {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        // Let the device drain its last buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = samples.len(), "playback complete");

        Ok(())
    }

    /// Find an output config supporting the clip sample rate, preferring mono
    fn output_config(&self, sample_rate: u32) -> Result<StreamConfig> {
        let rate = SampleRate(sample_rate);

        let supported = self
            .device
            .supported_output_configs()
            .map_err(|e| Error::Playback(e.to_string()))?
            .find(|c| c.channels() == 1 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
            .or_else(|| {
                self.device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
                })
            })
            .ok_or_else(|| {
                Error::Playback(format!("no output config supports {sample_rate} Hz"))
            })?;

        Ok(supported.with_sample_rate(rate).config())
    }
}

/// FIFO playback queue backed by a dedicated worker thread
///
/// cpal streams are not `Send`, and clip fetches block, so the worker owns
/// both the output device and a blocking HTTP client. Dropping the queue
/// closes the channel and lets the worker exit after the current clip.
pub struct PlaybackQueue {
    tx: mpsc::Sender<String>,
    _worker: JoinHandle<()>,
}

impl PlaybackQueue {
    /// Spawn the playback worker
    #[must_use]
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel::<String>();

        let worker = std::thread::spawn(move || {
            let playback = AudioPlayback::new();
            let http = reqwest::blocking::Client::new();

            for url in rx {
                let result = match &playback {
                    Ok(playback) => play_url(playback, &http, &url),
                    Err(e) => Err(Error::Playback(format!("output device unavailable: {e}"))),
                };

                if let Err(e) = result {
                    tracing::warn!(url = %url, error = %e, "clip playback failed");
                }
            }
        });

        Self {
            tx,
            _worker: worker,
        }
    }

    /// Queue a clip URL for playback after any clips already queued
    pub fn enqueue(&self, url: String) {
        if self.tx.send(url).is_err() {
            tracing::warn!("playback worker gone, clip dropped");
        }
    }
}

/// Fetch a clip and play it to completion
fn play_url(playback: &AudioPlayback, http: &reqwest::blocking::Client, url: &str) -> Result<()> {
    let response = http
        .get(url)
        .send()
        .map_err(|e| Error::Playback(format!("clip fetch failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::Playback(format!(
            "clip fetch failed: HTTP {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .map_err(|e| Error::Playback(format!("clip fetch failed: {e}")))?;

    let clip = decode_clip(&bytes)?;
    playback.play(&clip)
}

/// Decode a clip payload (WAV or MP3) to mono f32 samples
///
/// # Errors
///
/// Returns `Error::Playback` if the payload holds no decodable audio
pub fn decode_clip(bytes: &[u8]) -> Result<DecodedClip> {
    if bytes.starts_with(b"RIFF") {
        decode_wav(bytes)
    } else {
        decode_mp3(bytes)
    }
}

fn decode_wav(bytes: &[u8]) -> Result<DecodedClip> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();

    let raw: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max = f32::from(i16::MAX);
            reader
                .samples::<i16>()
                .filter_map(std::result::Result::ok)
                .map(|s| f32::from(s) / max)
                .collect()
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .filter_map(std::result::Result::ok)
            .collect(),
    };

    let samples = downmix(&raw, usize::from(spec.channels));

    if samples.is_empty() {
        return Err(Error::Playback("no decodable audio in clip".to_string()));
    }

    Ok(DecodedClip {
        samples,
        sample_rate: spec.sample_rate,
    })
}

fn decode_mp3(bytes: &[u8]) -> Result<DecodedClip> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                }

                let frame_f32: Vec<f32> =
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(downmix(&frame_f32, frame.channels));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(Error::Playback("no decodable audio in clip".to_string()));
    }

    Ok(DecodedClip {
        samples,
        sample_rate,
    })
}

/// Average interleaved channels down to mono
#[allow(clippy::cast_precision_loss)]
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    let channels = channels.max(1);
    if channels == 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
