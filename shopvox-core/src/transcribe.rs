//! Speech-to-text boundary.
//!
//! Audio is brought to the shape speech models expect (mono, peak
//! normalized, 16 kHz) before a [`SpeechModel`] sees it. The model itself is
//! loaded lazily, once, through a [`SpeechModelHandle`] that every query
//! shares.

use crate::capability::{with_timeout, CapabilityError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Sample rate speech models are fed with.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("Failed to load speech model: {0}")]
    Load(String),

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),
}

pub type Result<T> = std::result::Result<T, TranscribeError>;

/// Recorded audio as interleaved samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }
}

/// Down-mixes, peak-normalizes and resamples `clip` to
/// [`TARGET_SAMPLE_RATE`].
///
/// Silence yields an empty waveform. A trailing partial frame is dropped.
pub fn prepare_waveform(clip: &AudioClip) -> Result<Vec<f32>> {
    if clip.channels == 0 {
        return Err(TranscribeError::InvalidAudio("zero channels".to_string()));
    }
    if clip.sample_rate == 0 {
        return Err(TranscribeError::InvalidAudio("zero sample rate".to_string()));
    }

    let channels = clip.channels as usize;
    let mut mono: Vec<f32> = clip
        .samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    let peak = mono.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
    if peak <= f32::EPSILON || !peak.is_finite() {
        return Ok(Vec::new());
    }
    for sample in &mut mono {
        *sample /= peak;
    }

    Ok(resample(&mono, clip.sample_rate, TARGET_SAMPLE_RATE))
}

/// Linear-interpolation resampling.
fn resample(input: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || input.is_empty() {
        return input.to_vec();
    }

    let out_len = ((input.len() as u64 * to as u64) / from as u64).max(1) as usize;
    let step = from as f64 / to as f64;
    let last = input.len() - 1;

    (0..out_len)
        .map(|i| {
            let position = i as f64 * step;
            let index = (position.floor() as usize).min(last);
            let frac = (position - index as f64) as f32;
            let a = input[index];
            let b = input[(index + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}

/// A speech recognition model.
#[async_trait]
pub trait SpeechModel: Send + Sync {
    /// Transcribes a prepared 16 kHz mono waveform.
    async fn transcribe(&self, waveform: &[f32]) -> std::result::Result<String, CapabilityError>;
}

/// Loads a [`SpeechModel`]; typically slow and done once per process.
#[async_trait]
pub trait SpeechModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn SpeechModel>>;
}

/// A lazily loaded, shared speech model.
pub struct SpeechModelHandle {
    loader: Arc<dyn SpeechModelLoader>,
    model: Mutex<Option<Arc<dyn SpeechModel>>>,
}

impl SpeechModelHandle {
    pub fn new(loader: Arc<dyn SpeechModelLoader>) -> Self {
        Self {
            loader,
            model: Mutex::new(None),
        }
    }

    /// Returns the model, loading it on first use. Concurrent callers wait
    /// for the same load.
    pub async fn get(&self) -> Result<Arc<dyn SpeechModel>> {
        let mut slot = self.model.lock().await;
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        info!("Loading speech model");
        let model = self.loader.load().await?;
        *slot = Some(Arc::clone(&model));
        info!("Speech model ready");
        Ok(model)
    }

    pub async fn is_loaded(&self) -> bool {
        self.model.lock().await.is_some()
    }

    /// Drops the loaded model; the next [`get`](Self::get) loads it again.
    pub async fn unload(&self) {
        if self.model.lock().await.take().is_some() {
            debug!("Speech model unloaded");
        }
    }
}

/// Turns audio clips into transcripts.
///
/// Every failure (bad audio, model load error, model error, timeout) is
/// logged and yields an empty transcript.
#[derive(Clone)]
pub struct Transcriber {
    handle: Arc<SpeechModelHandle>,
    timeout: Duration,
}

impl Transcriber {
    pub fn new(handle: Arc<SpeechModelHandle>, timeout: Duration) -> Self {
        Self { handle, timeout }
    }

    pub fn handle(&self) -> &SpeechModelHandle {
        &self.handle
    }

    pub async fn transcribe(&self, clip: &AudioClip) -> String {
        let waveform = match prepare_waveform(clip) {
            Ok(waveform) => waveform,
            Err(e) => {
                warn!(error = %e, "Cannot prepare audio for transcription");
                return String::new();
            }
        };
        if waveform.is_empty() {
            debug!("Silent audio, nothing to transcribe");
            return String::new();
        }

        let model = match self.handle.get().await {
            Ok(model) => model,
            Err(e) => {
                warn!(error = %e, "Speech model unavailable");
                return String::new();
            }
        };

        match with_timeout("transcribe", self.timeout, model.transcribe(&waveform)).await {
            Ok(text) => {
                let text = text.trim().to_string();
                debug!(samples = waveform.len(), transcript = %text, "Transcribed audio");
                text
            }
            Err(e) => {
                warn!(error = %e, "Transcription failed");
                String::new()
            }
        }
    }
}
