use serde::{Deserialize, Serialize};

use crate::pitch::Instrument;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TranscribedNote {
    pub pitch: i32,
    pub note_name: String,
    pub onset_probability: f32,
    pub frame_probability: f32,
    /// Time (ms) this note's current history entry started.
    pub timestamp: f64,
    /// How long (ms) the pitch has persisted so far.
    pub duration: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TranscriptionResult {
    pub active_notes: Vec<TranscribedNote>,
    pub new_onsets: Vec<TranscribedNote>,
    pub timestamp: f64,
    /// Wall time (ms) spent producing this result.
    pub latency: f64,
}

impl TranscriptionResult {
    pub fn empty(timestamp: f64) -> Self {
        TranscriptionResult {
            timestamp,
            ..Default::default()
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum TranscriberStatus {
    Unloaded,
    Loading,
    Ready,
    Error(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TranscriberConfig {
    pub sample_rate: f32,
    pub window_size_ms: f64,
    pub hop_size_ms: f64,
    pub onset_threshold: f32,
    pub frame_threshold: f32,
    pub instrument: Instrument,
    pub persistence_frames: u32,
    pub min_duration_ms: f64,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        TranscriberConfig {
            sample_rate: 44100.0,
            window_size_ms: 400.0,
            hop_size_ms: 100.0,
            onset_threshold: 0.5,
            frame_threshold: 0.3,
            instrument: Instrument::Keyboard,
            persistence_frames: 2,
            min_duration_ms: 150.0,
        }
    }
}

impl TranscriberConfig {
    pub fn window_capacity(&self) -> usize {
        ((self.window_size_ms / 1000.0 * self.sample_rate as f64).round() as usize).max(1)
    }

    pub fn hop_samples(&self) -> usize {
        ((self.hop_size_ms / 1000.0 * self.sample_rate as f64).round() as usize).max(1)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(format!("sample_rate must be positive, got {}", self.sample_rate));
        }
        if !(300.0..=500.0).contains(&self.window_size_ms) {
            return Err(format!(
                "window_size_ms must be within 300-500, got {}",
                self.window_size_ms
            ));
        }
        if !(75.0..=125.0).contains(&self.hop_size_ms) {
            return Err(format!(
                "hop_size_ms must be within 75-125, got {}",
                self.hop_size_ms
            ));
        }
        for (name, value) in [
            ("onset_threshold", self.onset_threshold),
            ("frame_threshold", self.frame_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be within 0-1, got {}", name, value));
            }
        }
        if self.persistence_frames == 0 {
            return Err("persistence_frames must be at least 1".to_string());
        }
        let range = self.instrument.range();
        let lowest_period_samples = (self.sample_rate / range.min_hz) as usize;
        if self.window_capacity() < 2 * lowest_period_samples {
            return Err(format!(
                "window of {} samples cannot hold two periods of {} Hz",
                self.window_capacity(),
                range.min_hz
            ));
        }
        Ok(())
    }
}
