const PEAK_DECAY: f32 = 0.995;
/// A frame quieter than `peak * DIP_RATIO` starts a dip.
const DIP_RATIO: f32 = 0.4;
/// Inside a dip, a frame louder than `previous * RISE_RATIO` is a new attack.
const RISE_RATIO: f32 = 1.5;
const MIN_ATTACK_RMS: f32 = 0.02;

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum();
    (energy / samples.len() as f32).sqrt()
}

/// Tracks frame loudness to tell a re-struck note from a sustained one.
/// Pitch alone cannot: both read as the same MIDI number frame after frame.
#[derive(Debug, Default, Clone)]
pub struct OnsetDetector {
    previous_rms: Option<f32>,
    peak: f32,
    in_dip: bool,
}

impl OnsetDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame's RMS. Returns true when the frame is a new attack.
    pub fn update(&mut self, rms: f32) -> bool {
        let previous = self.previous_rms.replace(rms);

        self.peak *= PEAK_DECAY;
        if rms > self.peak {
            self.peak = rms;
        }

        let mut attack = false;
        if !self.in_dip {
            if rms < self.peak * DIP_RATIO {
                self.in_dip = true;
            }
        } else if let Some(previous) = previous {
            if rms > previous * RISE_RATIO && rms > MIN_ATTACK_RMS {
                attack = true;
                self.in_dip = false;
                self.peak = rms;
            }
        }

        attack
    }

    pub fn in_dip(&self) -> bool {
        self.in_dip
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn reset(&mut self) {
        self.previous_rms = None;
        self.peak = 0.0;
        self.in_dip = false;
    }
}
