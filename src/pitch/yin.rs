use serde::Serialize;

use super::instrument::FrequencyRange;

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct PitchEstimate {
    pub frequency: f32,
    pub confidence: f32,
}

impl PitchEstimate {
    pub fn none() -> Self {
        PitchEstimate {
            frequency: 0.0,
            confidence: 0.0,
        }
    }

    pub fn is_pitched(&self) -> bool {
        self.frequency > 0.0
    }
}

const YIN_THRESHOLD: f32 = 0.15;
/// Above this the global CMNDF minimum is treated as unpitched.
const MAX_ACCEPTED_MINIMUM: f32 = 0.5;
const MIN_OUTPUT_HZ: f32 = 20.0;
const MAX_OUTPUT_HZ: f32 = 5000.0;

/// YIN pitch estimator with scratch buffers kept across calls, so a steady
/// stream of equally sized windows does not allocate.
#[derive(Debug, Default)]
pub struct PitchEstimator {
    diff: Vec<f32>,
    cmnd: Vec<f32>,
}

impl PitchEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sized for the largest lag the given range can produce at `sample_rate`.
    pub fn with_capacity(sample_rate: f32, range: FrequencyRange) -> Self {
        let max_lag = (sample_rate / range.min_hz).floor().max(0.0) as usize + 1;
        PitchEstimator {
            diff: Vec::with_capacity(max_lag),
            cmnd: Vec::with_capacity(max_lag),
        }
    }

    /// Estimate the fundamental of `window` (oldest sample first).
    /// Only the most recent `2 * max_lag` samples are analyzed.
    pub fn estimate(
        &mut self,
        window: &[f32],
        sample_rate: f32,
        range: FrequencyRange,
    ) -> PitchEstimate {
        if window.len() < 4 || sample_rate <= 0.0 || range.min_hz <= 0.0 {
            return PitchEstimate::none();
        }

        let min_lag = (sample_rate / range.max_hz).ceil().max(1.0) as usize;
        let max_lag = ((sample_rate / range.min_hz).floor() as usize).min(window.len() / 2);
        if min_lag >= max_lag || max_lag < 2 {
            return PitchEstimate::none();
        }

        let segment = &window[window.len() - 2 * max_lag..];

        // Difference function
        self.diff.clear();
        self.diff.resize(max_lag + 1, 0.0);
        for tau in 1..=max_lag {
            let mut sum = 0.0f32;
            for j in 0..max_lag {
                let d = segment[j] - segment[j + tau];
                sum += d * d;
            }
            self.diff[tau] = sum;
        }

        // Cumulative mean normalized difference function
        self.cmnd.clear();
        self.cmnd.resize(max_lag + 1, 1.0);
        let mut running_sum = 0.0f32;
        for tau in 1..=max_lag {
            running_sum += self.diff[tau];
            if running_sum > 0.0 {
                self.cmnd[tau] = self.diff[tau] * tau as f32 / running_sum;
            }
        }
        let cmnd = &self.cmnd;

        // First dip below threshold, walked forward to the bottom of its valley
        let mut best_tau = None;
        for tau in min_lag..=max_lag {
            if cmnd[tau] < YIN_THRESHOLD {
                let mut t = tau;
                while t < max_lag && cmnd[t + 1] < cmnd[t] {
                    t += 1;
                }
                best_tau = Some(t);
                break;
            }
        }

        let best_tau = match best_tau {
            Some(t) => t,
            None => {
                let mut min_val = f32::MAX;
                let mut min_tau = min_lag;
                for tau in min_lag..=max_lag {
                    if cmnd[tau] < min_val {
                        min_val = cmnd[tau];
                        min_tau = tau;
                    }
                }
                if min_val > MAX_ACCEPTED_MINIMUM {
                    return PitchEstimate::none();
                }
                min_tau
            }
        };

        // Parabolic interpolation for sub-sample accuracy
        let tau_refined = if best_tau > 0 && best_tau < max_lag {
            let alpha = cmnd[best_tau - 1];
            let beta = cmnd[best_tau];
            let gamma = cmnd[best_tau + 1];
            let denom = 2.0 * (alpha - 2.0 * beta + gamma);
            if denom.abs() > 1e-10 {
                best_tau as f32 + (alpha - gamma) / denom
            } else {
                best_tau as f32
            }
        } else {
            best_tau as f32
        };

        if tau_refined <= 0.0 {
            return PitchEstimate::none();
        }

        let frequency = sample_rate / tau_refined;
        let confidence = 1.0 - cmnd[best_tau].min(1.0);

        if !frequency.is_finite()
            || !confidence.is_finite()
            || !(MIN_OUTPUT_HZ..=MAX_OUTPUT_HZ).contains(&frequency)
            || !range.contains(frequency)
        {
            return PitchEstimate::none();
        }

        PitchEstimate {
            frequency,
            confidence,
        }
    }
}
