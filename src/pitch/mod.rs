pub mod instrument;
pub mod yin;

pub use instrument::{FrequencyRange, Instrument};
pub use yin::{PitchEstimate, PitchEstimator};
