use serde::{Deserialize, Serialize};

/// Accepted fundamental range in Hz, inclusive on both ends.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FrequencyRange {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl FrequencyRange {
    pub fn contains(&self, hz: f32) -> bool {
        hz >= self.min_hz && hz <= self.max_hz
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    /// A0 (27.5 Hz) to C8 (4186 Hz).
    #[default]
    Keyboard,
    /// Standard tuning E2 to E6.
    Guitar,
    /// Four-string bass E1 to G4.
    Bass,
}

impl Instrument {
    pub fn range(self) -> FrequencyRange {
        let (min_hz, max_hz) = match self {
            Instrument::Keyboard => (27.5, 4186.0),
            Instrument::Guitar => (82.0, 1319.0),
            Instrument::Bass => (41.0, 392.0),
        };
        FrequencyRange { min_hz, max_hz }
    }

    pub fn from_name(name: &str) -> Option<Instrument> {
        match name.trim().to_ascii_lowercase().as_str() {
            "keyboard" | "piano" => Some(Instrument::Keyboard),
            "guitar" => Some(Instrument::Guitar),
            "bass" => Some(Instrument::Bass),
            _ => None,
        }
    }
}
