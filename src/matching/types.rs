use serde::{Deserialize, Serialize};

use crate::transcription::TranscribedNote;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MelodyNote {
    pub pitch: i32,
    pub note_name: String,
    pub index: usize,
}

/// One melody entry as sent by the host: a MIDI number or a note name.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum MelodyItem {
    Midi(i32),
    Name(String),
}

impl From<i32> for MelodyItem {
    fn from(midi: i32) -> Self {
        MelodyItem::Midi(midi)
    }
}

impl From<&str> for MelodyItem {
    fn from(name: &str) -> Self {
        MelodyItem::Name(name.to_string())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NoteMatchStatus {
    pub note: MelodyNote,
    pub is_played: bool,
    pub matched_at: Option<f64>,
    /// The detection that hit this note. `None` for notes absorbed by a
    /// look-ahead match.
    pub matched_with: Option<TranscribedNote>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MelodyMatchState {
    pub notes: Vec<NoteMatchStatus>,
    pub current_index: usize,
    pub total_notes: usize,
    pub played_count: usize,
    pub progress: u32,
    pub is_complete: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MatcherConfig {
    /// Require the exact octave instead of comparing pitch classes.
    pub strict_octave: bool,
    pub pitch_tolerance_semitones: u32,
    /// How many notes past the current one a detection may match.
    pub look_ahead: usize,
    pub cooldown_ms: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        MatcherConfig {
            strict_octave: false,
            pitch_tolerance_semitones: 0,
            look_ahead: 2,
            cooldown_ms: 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_melody_items_deserialize_mixed() {
        let items: Vec<MelodyItem> = serde_json::from_str(r#"[60, "E4", 67]"#).unwrap();
        assert_eq!(
            items,
            vec![MelodyItem::Midi(60), MelodyItem::Name("E4".into()), MelodyItem::Midi(67)]
        );
    }

    #[test]
    fn test_matcher_config_defaults() {
        let config: MatcherConfig = serde_json::from_str(r#"{"strict_octave": true}"#).unwrap();
        assert!(config.strict_octave);
        assert_eq!(config.look_ahead, 2);
        assert_eq!(config.cooldown_ms, 100.0);
    }
}
