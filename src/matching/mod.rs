pub mod cooldown;
pub mod matcher;
pub mod types;

pub use matcher::{parse_melody, pitches_match, MatchEvents, MelodyMatcher, DEFAULT_PITCH};
pub use types::{MatcherConfig, MelodyItem, MelodyMatchState, MelodyNote, NoteMatchStatus};
