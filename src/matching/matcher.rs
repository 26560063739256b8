use log::{debug, warn};

use crate::clock::Clock;
use crate::notes::{midi_to_note_name, note_name_to_midi, MIDI_MAX, MIDI_MIN};
use crate::transcription::TranscribedNote;

use super::cooldown::Cooldowns;
use super::types::{MatcherConfig, MelodyItem, MelodyMatchState, MelodyNote, NoteMatchStatus};

/// Used in place of melody names that cannot be parsed (C4).
pub const DEFAULT_PITCH: i32 = 60;

/// Receives matcher progress. All methods default to no-ops.
pub trait MatchEvents {
    fn on_note_matched(&mut self, _note: &MelodyNote, _detected: &TranscribedNote) {}
    fn on_melody_complete(&mut self) {}
    fn on_state_change(&mut self, _state: &MelodyMatchState) {}
}

impl MatchEvents for () {}

pub fn parse_melody(items: &[MelodyItem]) -> Vec<MelodyNote> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let pitch = match item {
                MelodyItem::Midi(midi) => (*midi).clamp(MIDI_MIN, MIDI_MAX),
                MelodyItem::Name(name) => note_name_to_midi(name).unwrap_or_else(|| {
                    warn!(
                        "unrecognized melody note {:?} at index {}, using {}",
                        name,
                        index,
                        midi_to_note_name(DEFAULT_PITCH)
                    );
                    DEFAULT_PITCH
                }),
            };
            MelodyNote {
                pitch,
                note_name: midi_to_note_name(pitch),
                index,
            }
        })
        .collect()
}

/// Compare a detected pitch against a target. Without `strict_octave` only
/// the pitch class counts, with the tolerance wrapping around the octave.
pub fn pitches_match(detected: i32, target: i32, strict_octave: bool, tolerance: u32) -> bool {
    if strict_octave {
        return detected.abs_diff(target) <= tolerance;
    }
    // Any tolerance past an octave already covers every pitch class
    let tolerance = tolerance.min(12);
    let diff = detected.rem_euclid(12).abs_diff(target.rem_euclid(12));
    diff <= tolerance || diff >= 12 - tolerance
}

/// Walks an ordered melody forward as notes are detected. Timing is
/// ignored, extra notes never count against the player, and a detection up
/// to `look_ahead` notes ahead marks the skipped notes as played.
pub struct MelodyMatcher<C: Clock, E: MatchEvents = ()> {
    config: MatcherConfig,
    clock: C,
    events: E,
    notes: Vec<NoteMatchStatus>,
    current_index: usize,
    is_complete: bool,
    cooldowns: Cooldowns,
}

impl<C: Clock, E: MatchEvents> MelodyMatcher<C, E> {
    pub fn new(config: MatcherConfig, clock: C, events: E) -> Self {
        MelodyMatcher {
            config,
            clock,
            events,
            notes: Vec::new(),
            current_index: 0,
            is_complete: true,
            cooldowns: Cooldowns::new(),
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    pub fn set_melody(&mut self, items: &[MelodyItem]) {
        self.set_melody_notes(parse_melody(items));
    }

    pub fn set_melody_notes(&mut self, notes: Vec<MelodyNote>) {
        self.notes = notes
            .into_iter()
            .enumerate()
            .map(|(index, note)| NoteMatchStatus {
                note: MelodyNote { index, ..note },
                is_played: false,
                matched_at: None,
                matched_with: None,
            })
            .collect();
        debug!("melody set: {} notes", self.notes.len());
        self.restart();
    }

    /// Start the current melody over.
    pub fn reset(&mut self) {
        for status in &mut self.notes {
            status.is_played = false;
            status.matched_at = None;
            status.matched_with = None;
        }
        self.restart();
    }

    fn restart(&mut self) {
        self.current_index = 0;
        self.is_complete = self.notes.is_empty();
        self.cooldowns.new_generation();
        let state = self.state();
        self.events.on_state_change(&state);
    }

    /// Apply cooldown releases that have come due.
    pub fn tick(&mut self) {
        self.cooldowns.release_due(self.clock.now_ms());
    }

    /// Feed detections in order. Returns how many melody notes were hit.
    pub fn process_detected_notes(&mut self, detected: &[TranscribedNote]) -> usize {
        let now = self.clock.now_ms();
        self.cooldowns.release_due(now);
        if self.is_complete {
            return 0;
        }

        let total = self.notes.len();
        let mut hits = 0;
        for note in detected {
            if self.current_index >= total {
                break;
            }
            let last = self
                .current_index
                .saturating_add(self.config.look_ahead)
                .min(total - 1);
            let matched = (self.current_index..=last).find(|&i| {
                !self.cooldowns.is_cooling(i)
                    && pitches_match(
                        note.pitch,
                        self.notes[i].note.pitch,
                        self.config.strict_octave,
                        self.config.pitch_tolerance_semitones,
                    )
            });
            let Some(m) = matched else {
                continue;
            };

            for status in &mut self.notes[self.current_index..=m] {
                if !status.is_played {
                    status.is_played = true;
                    status.matched_at = Some(now);
                }
            }
            self.notes[m].matched_with = Some(note.clone());
            if m > self.current_index {
                debug!(
                    "matched index {} ahead of {}, absorbing {} note(s)",
                    m,
                    self.current_index,
                    m - self.current_index
                );
            }
            self.current_index = m + 1;
            self.cooldowns.start(m, now, self.config.cooldown_ms);
            hits += 1;

            self.events.on_note_matched(&self.notes[m].note, note);

            if self.current_index >= total && !self.is_complete {
                self.is_complete = true;
                debug!("melody complete ({} notes)", total);
                self.events.on_melody_complete();
            }
        }

        if hits > 0 {
            let state = self.state();
            self.events.on_state_change(&state);
        }
        hits
    }

    pub fn state(&self) -> MelodyMatchState {
        let total_notes = self.notes.len();
        let played_count = self.notes.iter().filter(|s| s.is_played).count();
        let progress = if total_notes == 0 {
            0
        } else {
            (100.0 * played_count as f64 / total_notes as f64).round() as u32
        };
        MelodyMatchState {
            notes: self.notes.clone(),
            current_index: self.current_index,
            total_notes,
            played_count,
            progress,
            is_complete: self.is_complete,
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }
}
