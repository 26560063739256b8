use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::matching::MelodyNote;
use crate::notes::{midi_from_pitch, midi_to_note_name, MIDI_MAX, MIDI_MIN};

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ParsedMelody {
    pub title: Option<String>,
    pub notes: Vec<MelodyNote>,
}

impl ParsedMelody {
    pub fn pitches(&self) -> Vec<i32> {
        self.notes.iter().map(|n| n.pitch).collect()
    }
}

/// Extract the target melody from a partwise MusicXML score.
///
/// Only the first part is read. Rests, chord tones after the first and
/// tie continuations are dropped, since the matcher tracks attacks and
/// ignores rhythm. Written pitches are shifted by `<transpose>` so they
/// match what the microphone hears.
pub fn parse_musicxml_melody(xml: &str) -> Result<ParsedMelody> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut pitches: Vec<i32> = Vec::new();
    let mut title: Option<String> = None;
    let mut current_tag: Option<&'static str> = None;
    let mut part_count = 0u32;

    // Note state
    let mut in_note = false;
    let mut note_is_rest = false;
    let mut note_is_chord = false;
    let mut note_ends_tie = false;
    let mut step: Option<char> = None;
    let mut alter: i32 = 0;
    let mut octave: Option<i32> = None;

    // Transpose state
    let mut in_transpose = false;
    let mut transpose_chromatic: i32 = 0;
    let mut transpose_octaves: i32 = 0;
    let mut pending_chromatic: i32 = 0;
    let mut pending_octaves: i32 = 0;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.name().as_ref() {
                b"part" => part_count += 1,
                b"note" => {
                    in_note = true;
                    note_is_rest = false;
                    note_is_chord = false;
                    note_ends_tie = false;
                    step = None;
                    alter = 0;
                    octave = None;
                }
                b"rest" if in_note => note_is_rest = true,
                b"chord" if in_note => note_is_chord = true,
                b"transpose" => {
                    in_transpose = true;
                    pending_chromatic = 0;
                    pending_octaves = 0;
                }
                b"step" => current_tag = Some("step"),
                b"alter" => current_tag = Some("alter"),
                b"octave" => current_tag = Some("octave"),
                b"chromatic" => current_tag = Some("chromatic"),
                b"octave-change" => current_tag = Some("octave-change"),
                b"movement-title" => current_tag = Some("movement-title"),
                b"work-title" => current_tag = Some("work-title"),
                _ => {}
            },
            Event::Empty(ref e) => match e.name().as_ref() {
                b"rest" if in_note => note_is_rest = true,
                b"chord" if in_note => note_is_chord = true,
                b"tie" if in_note => {
                    let is_stop = e
                        .attributes()
                        .flatten()
                        .any(|a| a.key.as_ref() == b"type" && a.value.as_ref() == b"stop");
                    if is_stop {
                        note_ends_tie = true;
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if let Some(tag) = current_tag.take() {
                    let text = e.unescape()?;
                    match tag {
                        "step" => step = text.chars().next(),
                        "alter" => {
                            // Microtonal alters like "0.5" round to the nearest semitone
                            if let Ok(v) = text.parse::<f64>() {
                                alter = v.round() as i32;
                            }
                        }
                        "octave" => octave = text.parse::<i32>().ok(),
                        "chromatic" if in_transpose => {
                            pending_chromatic = text.parse::<i32>().unwrap_or(0);
                        }
                        "octave-change" if in_transpose => {
                            pending_octaves = text.parse::<i32>().unwrap_or(0);
                        }
                        "movement-title" | "work-title" => {
                            if title.is_none() {
                                title = Some(text.to_string());
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"note" if in_note => {
                    in_note = false;
                    let skip = part_count > 1 || note_is_rest || note_is_chord || note_ends_tie;
                    if !skip {
                        let s = step.ok_or_else(|| {
                            EngineError::MusicXml(format!(
                                "pitched note {} is missing <step>",
                                pitches.len() + 1
                            ))
                        })?;
                        let o = octave.ok_or_else(|| {
                            EngineError::MusicXml(format!(
                                "pitched note {} is missing <octave>",
                                pitches.len() + 1
                            ))
                        })?;
                        let index = pitches.len() + 1;
                        let sounding = midi_from_pitch(s, alter, o)
                            .zip(transpose_octaves.checked_mul(12))
                            .and_then(|(written, shift)| written.checked_add(shift))
                            .and_then(|p| p.checked_add(transpose_chromatic))
                            .filter(|p| (MIDI_MIN..=MIDI_MAX).contains(p))
                            .ok_or_else(|| {
                                EngineError::MusicXml(format!(
                                    "pitched note {} sounds outside the MIDI range",
                                    index
                                ))
                            })?;
                        pitches.push(sounding);
                    }
                }
                b"transpose" => {
                    in_transpose = false;
                    if part_count <= 1 {
                        transpose_chromatic = pending_chromatic;
                        transpose_octaves = pending_octaves;
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let notes = pitches
        .into_iter()
        .enumerate()
        .map(|(index, pitch)| MelodyNote {
            pitch,
            note_name: midi_to_note_name(pitch),
            index,
        })
        .collect();

    Ok(ParsedMelody { title, notes })
}
