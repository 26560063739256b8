const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub const MIDI_MIN: i32 = 0;
pub const MIDI_MAX: i32 = 127;

/// `None` when the arithmetic leaves `i32`; range checks are up to the caller.
pub fn midi_from_pitch(step: char, alter: i32, octave: i32) -> Option<i32> {
    let base = match step.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => 0,
    };
    octave
        .checked_add(1)?
        .checked_mul(12)?
        .checked_add(base)?
        .checked_add(alter)
}

/// Sharp spelling with scientific octave, e.g. 60 -> "C4", 0 -> "C-1".
pub fn midi_to_note_name(midi: i32) -> String {
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

/// Parse names like "C4", "f#3", "Bb2", "E♭5" or "C-1".
/// Returns `None` for malformed names or pitches outside the MIDI range.
pub fn note_name_to_midi(name: &str) -> Option<i32> {
    let name = name.trim();
    let mut chars = name.chars().peekable();

    let step = chars.next()?.to_ascii_uppercase();
    if !matches!(step, 'A'..='G') {
        return None;
    }

    let mut alter = 0;
    while let Some(&c) = chars.peek() {
        match c {
            '#' | '♯' => alter += 1,
            'b' | '♭' => alter -= 1,
            _ => break,
        }
        chars.next();
    }

    let octave_str: String = chars.collect();
    if octave_str.is_empty() {
        return None;
    }
    let octave: i32 = octave_str.parse().ok()?;

    let midi = midi_from_pitch(step, alter, octave)?;
    (MIDI_MIN..=MIDI_MAX).contains(&midi).then_some(midi)
}

pub fn frequency_to_midi_float(hz: f32) -> f32 {
    69.0 + 12.0 * (hz / 440.0).log2()
}

pub fn frequency_to_midi(hz: f32) -> i32 {
    frequency_to_midi_float(hz).round() as i32
}

pub fn midi_to_frequency(midi: i32) -> f32 {
    440.0 * 2f32.powf((midi - 69) as f32 / 12.0)
}
