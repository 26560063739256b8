use wasm_bindgen::prelude::*;

pub mod clock;
pub mod error;
pub mod matching;
pub mod notes;
pub mod parser;
pub mod pitch;
pub mod session;
pub mod transcription;

use clock::SystemClock;
use matching::{MatcherConfig, MelodyItem};
use pitch::{Instrument, PitchEstimator};
use serde::{de::DeserializeOwned, Serialize};
use session::PracticeSession;
use transcription::TranscriberConfig;

use std::cell::RefCell;

thread_local! {
    static SESSION: RefCell<Option<PracticeSession<SystemClock>>> = RefCell::new(None);
    static ESTIMATOR: RefCell<PitchEstimator> = RefCell::new(PitchEstimator::new());
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(js_error)
}

/// `null`/`undefined` select the defaults; partial objects fill in the rest.
fn from_js_or_default<T: DeserializeOwned + Default>(value: JsValue) -> Result<T, JsValue> {
    if value.is_null() || value.is_undefined() {
        Ok(T::default())
    } else {
        serde_wasm_bindgen::from_value(value).map_err(js_error)
    }
}

fn with_session<T>(
    f: impl FnOnce(&mut PracticeSession<SystemClock>) -> Result<T, JsValue>,
) -> Result<T, JsValue> {
    SESSION.with(|cell| {
        let mut borrow = cell.borrow_mut();
        let session = borrow
            .as_mut()
            .ok_or_else(|| JsValue::from_str("No session; call init_session first"))?;
        f(session)
    })
}

/// Create (or replace) the practice session. The transcriber starts unloaded.
#[wasm_bindgen]
pub fn init_session(transcriber_config_js: JsValue, matcher_config_js: JsValue) -> Result<(), JsValue> {
    let transcriber_config: TranscriberConfig = from_js_or_default(transcriber_config_js)?;
    let matcher_config: MatcherConfig = from_js_or_default(matcher_config_js)?;
    let session = PracticeSession::new(transcriber_config, matcher_config, SystemClock::new());
    SESSION.with(|cell| *cell.borrow_mut() = Some(session));
    Ok(())
}

/// Load (or retry loading) the transcriber. Returns a SessionUpdate with
/// the status transitions.
#[wasm_bindgen]
pub fn load_transcriber() -> Result<JsValue, JsValue> {
    with_session(|session| {
        let update = session.load().map_err(js_error)?;
        to_js(&update)
    })
}

/// Replace the transcriber configuration; call `load_transcriber` afterwards.
#[wasm_bindgen]
pub fn configure_transcriber(config_js: JsValue) -> Result<JsValue, JsValue> {
    let config: TranscriberConfig = from_js_or_default(config_js)?;
    with_session(|session| to_js(&session.set_transcriber_config(config)))
}

/// Feed captured samples. Returns a SessionUpdate when an inference tick
/// ran, otherwise `null`.
#[wasm_bindgen]
pub fn feed_audio(samples: &[f32]) -> Result<JsValue, JsValue> {
    with_session(|session| match session.feed(samples) {
        Some(update) => to_js(&update),
        None => Ok(JsValue::NULL),
    })
}

/// Set the target melody from an array of MIDI numbers and/or note names.
#[wasm_bindgen]
pub fn set_melody(melody_js: JsValue) -> Result<JsValue, JsValue> {
    let items: Vec<MelodyItem> = serde_wasm_bindgen::from_value(melody_js).map_err(js_error)?;
    with_session(|session| to_js(&session.set_melody(&items)))
}

#[wasm_bindgen]
pub fn parse_musicxml_melody(xml: &str) -> Result<JsValue, JsValue> {
    let melody = parser::parse_musicxml_melody(xml).map_err(js_error)?;
    to_js(&melody)
}

#[wasm_bindgen]
pub fn set_melody_from_musicxml(xml: &str) -> Result<JsValue, JsValue> {
    let melody = parser::parse_musicxml_melody(xml).map_err(js_error)?;
    with_session(|session| to_js(&session.set_melody_notes(melody.notes)))
}

#[wasm_bindgen]
pub fn reset_session() -> Result<JsValue, JsValue> {
    with_session(|session| to_js(&session.reset()))
}

#[wasm_bindgen]
pub fn dispose_session() -> Result<JsValue, JsValue> {
    with_session(|session| to_js(&session.dispose()))
}

#[wasm_bindgen]
pub fn match_state() -> Result<JsValue, JsValue> {
    with_session(|session| to_js(&session.state()))
}

/// One-shot YIN estimate returning Float64Array [hz, confidence, midi_float].
/// Uses a thread-local estimator to avoid per-call allocations.
#[wasm_bindgen]
pub fn detect_pitch(samples: &[f32], sample_rate: f32, instrument: &str) -> Result<js_sys::Float64Array, JsValue> {
    let instrument = Instrument::from_name(instrument)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown instrument: {}", instrument)))?;
    let estimate = ESTIMATOR.with(|cell| {
        cell.borrow_mut()
            .estimate(samples, sample_rate, instrument.range())
    });
    let midi_float = if estimate.is_pitched() {
        notes::frequency_to_midi_float(estimate.frequency)
    } else {
        0.0
    };

    let arr = js_sys::Float64Array::new_with_length(3);
    arr.set_index(0, estimate.frequency as f64);
    arr.set_index(1, estimate.confidence as f64);
    arr.set_index(2, midi_float as f64);
    Ok(arr)
}

#[wasm_bindgen]
pub fn midi_to_note_name(midi: i32) -> String {
    notes::midi_to_note_name(midi)
}

#[wasm_bindgen]
pub fn note_name_to_midi(name: &str) -> Option<i32> {
    notes::note_name_to_midi(name)
}
