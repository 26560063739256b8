use log::{debug, trace, warn};

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::notes::{frequency_to_midi, midi_to_note_name};
use crate::pitch::PitchEstimator;

use super::envelope::{rms, OnsetDetector};
use super::persistence::NoteHistory;
use super::types::{TranscribedNote, TranscriberConfig, TranscriberStatus, TranscriptionResult};
use super::window::AudioWindow;

/// Frame RMS below this counts as silence.
const SILENCE_RMS: f32 = 0.01;
/// Consecutive silent ticks after which all note state is forgotten, so
/// the next note is always a fresh onset.
pub const SILENCE_FRAMES_FOR_RESET: u32 = 2;

/// Receives transcriber output. All methods default to no-ops.
pub trait TranscriberEvents {
    fn on_status_change(&mut self, _status: &TranscriberStatus) {}
    fn on_transcription(&mut self, _result: &TranscriptionResult) {}
}

impl TranscriberEvents for () {}

pub struct Transcriber<C: Clock, E: TranscriberEvents = ()> {
    config: TranscriberConfig,
    clock: C,
    events: E,
    status: TranscriberStatus,
    window: Option<AudioWindow>,
    linear: Vec<f32>,
    estimator: PitchEstimator,
    onset: OnsetDetector,
    history: NoteHistory,
    last_pitch: Option<i32>,
    silent_frames: u32,
    last_inference_ms: Option<f64>,
}

impl<C: Clock, E: TranscriberEvents> Transcriber<C, E> {
    pub fn new(config: TranscriberConfig, clock: C, events: E) -> Self {
        let history = NoteHistory::new(
            config.hop_size_ms,
            config.persistence_frames,
            config.min_duration_ms,
        );
        Transcriber {
            config,
            clock,
            events,
            status: TranscriberStatus::Unloaded,
            window: None,
            linear: Vec::new(),
            estimator: PitchEstimator::new(),
            onset: OnsetDetector::new(),
            history,
            last_pitch: None,
            silent_frames: 0,
            last_inference_ms: None,
        }
    }

    pub fn status(&self) -> &TranscriberStatus {
        &self.status
    }

    pub fn config(&self) -> &TranscriberConfig {
        &self.config
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    pub fn window(&self) -> Option<&AudioWindow> {
        self.window.as_ref()
    }

    pub fn history(&self) -> &NoteHistory {
        &self.history
    }

    pub fn last_pitch(&self) -> Option<i32> {
        self.last_pitch
    }

    fn set_status(&mut self, status: TranscriberStatus) {
        if self.status != status {
            debug!("transcriber status: {:?} -> {:?}", self.status, status);
            self.status = status;
            self.events.on_status_change(&self.status);
        }
    }

    /// Validate the configuration and allocate buffers. Also the retry path
    /// out of `Error`.
    pub fn load(&mut self) -> Result<()> {
        self.set_status(TranscriberStatus::Loading);

        if let Err(reason) = self.config.validate() {
            self.window = None;
            self.set_status(TranscriberStatus::Error(reason.clone()));
            return Err(EngineError::InvalidConfig(reason));
        }

        let range = self.config.instrument.range();
        self.window = Some(AudioWindow::new(self.config.window_capacity()));
        self.linear = Vec::with_capacity(self.config.window_capacity());
        self.estimator = PitchEstimator::with_capacity(self.config.sample_rate, range);
        self.history = NoteHistory::new(
            self.config.hop_size_ms,
            self.config.persistence_frames,
            self.config.min_duration_ms,
        );
        self.reset();

        self.set_status(TranscriberStatus::Ready);
        Ok(())
    }

    /// Replace the configuration. The transcriber must be loaded again.
    pub fn set_config(&mut self, config: TranscriberConfig) {
        self.config = config;
        self.dispose();
    }

    /// Append `samples` and run an inference tick if at least one hop has
    /// elapsed since the previous tick. Chunk size does not affect cadence.
    pub fn process_audio(&mut self, samples: &[f32]) -> Option<TranscriptionResult> {
        if self.status != TranscriberStatus::Ready {
            return None;
        }
        self.window.as_mut()?.push(samples);

        let now = self.clock.now_ms();
        let due = match self.last_inference_ms {
            None => true,
            // A clock that stepped backwards re-anchors the cadence
            Some(last) => now < last || now - last >= self.config.hop_size_ms,
        };
        if !due {
            return None;
        }
        self.last_inference_ms = Some(now);
        self.run_inference().ok()
    }

    /// Run one tick over the current window. Failures inside the tick are
    /// logged and yield an empty result; only a transcriber that is not
    /// ready returns an error.
    pub fn run_inference(&mut self) -> Result<TranscriptionResult> {
        if self.status != TranscriberStatus::Ready {
            return Err(EngineError::NotReady(self.status.clone()));
        }

        let started = self.clock.now_ms();
        let mut result = match self.infer(started) {
            Ok(result) => result,
            Err(e) => {
                warn!("inference tick at {:.0} ms failed: {}", started, e);
                TranscriptionResult::empty(started)
            }
        };
        result.latency = (self.clock.now_ms() - started).max(0.0);

        self.events.on_transcription(&result);
        Ok(result)
    }

    fn infer(&mut self, now: f64) -> Result<TranscriptionResult> {
        let window = self
            .window
            .as_ref()
            .ok_or_else(|| EngineError::NotReady(self.status.clone()))?;
        window.linearize_into(&mut self.linear);
        if let Some(index) = self.linear.iter().position(|s| !s.is_finite()) {
            return Err(EngineError::NonFiniteInput { index });
        }

        let frame_len = self.config.hop_samples().min(self.linear.len());
        let frame_rms = rms(&self.linear[self.linear.len() - frame_len..]);
        let new_attack = self.onset.update(frame_rms);

        let mut detected: Option<(i32, f32)> = None;
        if frame_rms < SILENCE_RMS {
            self.silent_frames += 1;
            if self.silent_frames == SILENCE_FRAMES_FOR_RESET {
                debug!("silence for {} ticks, clearing note state", self.silent_frames);
            }
            if self.silent_frames >= SILENCE_FRAMES_FOR_RESET {
                self.history.clear();
                self.last_pitch = None;
                self.onset.reset();
            }
        } else {
            self.silent_frames = 0;
            let estimate = self.estimator.estimate(
                &self.linear,
                self.config.sample_rate,
                self.config.instrument.range(),
            );
            trace!(
                "tick {:.0} ms: rms {:.4}, {:.2} Hz, confidence {:.3}",
                now,
                frame_rms,
                estimate.frequency,
                estimate.confidence
            );

            if estimate.is_pitched() && estimate.confidence >= self.config.frame_threshold {
                let pitch = frequency_to_midi(estimate.frequency);
                if let Some(previous) = self.last_pitch {
                    // Forget the old entry so a return to it, or a re-strike,
                    // is detected as an onset.
                    if previous != pitch || new_attack {
                        self.history.remove(previous);
                    }
                }
                self.last_pitch = Some(pitch);
                detected = Some((pitch, estimate.confidence));
            }
        }

        let mut result = TranscriptionResult::empty(now);
        if let Some((pitch, confidence)) = detected {
            let entry = self.history.observe(pitch, now).clone();
            if self.history.is_valid(&entry) {
                let note = TranscribedNote {
                    pitch,
                    note_name: midi_to_note_name(pitch),
                    onset_probability: if entry.reported { 0.0 } else { confidence },
                    frame_probability: confidence,
                    timestamp: entry.first_seen,
                    duration: entry.total_duration,
                };
                if !entry.reported && confidence >= self.config.onset_threshold {
                    debug!("onset {} ({}) at {:.0} ms", note.note_name, pitch, entry.first_seen);
                    self.history.mark_reported(pitch);
                    result.new_onsets.push(note.clone());
                }
                result.active_notes.push(note);
            }
        }

        let detected_pitch = detected.map(|(pitch, _)| [pitch]);
        let detected_pitches: &[i32] = detected_pitch.as_ref().map_or(&[], |p| p.as_slice());
        self.history.prune(detected_pitches, now);

        Ok(result)
    }

    /// Clear buffered audio and all note state. Idempotent; keeps the status.
    pub fn reset(&mut self) {
        if let Some(window) = self.window.as_mut() {
            window.clear();
        }
        self.linear.clear();
        self.onset.reset();
        self.history.clear();
        self.last_pitch = None;
        self.silent_frames = 0;
        self.last_inference_ms = None;
    }

    /// Release buffers and return to `Unloaded`.
    pub fn dispose(&mut self) {
        self.reset();
        self.window = None;
        self.linear = Vec::new();
        self.estimator = PitchEstimator::new();
        self.set_status(TranscriberStatus::Unloaded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notes::midi_to_frequency;
    use crate::pitch::Instrument;
    use std::f32::consts::PI;

    const SAMPLE_RATE: f32 = 16000.0;
    const HOP_SAMPLES: usize = 1600;

    #[derive(Default)]
    struct Recorder {
        statuses: Vec<TranscriberStatus>,
        results: Vec<TranscriptionResult>,
    }

    impl TranscriberEvents for Recorder {
        fn on_status_change(&mut self, status: &TranscriberStatus) {
            self.statuses.push(status.clone());
        }

        fn on_transcription(&mut self, result: &TranscriptionResult) {
            self.results.push(result.clone());
        }
    }

    fn test_config() -> TranscriberConfig {
        TranscriberConfig {
            sample_rate: SAMPLE_RATE,
            instrument: Instrument::Guitar,
            ..Default::default()
        }
    }

    /// Continuous sine, chunked at hop size.
    struct Tone {
        phase_index: usize,
    }

    impl Tone {
        fn new() -> Self {
            Tone { phase_index: 0 }
        }

        fn chunk(&mut self, midi: i32, amplitude: f32, len: usize) -> Vec<f32> {
            let freq = midi_to_frequency(midi);
            let start = self.phase_index;
            self.phase_index += len;
            (start..start + len)
                .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE).sin())
                .collect()
        }
    }

    fn loaded(clock: &ManualClock) -> Transcriber<ManualClock, Recorder> {
        let mut t = Transcriber::new(test_config(), clock.clone(), Recorder::default());
        t.load().unwrap();
        t
    }

    /// Feed one hop of audio, then advance the clock by one hop.
    fn feed(
        t: &mut Transcriber<ManualClock, Recorder>,
        clock: &ManualClock,
        chunk: &[f32],
    ) -> Option<TranscriptionResult> {
        let result = t.process_audio(chunk);
        clock.advance(100.0);
        result
    }

    fn onset_pitches(results: &[TranscriptionResult]) -> Vec<i32> {
        results
            .iter()
            .flat_map(|r| r.new_onsets.iter().map(|n| n.pitch))
            .collect()
    }

    #[test]
    fn test_load_reports_status_transitions() {
        let clock = ManualClock::new(0.0);
        let t = loaded(&clock);
        assert_eq!(t.status(), &TranscriberStatus::Ready);
        assert_eq!(
            t.events().statuses,
            vec![TranscriberStatus::Loading, TranscriberStatus::Ready]
        );
        assert_eq!(t.window().unwrap().capacity(), 6400);
    }

    #[test]
    fn test_load_failure_is_terminal_until_retry() {
        let clock = ManualClock::new(0.0);
        let bad = TranscriberConfig {
            hop_size_ms: 10.0,
            ..test_config()
        };
        let mut t = Transcriber::new(bad, clock.clone(), Recorder::default());
        assert!(matches!(t.load(), Err(EngineError::InvalidConfig(_))));
        assert!(matches!(t.status(), TranscriberStatus::Error(_)));

        let mut tone = Tone::new();
        assert!(t.process_audio(&tone.chunk(60, 0.5, HOP_SAMPLES)).is_none());
        assert!(matches!(t.run_inference(), Err(EngineError::NotReady(_))));

        t.set_config(test_config());
        assert_eq!(t.status(), &TranscriberStatus::Unloaded);
        t.load().unwrap();
        assert_eq!(t.status(), &TranscriberStatus::Ready);
    }

    #[test]
    fn test_unloaded_ignores_audio() {
        let clock = ManualClock::new(0.0);
        let mut t = Transcriber::new(test_config(), clock, ());
        assert!(t.process_audio(&[0.1; 512]).is_none());
        assert!(t.window().is_none());
    }

    #[test]
    fn test_inference_cadence_independent_of_chunk_size() {
        let clock = ManualClock::new(0.0);
        let mut t = loaded(&clock);
        let mut tone = Tone::new();
        let mut ticks = 0;
        // 10 ms chunks for one second
        for _ in 0..100 {
            if t.process_audio(&tone.chunk(64, 0.5, 160)).is_some() {
                ticks += 1;
            }
            clock.advance(10.0);
        }
        assert_eq!(ticks, 10);
        assert_eq!(t.events().results.len(), 10);
    }

    #[test]
    fn test_clock_stepping_back_does_not_stall_cadence() {
        let clock = ManualClock::new(50_000.0);
        let mut t = loaded(&clock);
        let mut tone = Tone::new();
        assert!(feed(&mut t, &clock, &tone.chunk(64, 0.5, HOP_SAMPLES)).is_some());

        clock.set(1_000.0);
        assert!(feed(&mut t, &clock, &tone.chunk(64, 0.5, HOP_SAMPLES)).is_some());
        // Cadence continues from the new reading
        assert!(feed(&mut t, &clock, &tone.chunk(64, 0.5, HOP_SAMPLES)).is_some());
        clock.set(1_150.0);
        assert!(t.process_audio(&tone.chunk(64, 0.5, 160)).is_none());
        assert_eq!(t.events().results.len(), 3);
    }

    #[test]
    fn test_sustained_note_reports_one_onset() {
        let clock = ManualClock::new(0.0);
        let mut t = loaded(&clock);
        let mut tone = Tone::new();

        let first = feed(&mut t, &clock, &tone.chunk(60, 0.5, HOP_SAMPLES)).unwrap();
        assert!(first.active_notes.is_empty(), "single frame must not be trusted");

        let second = feed(&mut t, &clock, &tone.chunk(60, 0.5, HOP_SAMPLES)).unwrap();
        assert_eq!(second.new_onsets.len(), 1);
        let onset = &second.new_onsets[0];
        assert_eq!(onset.pitch, 60);
        assert_eq!(onset.note_name, "C4");
        assert_eq!(onset.timestamp, 0.0);
        assert!(onset.onset_probability > 0.5);

        for _ in 0..4 {
            let r = feed(&mut t, &clock, &tone.chunk(60, 0.5, HOP_SAMPLES)).unwrap();
            assert!(r.new_onsets.is_empty());
            assert_eq!(r.active_notes.len(), 1);
            assert_eq!(r.active_notes[0].onset_probability, 0.0);
        }
        assert_eq!(onset_pitches(&t.events().results), vec![60]);
        let last = t.events().results.last().unwrap();
        assert_eq!(last.active_notes[0].duration, 500.0);
    }

    #[test]
    fn test_note_after_silence_is_fresh_onset() {
        let clock = ManualClock::new(0.0);
        let mut t = loaded(&clock);
        let mut tone = Tone::new();
        let silence = vec![0.0; HOP_SAMPLES];

        for _ in 0..4 {
            feed(&mut t, &clock, &tone.chunk(60, 0.5, HOP_SAMPLES));
        }
        for _ in 0..3 {
            let r = feed(&mut t, &clock, &silence).unwrap();
            assert!(r.active_notes.is_empty());
        }
        assert!(t.history().is_empty());
        assert_eq!(t.last_pitch(), None);

        for _ in 0..3 {
            feed(&mut t, &clock, &tone.chunk(60, 0.5, HOP_SAMPLES));
        }
        assert_eq!(onset_pitches(&t.events().results), vec![60, 60]);
    }

    #[test]
    fn test_restrike_on_same_pitch_is_new_onset() {
        let clock = ManualClock::new(0.0);
        let mut t = loaded(&clock);
        let mut tone = Tone::new();

        for _ in 0..3 {
            feed(&mut t, &clock, &tone.chunk(67, 0.5, HOP_SAMPLES));
        }
        // Decay into a dip without going silent
        feed(&mut t, &clock, &tone.chunk(67, 0.05, HOP_SAMPLES));
        for _ in 0..2 {
            feed(&mut t, &clock, &tone.chunk(67, 0.5, HOP_SAMPLES));
        }
        assert_eq!(onset_pitches(&t.events().results), vec![67, 67]);
    }

    #[test]
    fn test_pitch_change_reports_each_note() {
        let clock = ManualClock::new(0.0);
        let mut t = loaded(&clock);
        let mut tone = Tone::new();

        for midi in [60, 64, 67, 60] {
            for _ in 0..3 {
                feed(&mut t, &clock, &tone.chunk(midi, 0.5, HOP_SAMPLES));
            }
        }
        assert_eq!(onset_pitches(&t.events().results), vec![60, 64, 67, 60]);
    }

    #[test]
    fn test_non_finite_input_degrades_tick_only() {
        let clock = ManualClock::new(0.0);
        let mut t = loaded(&clock);
        let mut tone = Tone::new();

        let mut bad = tone.chunk(60, 0.5, HOP_SAMPLES);
        bad[10] = f32::NAN;
        let r = feed(&mut t, &clock, &bad).unwrap();
        assert!(r.active_notes.is_empty());
        assert_eq!(t.status(), &TranscriberStatus::Ready);

        // Once the poisoned samples leave the window, detection resumes.
        for _ in 0..6 {
            feed(&mut t, &clock, &tone.chunk(60, 0.5, HOP_SAMPLES));
        }
        assert_eq!(onset_pitches(&t.events().results), vec![60]);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let clock = ManualClock::new(0.0);
        let mut t = loaded(&clock);
        let mut tone = Tone::new();
        for _ in 0..3 {
            feed(&mut t, &clock, &tone.chunk(60, 0.5, HOP_SAMPLES));
        }

        t.reset();
        let window_once = t.window().unwrap().to_vec();
        let history_once = t.history().len();
        t.reset();
        assert_eq!(t.window().unwrap().to_vec(), window_once);
        assert_eq!(t.history().len(), history_once);
        assert!(window_once.is_empty());
        assert_eq!(history_once, 0);
        assert_eq!(t.last_pitch(), None);
        assert_eq!(t.status(), &TranscriberStatus::Ready);

        // First chunk after reset runs immediately
        assert!(t.process_audio(&tone.chunk(60, 0.5, HOP_SAMPLES)).is_some());
    }

    #[test]
    fn test_dispose_releases_window() {
        let clock = ManualClock::new(0.0);
        let mut t = loaded(&clock);
        t.dispose();
        assert!(t.window().is_none());
        assert_eq!(t.status(), &TranscriberStatus::Unloaded);
        assert!(t.process_audio(&[0.2; 100]).is_none());
    }
}
