use serde::Serialize;

use crate::clock::Clock;
use crate::error::Result;
use crate::matching::{MatchEvents, MatcherConfig, MelodyItem, MelodyMatchState, MelodyMatcher, MelodyNote};
use crate::transcription::{
    TranscribedNote, Transcriber, TranscriberConfig, TranscriberEvents, TranscriberStatus,
    TranscriptionResult,
};

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StatusChanged { status: TranscriberStatus },
    NoteMatched { note: MelodyNote, detected: TranscribedNote },
    MelodyComplete,
}

/// Buffers engine callbacks until the host collects them.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<SessionEvent>,
    latest_state: Option<MelodyMatchState>,
}

impl EventLog {
    pub fn drain(&mut self) -> (Vec<SessionEvent>, Option<MelodyMatchState>) {
        (std::mem::take(&mut self.events), self.latest_state.take())
    }
}

impl TranscriberEvents for EventLog {
    fn on_status_change(&mut self, status: &TranscriberStatus) {
        self.events.push(SessionEvent::StatusChanged {
            status: status.clone(),
        });
    }
}

impl MatchEvents for EventLog {
    fn on_note_matched(&mut self, note: &MelodyNote, detected: &TranscribedNote) {
        self.events.push(SessionEvent::NoteMatched {
            note: note.clone(),
            detected: detected.clone(),
        });
    }

    fn on_melody_complete(&mut self) {
        self.events.push(SessionEvent::MelodyComplete);
    }

    fn on_state_change(&mut self, state: &MelodyMatchState) {
        self.latest_state = Some(state.clone());
    }
}

/// Everything that happened during one host call.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct SessionUpdate {
    pub transcription: Option<TranscriptionResult>,
    pub events: Vec<SessionEvent>,
    /// Present when the match state changed.
    pub state: Option<MelodyMatchState>,
}

/// A transcriber wired to a matcher: each tick's new onsets are matched
/// against the melody.
pub struct PracticeSession<C: Clock> {
    transcriber: Transcriber<C, EventLog>,
    matcher: MelodyMatcher<C, EventLog>,
}

impl<C: Clock + Clone> PracticeSession<C> {
    pub fn new(transcriber_config: TranscriberConfig, matcher_config: MatcherConfig, clock: C) -> Self {
        PracticeSession {
            transcriber: Transcriber::new(transcriber_config, clock.clone(), EventLog::default()),
            matcher: MelodyMatcher::new(matcher_config, clock, EventLog::default()),
        }
    }
}

impl<C: Clock> PracticeSession<C> {
    pub fn transcriber(&self) -> &Transcriber<C, EventLog> {
        &self.transcriber
    }

    pub fn matcher(&self) -> &MelodyMatcher<C, EventLog> {
        &self.matcher
    }

    pub fn status(&self) -> &TranscriberStatus {
        self.transcriber.status()
    }

    pub fn state(&self) -> MelodyMatchState {
        self.matcher.state()
    }

    /// Load the transcriber. Status events are reported even on failure,
    /// and can be collected with the next update.
    pub fn load(&mut self) -> Result<SessionUpdate> {
        self.transcriber.load()?;
        Ok(self.collect(None))
    }

    pub fn set_transcriber_config(&mut self, config: TranscriberConfig) -> SessionUpdate {
        self.transcriber.set_config(config);
        self.collect(None)
    }

    /// Returns `None` when the samples did not complete an inference tick.
    pub fn feed(&mut self, samples: &[f32]) -> Option<SessionUpdate> {
        let transcription = self.transcriber.process_audio(samples)?;
        if !transcription.new_onsets.is_empty() {
            self.matcher.process_detected_notes(&transcription.new_onsets);
        }
        Some(self.collect(Some(transcription)))
    }

    pub fn set_melody(&mut self, items: &[MelodyItem]) -> SessionUpdate {
        self.matcher.set_melody(items);
        self.collect(None)
    }

    pub fn set_melody_notes(&mut self, notes: Vec<MelodyNote>) -> SessionUpdate {
        self.matcher.set_melody_notes(notes);
        self.collect(None)
    }

    /// Forget buffered audio and restart the melody.
    pub fn reset(&mut self) -> SessionUpdate {
        self.transcriber.reset();
        self.matcher.reset();
        self.collect(None)
    }

    pub fn dispose(&mut self) -> SessionUpdate {
        self.transcriber.dispose();
        self.collect(None)
    }

    fn collect(&mut self, transcription: Option<TranscriptionResult>) -> SessionUpdate {
        let (mut events, _) = self.transcriber.events_mut().drain();
        let (match_events, state) = self.matcher.events_mut().drain();
        events.extend(match_events);
        SessionUpdate {
            transcription,
            events,
            state,
        }
    }
}
