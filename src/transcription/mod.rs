pub mod envelope;
pub mod persistence;
pub mod transcriber;
pub mod types;
pub mod window;

pub use transcriber::{Transcriber, TranscriberEvents, SILENCE_FRAMES_FOR_RESET};
pub use types::{TranscribedNote, TranscriberConfig, TranscriberStatus, TranscriptionResult};
