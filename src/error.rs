use thiserror::Error;

use crate::transcription::types::TranscriberStatus;

/// Errors surfaced by the transcription and matching engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("transcriber is not ready (status: {0:?})")]
    NotReady(TranscriberStatus),

    #[error("non-finite sample at window index {index}")]
    NonFiniteInput { index: usize },

    #[error("musicxml: {0}")]
    MusicXml(String),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
