use thiserror::Error;

#[derive(Error, Debug)]
pub enum LxError {
    #[error("note not found: {0}")]
    NoteNotFound(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("graph error: {0}")]
    Graph(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("rebuild already in progress")]
    RebuildInProgress,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LxError {
    /// Whether a caller can expect a retry to succeed without intervention.
    /// A snapshot mid-rebuild is transient; a broken store is not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RebuildInProgress | Self::NoteNotFound(_))
    }
}

pub type LxResult<T> = Result<T, LxError>;
