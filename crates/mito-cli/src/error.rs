use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] mito_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Comment content cannot be empty")]
    EmptyContent,
    #[error("Nothing to update: pass at least one field")]
    EmptyUpdate,
    #[error("Invalid field assignment '{0}' (expected KEY=VALUE)")]
    InvalidAssignment(String),
    #[error("Realtime connection could not be established")]
    RealtimeUnavailable,
}

impl CliError {
    /// Text shown to the user on failure.
    ///
    /// Backend and connectivity failures use the short banner text from
    /// `mito-core`; everything else prints the full error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Core(error) => match error {
                mito_core::Error::InvalidConfiguration(_)
                | mito_core::Error::Storage(_)
                | mito_core::Error::Io(_)
                | mito_core::Error::Serialization(_) => error.to_string(),
                _ => error.user_message(),
            },
            other => other.to_string(),
        }
    }
}
