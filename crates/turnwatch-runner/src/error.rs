//! Error types for the runner binary.
//!
//! Per-cycle failures (fetch, summarizer, delivery) are typed in
//! `turnwatch-core` and contained inside a cycle. The errors here are the
//! startup ones that stop the process before the loop begins.

use turnwatch_core::capability::NameTableError;

/// Errors raised while assembling the runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The `PLAYER_NAMES` table could not be parsed.
    #[error("invalid PLAYER_NAMES: {0}")]
    Names(#[from] NameTableError),

    /// A prompt template could not be loaded or compiled.
    #[error("template error: {0}")]
    Template(String),

    /// An HTTP client could not be built.
    #[error("http client error: {0}")]
    Http(String),
}
