use thiserror::Error;

/// Failures the subsystem can hit. All of them are recovered locally: a
/// fetch or parse failure degrades the affected store to an empty or
/// previous-known-good snapshot and is logged, never surfaced to the
/// interactive caller. A missing id on delete/mark-read is a no-op, not an
/// error, so it has no variant here.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("remote service request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
