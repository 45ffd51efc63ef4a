use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CollectorError {
    #[error("could not extract an OSF project id from: {0}")]
    InvalidProjectUrl(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read seed file at {path}: {reason}")]
    #[diagnostic(help("pass --input with a file holding one OSF url or id per line"))]
    SeedRead { path: Utf8PathBuf, reason: String },

    #[error("OSF request failed: {0}")]
    OsfHttp(String),

    #[error("OSF request could not be sent: {0}")]
    OsfRequest(String),

    #[error("OSF returned status {status}: {message}")]
    OsfStatus { status: u16, message: String },

    #[error("OSF response could not be decoded: {0}")]
    OsfDecode(String),

    #[error("no endpoint shape matched {project_id}: {}", .attempts.join("; "))]
    Unresolved {
        project_id: String,
        attempts: Vec<String>,
    },

    #[error("checkpoint at {path} is unreadable: {reason}")]
    #[diagnostic(help(
        "fix or remove the checkpoint file; the run will not silently restart from zero"
    ))]
    CheckpointCorrupt { path: Utf8PathBuf, reason: String },

    #[error("checkpoint does not match the seed file: {0}")]
    #[diagnostic(help("the seed file was edited or reordered since the checkpoint was written"))]
    CheckpointMismatch(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl CollectorError {
    /// Timeouts, dropped connections, throttling and 5xx answers; worth
    /// another attempt after a backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            CollectorError::OsfHttp(_) => true,
            CollectorError::OsfStatus { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}
