use std::path::PathBuf;

/// Errors raised by content sources, the archive and email delivery.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed parse error: {0}")]
    Feed(String),
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("client setup failed: {0}")]
    Client(String),
    #[error("missing API key; set {0}")]
    MissingApiKey(&'static str),
    #[error("email error: {0}")]
    Email(String),
    #[error("invalid email address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when an HTTP request gave up waiting.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}
