/// Core error type for the note service.
///
/// Adapter crates should map their specific errors into this type so the
/// application core can handle failures consistently (user-facing message vs
/// retryable).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// Deliberately carries no detail: every decode and validation failure
    /// looks identical to callers, so the web layer can only ever answer 404.
    #[error("invalid or expired token")]
    Token,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
