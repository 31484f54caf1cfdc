//! Error types for the IRC client engine

use thiserror::Error;

/// Main error type for the IRC client engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The socket could not be opened (refused, unreachable, TLS handshake failed)
    #[error("{0}")]
    Connection(String),

    /// A reconnect was requested from a state that does not allow one
    #[error("{0}")]
    Reconnection(String),

    /// Mandatory connection parameters were missing
    #[error("{0}")]
    Instantiation(String),

    /// Reading from an established connection failed
    #[error("{0}")]
    IncomingTransmission(String),

    /// Writing to an established connection failed
    #[error("{description}")]
    OutgoingTransmission {
        description: String,
        /// The line that could not be delivered
        message: String,
    },

    /// Polling the socket for readiness failed
    #[error("{0}")]
    SocketPoll(String),

    /// A line violated the structural expectations of the parser
    #[error("{0}")]
    Protocol(String),

    /// Server data was well-formed but could not be applied
    #[error("{0}")]
    Processing(String),

    /// The operation targeted a resource that has already been closed
    #[error("{0}")]
    InvalidState(String),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error came from the socket layer after the connection was up
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::IncomingTransmission(_)
                | Error::OutgoingTransmission { .. }
                | Error::SocketPoll(_)
                | Error::InvalidState(_)
        )
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Generic(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}
