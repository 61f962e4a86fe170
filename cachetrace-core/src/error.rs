use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Connection Error - {0}")]
    Connection(String),

    #[error("Transport Error - {0}")]
    // any individual store command that failed mid-call
    Transport(String),

    #[error("Decode Error - {0}")]
    Decode(String),

    #[error("ParseConfig Error - {0}")]
    ParseConfig(String),

    #[error("InvalidOperation Error - {0}")]
    InvalidOperation(String),
}

impl From<redis::RedisError> for Error {
    fn from(value: redis::RedisError) -> Self {
        if value.is_connection_refusal() || value.is_connection_dropped() {
            Error::Connection(value.to_string())
        } else {
            Error::Transport(value.to_string())
        }
    }
}
