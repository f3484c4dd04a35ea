use std::io;

use thiserror::Error;
use tracing_error::SpanTrace;

#[derive(Debug, Error)]
#[error("error: {kind}\n{span}")]
pub struct Error {
    pub(crate) kind: Box<ErrorKind>,
    pub(crate) span: SpanTrace,
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::from(ErrorKind::from(err))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind: kind.into(),
            span: SpanTrace::capture(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("unexpected I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected internal error: {0}")]
    Internal(String),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid log filter: {0}")]
    LogFilter(String),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::from(ErrorKind::from(err))
    }
}

#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum ConfigError {
    #[error("deserializing TOML content: {0}")]
    Toml(#[from] toml::de::Error),
}
