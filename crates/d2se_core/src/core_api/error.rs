use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    Io,
    Parse,
    InvalidInput,
    UnsupportedOperation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Map a codec error onto the caller-facing kinds.
    pub(crate) fn from_codec(context: &str, error: io::Error) -> Self {
        let code = match error.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => CoreErrorCode::Parse,
            io::ErrorKind::InvalidInput => CoreErrorCode::InvalidInput,
            _ => CoreErrorCode::Io,
        };
        Self::new(code, format!("{context}: {error}"))
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for CoreError {}
