use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// Malformed archive container; aborts the whole load.
    Format(&'static str),
    /// A single entry uses a compression method this reader does not handle.
    /// Other entries in the same archive remain usable.
    Unsupported { path: String, method: u16 },
    NotFound(String),
    Download(String),
    /// Duplicate page URL discovered while building the route table.
    Conflict(String),
    Codec(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Format(msg) => write!(f, "malformed archive: {msg}"),
            Error::Unsupported { path, method } => {
                write!(f, "unsupported compression method {method} for entry {path}")
            }
            Error::NotFound(what) => write!(f, "not found: {what}"),
            Error::Download(msg) => write!(f, "download failed: {msg}"),
            Error::Conflict(url) => write!(f, "duplicate page url: {url}"),
            Error::Codec(msg) => write!(f, "codec error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
