use std::{fmt, io, path::StripPrefixError};

use http::status::StatusCode;
use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

#[cfg(feature = "service")]
use notify::{Error as NotifyError, ErrorKind as NotifyErrorKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum ViewerError {
    #[error("Markdown/HTML codec error: {0}")]
    Codec(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("Host capability error: {0}")]
    Host(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Operation cancelled")]
    OperationCancelled,
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("\"{step}\" failed with code {}", exit_code_label(.code))]
    Workflow { step: String, code: Option<i32> },
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl ViewerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ViewerError::Codec(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ViewerError::Custom(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ViewerError::Host(_) => StatusCode::BAD_GATEWAY,
            ViewerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ViewerError::NotFound(_) => StatusCode::NOT_FOUND,
            ViewerError::OperationCancelled => StatusCode::NO_CONTENT,
            ViewerError::PermissionDenied => StatusCode::FORBIDDEN,
            ViewerError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ViewerError::Workflow { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StripPrefixError> for ViewerError {
    fn from(src: StripPrefixError) -> ViewerError {
        ViewerError::NotFound(format!("Strip prefix failed for path. Error: {src}"))
    }
}

impl From<toml::de::Error> for ViewerError {
    fn from(src: toml::de::Error) -> ViewerError {
        ViewerError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for ViewerError {
    fn from(src: toml::ser::Error) -> ViewerError {
        ViewerError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for ViewerError {
    fn from(src: JsonError) -> ViewerError {
        ViewerError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<UrlParseError> for ViewerError {
    fn from(src: UrlParseError) -> ViewerError {
        ViewerError::Serialization(format!("Invalid URL: {src}"))
    }
}

impl From<io::Error> for ViewerError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => ViewerError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => ViewerError::PermissionDenied,
            _ => ViewerError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for ViewerError {
    fn from(x: fmt::Error) -> Self {
        ViewerError::Codec(format!("{x}"))
    }
}

impl From<RegexError> for ViewerError {
    fn from(x: RegexError) -> Self {
        ViewerError::Serialization(format!("Regex parse failed: {x}"))
    }
}

#[cfg(feature = "service")]
impl From<NotifyError> for ViewerError {
    fn from(notify_error: NotifyError) -> Self {
        match notify_error.kind {
            NotifyErrorKind::Generic(msg) => ViewerError::Custom(format!(
                "notify-debouncer: {}, paths: {:?}",
                msg, notify_error.paths
            )),
            NotifyErrorKind::Io(io_error) => ViewerError::Io(format!(
                "notify-debouncer: io error {}, paths: {:?}",
                io_error.kind(),
                notify_error.paths
            )),
            NotifyErrorKind::PathNotFound => ViewerError::NotFound(format!(
                "notify-debouncer: path(s) not found: {:?}",
                notify_error.paths
            )),
            NotifyErrorKind::WatchNotFound => ViewerError::NotFound(format!(
                "notify-debouncer: watch not found, paths: {:?}",
                notify_error.paths
            )),
            NotifyErrorKind::InvalidConfig(_) => {
                ViewerError::Custom("notify-debouncer invalid config".to_string())
            }
            NotifyErrorKind::MaxFilesWatch => {
                ViewerError::Custom("notify-debouncer max file watch limit reached".to_string())
            }
        }
    }
}
