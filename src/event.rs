use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::diagnostics::LogLevel;

/// Notifications the viewer raises for its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewerEvent {
    /// A generation step started; carries the progress message.
    GenerationProgress(String),
    /// One line of generator output.
    GenerationOutput { line: String, stderr: bool },
    GenerationFinished,
    /// Failure message, e.g. `"uv venv" failed with code 1`.
    GenerationFailed(String),
    /// Reason shown to the user.
    GenerationCancelled(String),
    /// The tree must be re-queried from the root.
    TreeChanged,
    Notification { level: LogLevel, message: String },
}

impl ViewerEvent {
    pub fn info<M: Into<String>>(message: M) -> Self {
        ViewerEvent::Notification {
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    pub fn warn<M: Into<String>>(message: M) -> Self {
        ViewerEvent::Notification {
            level: LogLevel::Warn,
            message: message.into(),
        }
    }
}

impl Display for ViewerEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ViewerEvent::GenerationProgress(message) => write!(f, "GenerationProgress({message})"),
            ViewerEvent::GenerationOutput { stderr, .. } => {
                write!(f, "GenerationOutput(stderr: {stderr})")
            }
            ViewerEvent::GenerationFinished => write!(f, "GenerationFinished"),
            ViewerEvent::GenerationFailed(message) => write!(f, "GenerationFailed({message})"),
            ViewerEvent::GenerationCancelled(reason) => write!(f, "GenerationCancelled({reason})"),
            ViewerEvent::TreeChanged => write!(f, "TreeChanged"),
            ViewerEvent::Notification { level, .. } => write!(f, "Notification({level})"),
        }
    }
}
