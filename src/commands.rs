use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
};

use crate::theme::HostColorScheme;

/// User-invocable viewer operations, dispatched through [`crate::viewer::Viewer::execute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Drop cached tree data and re-query from the root; open panels are re-rendered.
    Refresh,
    OpenFile(PathBuf),
    /// All recorded console output, one formatted entry per line.
    ShowDebugOutput,
    ShowRendererErrors,
    ClearDebugOutput,
    ShowErrorReport,
    /// Assistant-oriented narrative of the renderer errors, for the clipboard.
    CopyHelpRequest,
    SetColorScheme(HostColorScheme),
    /// Poll the renderer-error count once.
    CheckRendererErrors,
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Command::Refresh => write!(f, "Refresh"),
            Command::OpenFile(path) => write!(f, "OpenFile({})", path.display()),
            Command::ShowDebugOutput => write!(f, "ShowDebugOutput"),
            Command::ShowRendererErrors => write!(f, "ShowRendererErrors"),
            Command::ClearDebugOutput => write!(f, "ClearDebugOutput"),
            Command::ShowErrorReport => write!(f, "ShowErrorReport"),
            Command::CopyHelpRequest => write!(f, "CopyHelpRequest"),
            Command::SetColorScheme(scheme) => write!(f, "SetColorScheme({scheme:?})"),
            Command::CheckRendererErrors => write!(f, "CheckRendererErrors"),
        }
    }
}

/// What the host should present after a [`Command`] ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    Ok,
    /// A read-only text document, e.g. a log dump.
    Document { content: String, language: String },
    /// Text for the clipboard, also worth showing.
    Clipboard(String),
    /// An informational notification.
    Message(String),
}

impl CommandOutcome {
    pub fn log_document(content: String) -> Self {
        CommandOutcome::Document {
            content,
            language: "log".to_string(),
        }
    }

    pub fn markdown_document(content: String) -> Self {
        CommandOutcome::Document {
            content,
            language: "markdown".to_string(),
        }
    }
}

impl Display for CommandOutcome {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CommandOutcome::Ok => write!(f, "Ok"),
            CommandOutcome::Document { content, language } => {
                write!(f, "Document({language}, {} bytes)", content.len())
            }
            CommandOutcome::Clipboard(text) => write!(f, "Clipboard({} bytes)", text.len()),
            CommandOutcome::Message(message) => write!(f, "Message({message})"),
        }
    }
}
