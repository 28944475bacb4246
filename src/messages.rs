//! Wire form of the message channel between the host and a presentation surface.
use serde::{Deserialize, Serialize};

use crate::{diagnostics::LogLevel, theme::ThemeInfo};

/// Surface to host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum SurfaceMessage {
    OpenWikiLink {
        href: String,
    },
    OpenExternalLink {
        href: String,
    },
    ConsoleLog {
        message: String,
        #[serde(default)]
        level: LogLevel,
        #[serde(default = "default_source")]
        source: String,
    },
}

fn default_source() -> String {
    crate::diagnostics::SURFACE_SOURCE.to_string()
}

/// Host to surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum HostMessage {
    ScrollToAnchor { anchor: String },
    UpdateTheme { theme: ThemeInfo },
}

impl HostMessage {
    pub fn to_json(&self) -> Result<String, crate::error::ViewerError> {
        Ok(serde_json::to_string(self)?)
    }
}
