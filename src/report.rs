//! Human and assistant oriented reports built from recorded renderer failures.
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::diagnostics::ConsoleEntry;

pub const DEFAULT_EXCERPT_CHARS: usize = 200;
pub const NO_ERRORS_REPORT: &str = "No Mermaid errors detected.";
pub const NO_ERRORS_HELP: &str = "No Mermaid rendering errors to fix.";

/// Payload the client script posts for one failed diagram.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererError {
    #[serde(default)]
    pub diagram_index: Option<i64>,
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererFailure {
    Parsed(RendererError),
    Unparsed(String),
}

impl RendererFailure {
    pub fn parse(message: &str) -> RendererFailure {
        match serde_json::from_str::<RendererError>(message) {
            Ok(error) => RendererFailure::Parsed(error),
            Err(e) => {
                tracing::debug!("Keeping unparseable renderer diagnostic as raw text: {}", e);
                RendererFailure::Unparsed(message.to_string())
            }
        }
    }

    pub fn from_entries<'a, I>(entries: I) -> Vec<RendererFailure>
    where
        I: IntoIterator<Item = &'a ConsoleEntry>,
    {
        entries
            .into_iter()
            .filter(|e| e.is_renderer_error())
            .map(|e| RendererFailure::parse(&e.message))
            .collect()
    }

    fn parsed(&self) -> Option<&RendererError> {
        match self {
            RendererFailure::Parsed(error) => Some(error),
            RendererFailure::Unparsed(_) => None,
        }
    }
}

fn diagram_label(error: &RendererError) -> String {
    error
        .diagram_index
        .map(|i| i.to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn excerpt(code: &str, max_chars: usize) -> String {
    match code.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &code[..cut]),
        None => code.to_string(),
    }
}

/// Summary of every parseable renderer failure, with source excerpts.
pub fn compose_report(failures: &[RendererFailure], excerpt_chars: usize) -> String {
    let errors: Vec<&RendererError> = failures.iter().filter_map(RendererFailure::parsed).collect();
    if errors.is_empty() {
        return NO_ERRORS_REPORT.to_string();
    }
    let mut report = String::from("# Mermaid Error Report\n\n");
    let _ = write!(report, "Found {} error(s):\n\n", errors.len());
    for (i, error) in errors.iter().enumerate() {
        let _ = writeln!(report, "## Error {}", i + 1);
        let _ = writeln!(report, "- **Diagram:** #{}", diagram_label(error));
        let _ = writeln!(report, "- **Error:** {}", error.error);
        if let Some(file_path) = &error.file_path {
            let _ = writeln!(report, "- **File:** {file_path}");
        }
        let _ = write!(
            report,
            "- **Code Length:** {} characters\n\n",
            error.code.chars().count()
        );
        let _ = write!(
            report,
            "```mermaid\n{}\n```\n\n",
            excerpt(&error.code, excerpt_chars)
        );
    }
    report
}

/// Narrative request asking an assistant to diagnose the rendering pipeline.
pub fn compose_help_request(failures: &[RendererFailure]) -> String {
    let errors: Vec<&RendererError> = failures.iter().filter_map(RendererFailure::parsed).collect();
    if errors.is_empty() {
        return NO_ERRORS_HELP.to_string();
    }
    let total = errors.len();
    let mut prompt = format!(
        "I have {total} Mermaid diagram rendering error(s) in my documentation viewer that need to be fixed. \
         The issue is with the RENDERING LOGIC of the viewer, NOT the Mermaid diagrams themselves.\n\n"
    );
    prompt.push_str(
        "Please analyze the errors and help fix the markdown processing or rendering code that's causing these diagrams to fail.\n\n",
    );
    for (i, error) in errors.iter().enumerate() {
        let _ = write!(prompt, "## Rendering Error {} of {}\n\n", i + 1, total);
        let _ = writeln!(prompt, "**Diagram Index:** {}", diagram_label(error));
        if let Some(file_path) = &error.file_path {
            let _ = writeln!(prompt, "**Document:** {file_path}");
        }
        let _ = write!(prompt, "**Error Message:** {}\n\n", error.error);
        if let Some(stack) = error.stack.as_deref().filter(|s| !s.is_empty()) {
            let _ = write!(prompt, "**Stack Trace:**\n```\n{stack}\n```\n\n");
        }
        let _ = write!(
            prompt,
            "**Mermaid Code (for reference):**\n```mermaid\n{}\n```\n\n",
            error.code
        );
        prompt.push_str("---\n\n");
    }
    prompt.push_str("\nPlease help with:\n");
    prompt.push_str("1. Identifying what's wrong with the markdown conversion or page assembly\n");
    prompt.push_str("2. Suggesting fixes to the markdown processing or HTML generation code\n");
    prompt.push_str("3. Ensuring the Mermaid integration works correctly with the presentation surface\n");
    prompt.push_str(
        "\nNote: The Mermaid diagrams themselves are correct - the issue is in how the viewer processes and renders them.\n",
    );
    prompt
}

/// Plain listing of every renderer failure. Unparseable payloads are shown verbatim.
pub fn compose_error_listing(failures: &[RendererFailure]) -> String {
    failures
        .iter()
        .enumerate()
        .map(|(i, failure)| match failure {
            RendererFailure::Parsed(error) => format!(
                "\n=== Mermaid Error {} ===\nDiagram Index: {}\nError: {}\nStack: {}\n\nDiagram Code:\n{}\n\n==========================================\n",
                i + 1,
                diagram_label(error),
                error.error,
                error.stack.as_deref().filter(|s| !s.is_empty()).unwrap_or("N/A"),
                error.code
            ),
            RendererFailure::Unparsed(raw) => raw.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tracks the renderer-error count between polls.
#[derive(Debug, Clone, Default)]
pub struct ErrorMonitor {
    last_count: usize,
}

impl ErrorMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a notification when the count grew since the previous check.
    pub fn check(&mut self, count: usize) -> Option<String> {
        let previous = std::mem::replace(&mut self.last_count, count);
        (count > previous).then(|| {
            format!(
                "Detected {} new Mermaid rendering error(s).",
                count - previous
            )
        })
    }
}
