//! Bounded store of console output forwarded from presentation surfaces.
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt, sync::Arc};

/// Source tag used by the client script for diagram rendering failures.
pub const RENDERER_SOURCE: &str = "mermaid";
pub const SURFACE_SOURCE: &str = "webview";
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum LogLevel {
    #[default]
    Log,
    Info,
    Warn,
    Error,
}

impl From<String> for LogLevel {
    fn from(level: String) -> Self {
        LogLevel::from(level.as_str())
    }
}

impl From<&str> for LogLevel {
    fn from(level: &str) -> Self {
        match level.to_ascii_lowercase().as_str() {
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Log,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Log => "LOG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: LogLevel,
    pub source: String,
}

impl ConsoleEntry {
    pub fn new<M: Into<String>, S: Into<String>>(message: M, level: LogLevel, source: S) -> Self {
        ConsoleEntry {
            timestamp: Utc::now(),
            message: message.into(),
            level,
            source: source.into(),
        }
    }

    pub fn is_renderer_error(&self) -> bool {
        self.source == RENDERER_SOURCE && self.level == LogLevel::Error
    }

    /// Parse one line previously produced by the [`fmt::Display`] impl.
    pub fn parse_line(line: &str) -> Option<ConsoleEntry> {
        let (timestamp, rest) = bracketed(line)?;
        let (level, rest) = bracketed(rest)?;
        let (source, message) = bracketed(rest)?;
        Some(ConsoleEntry {
            timestamp: DateTime::parse_from_rfc3339(timestamp)
                .ok()?
                .with_timezone(&Utc),
            message: message.to_string(),
            level: LogLevel::from(level),
            source: source.to_string(),
        })
    }
}

fn bracketed(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start().strip_prefix('[')?;
    let end = text.find(']')?;
    Some((&text[..end], text[end + 1..].strip_prefix(' ').unwrap_or(&text[end + 1..])))
}

impl fmt::Display for ConsoleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] [{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level,
            self.source,
            self.message
        )
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticsLog {
    entries: VecDeque<ConsoleEntry>,
    max_entries: usize,
}

impl Default for DiagnosticsLog {
    fn default() -> Self {
        DiagnosticsLog::new(DEFAULT_MAX_ENTRIES)
    }
}

pub type SharedDiagnostics = Arc<Mutex<DiagnosticsLog>>;

impl DiagnosticsLog {
    pub fn new(max_entries: usize) -> Self {
        DiagnosticsLog {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn shared(max_entries: usize) -> SharedDiagnostics {
        Arc::new(Mutex::new(DiagnosticsLog::new(max_entries)))
    }

    pub fn record<M: Into<String>, S: Into<String>>(
        &mut self,
        message: M,
        level: LogLevel,
        source: S,
    ) {
        self.push(ConsoleEntry::new(message, level, source));
    }

    pub fn push(&mut self, entry: ConsoleEntry) {
        match entry.level {
            LogLevel::Error => tracing::error!("[{}] {}", entry.source, entry.message),
            LogLevel::Warn => tracing::warn!("[{}] {}", entry.source, entry.message),
            LogLevel::Info | LogLevel::Log => {
                tracing::info!("[{}] {}", entry.source, entry.message)
            }
        }
        self.entries.push_back(entry);
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    fn formatted_where<F: Fn(&ConsoleEntry) -> bool>(&self, keep: F) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| keep(e))
            .map(ToString::to_string)
            .collect()
    }

    pub fn by_level(&self, level: LogLevel) -> Vec<String> {
        self.formatted_where(|e| e.level == level)
    }

    pub fn by_source(&self, source: &str) -> Vec<String> {
        self.formatted_where(|e| e.source == source)
    }

    pub fn renderer_errors(&self) -> Vec<String> {
        self.formatted_where(ConsoleEntry::is_renderer_error)
    }

    pub fn renderer_error_entries(&self) -> Vec<&ConsoleEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_renderer_error())
            .collect()
    }

    pub fn formatted(&self) -> Vec<String> {
        self.formatted_where(|_| true)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConsoleEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
