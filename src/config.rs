//! Viewer settings and the wiki directory layout.
//!
//! Settings are read from a TOML file through a [`ConfigProvider`]. Every field has a default,
//! so a missing file or a partial file is valid:
//!
//! ```toml
//! [wiki]
//! dir_name = ".codewiki"
//! sanitize_html = false
//!
//! [diagram]
//! theme = "auto"          # or any renderer theme name, e.g. "forest"
//! max_init_attempts = 3
//!
//! [diagnostics]
//! max_entries = 1000
//! ```
use crate::error::ViewerError;
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

/// Value of [`DiagramSettings::theme`] that follows the host colour scheme.
pub const AUTO_THEME: &str = "auto";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WikiSettings {
    /// Name of the generated wiki directory inside the workspace root.
    pub dir_name: String,
    /// Home page, shown as the synthetic "Overview" tree entry.
    pub overview_file: String,
    /// Structured module description.
    pub module_tree_file: String,
    /// Escape raw HTML in documents instead of passing it through.
    pub sanitize_html: bool,
}

impl Default for WikiSettings {
    fn default() -> Self {
        WikiSettings {
            dir_name: ".codewiki".to_string(),
            overview_file: "overview.md".to_string(),
            module_tree_file: "module_tree.json".to_string(),
            sanitize_html: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramSettings {
    /// [`AUTO_THEME`] or an explicit renderer theme name.
    pub theme: String,
    /// Network-hosted renderer library, used when the bundled copy fails to load.
    pub cdn_url: String,
    pub max_init_attempts: u32,
    pub init_retry_delay_ms: u64,
}

impl Default for DiagramSettings {
    fn default() -> Self {
        DiagramSettings {
            theme: AUTO_THEME.to_string(),
            cdn_url: "https://cdn.jsdelivr.net/npm/mermaid@11.12.1/dist/mermaid.min.js"
                .to_string(),
            max_init_attempts: 3,
            init_retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSettings {
    /// Retention bound of the diagnostics log.
    pub max_entries: usize,
    /// Source excerpt length in the error report.
    pub excerpt_chars: usize,
    pub auto_monitor: bool,
    pub monitor_interval_ms: u64,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        DiagnosticsSettings {
            max_entries: 1000,
            excerpt_chars: 200,
            auto_monitor: false,
            monitor_interval_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// The documentation generator executable, resolved inside the virtual environment.
    pub program: String,
    pub venv_dir: String,
    /// Shortest API key accepted from the credential prompt.
    pub min_api_key_len: usize,
    /// Pause between a successful run and the tree refresh.
    pub settle_delay_ms: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        GeneratorSettings {
            program: "codewiki".to_string(),
            venv_dir: ".venv".to_string(),
            min_api_key_len: 10,
            settle_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub wiki: WikiSettings,
    pub diagram: DiagramSettings,
    pub diagnostics: DiagnosticsSettings,
    pub generator: GeneratorSettings,
}

pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<ViewerConfig, ViewerError>;
    fn save(&self, config: &ViewerConfig) -> Result<(), ViewerError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn load(&self) -> Result<ViewerConfig, ViewerError> {
        tracing::debug!("Attempting to read viewer config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(ViewerConfig::default());
        }
        let content = read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn save(&self, config: &ViewerConfig) -> Result<(), ViewerError> {
        tracing::debug!("Attempting to write viewer config to: {:?}", &self.path);
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}

/// Resolved locations of the wiki inside one workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLayout {
    pub workspace_root: PathBuf,
    pub wiki_root: PathBuf,
    pub overview: PathBuf,
    pub module_tree: PathBuf,
}

impl WikiLayout {
    pub fn new<P: AsRef<Path>>(workspace_root: P, settings: &WikiSettings) -> Self {
        let workspace_root = workspace_root.as_ref().to_path_buf();
        let wiki_root = workspace_root.join(&settings.dir_name);
        WikiLayout {
            overview: wiki_root.join(&settings.overview_file),
            module_tree: wiki_root.join(&settings.module_tree_file),
            workspace_root,
            wiki_root,
        }
    }

}

pub fn get_content<P: AsRef<Path>>(path: P) -> Result<String, ViewerError> {
    tracing::debug!("Reading {:?}", path.as_ref());
    Ok(read_to_string(path)?)
}
