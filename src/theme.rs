//! Host colour scheme to diagram theme mapping.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{DiagramSettings, AUTO_THEME};

/// The colour scheme reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostColorScheme {
    Light,
    #[default]
    Dark,
    HighContrast,
    HighContrastLight,
}

impl HostColorScheme {
    pub fn is_dark(self) -> bool {
        matches!(self, HostColorScheme::Dark | HostColorScheme::HighContrast)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThemeKind {
    Light,
    Dark,
    HighContrast,
}

impl From<HostColorScheme> for ThemeKind {
    fn from(scheme: HostColorScheme) -> Self {
        match scheme {
            HostColorScheme::Light => ThemeKind::Light,
            HostColorScheme::Dark => ThemeKind::Dark,
            HostColorScheme::HighContrast | HostColorScheme::HighContrastLight => {
                ThemeKind::HighContrast
            }
        }
    }
}

/// Snapshot handed to the presentation surface, in its wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeInfo {
    pub kind: ThemeKind,
    pub diagram_theme: String,
    pub css_variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeMapper {
    preference: String,
}

impl Default for ThemeMapper {
    fn default() -> Self {
        ThemeMapper {
            preference: AUTO_THEME.to_string(),
        }
    }
}

impl ThemeMapper {
    pub fn new(settings: &DiagramSettings) -> Self {
        ThemeMapper {
            preference: settings.theme.clone(),
        }
    }

    pub fn theme_for(&self, scheme: HostColorScheme) -> ThemeInfo {
        let diagram_theme = if self.preference.trim().is_empty() || self.preference == AUTO_THEME
        {
            diagram_theme_for(scheme).to_string()
        } else {
            self.preference.clone()
        };
        ThemeInfo {
            kind: scheme.into(),
            diagram_theme,
            css_variables: css_variables_for(scheme),
        }
    }
}

fn diagram_theme_for(scheme: HostColorScheme) -> &'static str {
    match scheme {
        HostColorScheme::Light | HostColorScheme::HighContrastLight => "default",
        HostColorScheme::Dark | HostColorScheme::HighContrast => "dark",
    }
}

fn css_variables_for(scheme: HostColorScheme) -> BTreeMap<String, String> {
    let dark = scheme.is_dark();
    let pick = |dark_value: &str, light_value: &str| {
        let value = if dark { dark_value } else { light_value };
        value.to_string()
    };
    BTreeMap::from([
        ("--mermaid-background".to_string(), pick("#1e1e1e", "#ffffff")),
        ("--mermaid-primary-color".to_string(), pick("#569cd6", "#0066cc")),
        ("--mermaid-secondary-color".to_string(), pick("#4ec9b0", "#008080")),
        ("--mermaid-text-color".to_string(), pick("#d4d4d4", "#000000")),
        ("--mermaid-border-color".to_string(), pick("#3e3e3e", "#cccccc")),
        ("--mermaid-note-background".to_string(), pick("#2d2d2d", "#f0f0f0")),
    ])
}
