//! Assembly of the self-contained page shown by a presentation surface.
use serde::Serialize;
use std::fmt::Write;

use super::assets;
use crate::{config::DiagramSettings, error::ViewerError, theme::ThemeInfo};

/// Everything besides the document body that goes into a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAssets {
    /// Locally bundled diagram library, preferred over the CDN.
    pub diagram_script_uri: Option<String>,
    pub cdn_url: String,
    pub max_init_attempts: u32,
    pub init_retry_delay_ms: u64,
    /// Where a browser without a host bridge posts console diagnostics.
    pub console_endpoint: Option<String>,
    /// Server-sent events stream that triggers a reload.
    pub events_endpoint: Option<String>,
}

impl PageAssets {
    pub fn new(settings: &DiagramSettings) -> Self {
        PageAssets {
            diagram_script_uri: None,
            cdn_url: settings.cdn_url.clone(),
            max_init_attempts: settings.max_init_attempts,
            init_retry_delay_ms: settings.init_retry_delay_ms,
            console_endpoint: None,
            events_endpoint: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientConfig<'a> {
    theme: &'a ThemeInfo,
    max_init_attempts: u32,
    init_retry_delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    console_endpoint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    events_endpoint: Option<&'a str>,
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// JSON safe to embed inside a `<script>` element.
fn script_json<T: Serialize>(value: &T) -> Result<String, ViewerError> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

fn diagram_library_tag(assets: &PageAssets) -> String {
    let cdn = escape_html(&assets.cdn_url);
    match &assets.diagram_script_uri {
        Some(uri) => format!(
            "<script src=\"{}\" onerror=\"console.warn('[Mermaid] Bundled library failed, trying CDN fallback'); \
             var s = document.createElement('script'); s.src = '{cdn}'; \
             s.onerror = function() {{ console.error('[Mermaid] Both bundled and CDN failed to load'); }}; \
             document.head.appendChild(s);\"></script>",
            escape_html(uri)
        ),
        None => format!("<script src=\"{cdn}\"></script>"),
    }
}

fn theme_style(theme: &ThemeInfo) -> String {
    let mut style = String::from(":root {\n");
    for (name, value) in &theme.css_variables {
        let _ = writeln!(style, "\t{name}: {value};");
    }
    style.push('}');
    style
}

/// Wrap converted document HTML into a full page.
pub fn render_page(
    body_html: &str,
    title: &str,
    theme: &ThemeInfo,
    assets: &PageAssets,
) -> Result<String, ViewerError> {
    let config = script_json(&ClientConfig {
        theme,
        max_init_attempts: assets.max_init_attempts,
        init_retry_delay_ms: assets.init_retry_delay_ms,
        console_endpoint: assets.console_endpoint.as_deref(),
        events_endpoint: assets.events_endpoint.as_deref(),
    })?;
    let kind = serde_json::to_value(theme.kind)?;
    let kind = kind.as_str().unwrap_or_default();

    let mut page = String::with_capacity(body_html.len() + 16 * 1024);
    page.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    page.push_str("<meta charset=\"UTF-8\">\n");
    page.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    writeln!(page, "<title>{}</title>", escape_html(title))?;
    writeln!(page, "<style>\n{}\n</style>", theme_style(theme))?;
    writeln!(page, "<style>\n{}</style>", assets::stylesheet())?;
    writeln!(
        page,
        "<script type=\"application/json\" id=\"codewiki-config\">{config}</script>"
    )?;
    writeln!(page, "{}", diagram_library_tag(assets))?;
    page.push_str("</head>\n");
    writeln!(page, "<body data-theme=\"{kind}\">")?;
    page.push_str(body_html);
    writeln!(page, "\n<script>\n{}</script>", assets::client_script())?;
    page.push_str("</body>\n</html>\n");
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{HostColorScheme, ThemeMapper};

    fn assets() -> PageAssets {
        PageAssets::new(&DiagramSettings::default())
    }

    fn client_config(page: &str) -> serde_json::Value {
        let start = page.find("id=\"codewiki-config\">").unwrap() + "id=\"codewiki-config\">".len();
        let end = start + page[start..].find("</script>").unwrap();
        serde_json::from_str(&page[start..end]).unwrap()
    }

    #[test]
    fn embeds_config_and_body() {
        let theme = ThemeMapper::default().theme_for(HostColorScheme::Dark);
        let page = render_page("<p>hi</p>", "A <b> page", &theme, &assets()).unwrap();
        assert!(page.contains("<title>A &lt;b&gt; page</title>"));
        assert!(page.contains("<body data-theme=\"dark\">\n<p>hi</p>"));
        assert!(page.contains("\"maxInitAttempts\":3"));
        assert!(page.contains("\"diagramTheme\":\"dark\""));
        assert!(page.contains("--mermaid-background: #1e1e1e;"));

        let config = client_config(&page);
        assert_eq!(config["maxInitAttempts"], 3);
        assert!(config.get("consoleEndpoint").is_none());
        assert!(config.get("eventsEndpoint").is_none());
    }

    #[test]
    fn endpoints_reach_the_client_config() {
        let theme = ThemeMapper::default().theme_for(HostColorScheme::Light);
        let mut served = assets();
        served.console_endpoint = Some("/__codewiki/console?page=core.md".to_string());
        served.events_endpoint = Some("/events".to_string());
        let page = render_page("", "t", &theme, &served).unwrap();

        let config = client_config(&page);
        assert_eq!(config["consoleEndpoint"], "/__codewiki/console?page=core.md");
        assert_eq!(config["eventsEndpoint"], "/events");
    }

    #[test]
    fn library_source_selection() {
        let theme = ThemeMapper::default().theme_for(HostColorScheme::Light);
        let cdn = DiagramSettings::default().cdn_url;

        let page = render_page("", "t", &theme, &assets()).unwrap();
        assert!(page.contains(&format!("<script src=\"{cdn}\"></script>")));

        let mut bundled = assets();
        bundled.diagram_script_uri = Some("vscode-resource://mermaid.min.js".to_string());
        let page = render_page("", "t", &theme, &bundled).unwrap();
        assert!(page.contains("<script src=\"vscode-resource://mermaid.min.js\" onerror="));
        assert!(page.contains(&format!("s.src = '{cdn}'")));
    }

    #[test]
    fn config_cannot_close_its_script() {
        let mut theme = ThemeMapper::default().theme_for(HostColorScheme::Light);
        theme.diagram_theme = "</script><script>alert(1)".to_string();
        let page = render_page("", "t", &theme, &assets()).unwrap();
        assert!(!page.contains("</script><script>alert(1)"));
        assert!(page.contains("<\\/script>"));
    }
}
