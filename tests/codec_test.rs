use codewiki_viewer::{
    codec::{MarkdownConverter, MarkdownOptions},
    config::DiagramSettings,
    panel::{render_document, PageAssets},
    theme::{HostColorScheme, ThemeMapper},
    ViewerError,
};
use regex::Regex;
use std::fs;
use tempfile::tempdir;
use test_log::test;

mod common;

const ENGINE_PAGE: &str = r#"# Engine Module

The engine schedules work.
Second line of the intro.

## Architecture

```mermaid
graph TD
    A["Scheduler"] --> B{"Queue & 'workers'"}
    B -->|dispatch| C[Worker]
```

<cite>
**Referenced files:**
- `src/engine/mod.rs`

```mermaid
sequenceDiagram
    Client->>Engine: submit
```
</cite>

## API

| Function | Purpose |
|----------|---------|
| `run()`  | start   |

```rust
fn run() {}
```

See https://docs.example.com for details.
"#;

fn diagram_ids(html: &str) -> Vec<String> {
    let re = Regex::new(r#"id="(mermaid-diagram-\d+)""#).unwrap();
    re.captures_iter(html).map(|c| c[1].to_string()).collect()
}

#[test]
fn wiki_page_converts_with_every_construct() {
    let html = MarkdownConverter::new().convert_to_html(ENGINE_PAGE, None);

    assert!(html.contains("<h1 id=\"engine-module\">Engine Module</h1>"));
    assert!(html.contains("<h2 id=\"architecture\">Architecture</h2>"));
    assert!(html.contains("<h2 id=\"api\">API</h2>"));
    assert!(html.contains("The engine schedules work.<br />"));

    // Diagrams inside citations continue the page's numbering.
    assert_eq!(diagram_ids(&html), ["mermaid-diagram-0", "mermaid-diagram-1"]);
    let cite_start = html.find("<div class=\"cite\">").unwrap();
    let second_diagram = html.find("mermaid-diagram-1").unwrap();
    assert!(cite_start < second_diagram);
    assert!(html.contains("<code>src/engine/mod.rs</code>"));
    assert!(html.contains(
        "data-mermaid-code=\"graph TD\n    A[&quot;Scheduler&quot;] --> B{&quot;Queue &amp; &#39;workers&#39;&quot;}"
    ));

    assert!(html.contains("<table>"));
    assert!(html.contains("<pre><code class=\"language-rust\">fn run() {}"));
    assert!(html.contains("<a href=\"https://docs.example.com\">https://docs.example.com</a>"));
    assert!(!html.contains("CITE_BLOCK"));
}

#[test]
fn converter_is_reusable_across_documents() {
    let mut converter = MarkdownConverter::new();
    let first = converter.convert_to_html(ENGINE_PAGE, None);
    let second = converter.convert_to_html(ENGINE_PAGE, None);
    assert_eq!(first, second);
}

#[test]
fn sanitized_pages_drop_raw_markup() {
    let options = MarkdownOptions {
        sanitize: true,
        ..Default::default()
    };
    let html = MarkdownConverter::new().convert_to_html(
        "<img src=x onerror=alert(1)>\n\n<cite>safe *cite*</cite>\n",
        Some(&options),
    );
    assert!(!html.contains("<img"));
    assert!(html.contains("<div class=\"cite\"><p>safe <em>cite</em></p>\n</div>"));
}

#[test]
fn documents_render_into_full_pages() {
    let temp_dir = tempdir().unwrap();
    let page = temp_dir.path().join("engine_core.md");
    fs::write(&page, ENGINE_PAGE).unwrap();
    let untitled = temp_dir.path().join("engine_core_notes.md");
    fs::write(&untitled, "Just notes.\n").unwrap();

    let theme = ThemeMapper::default().theme_for(HostColorScheme::HighContrast);
    let assets = PageAssets::new(&DiagramSettings::default());
    let mut converter = MarkdownConverter::new();

    let html = render_document(
        &mut converter,
        &page,
        &theme,
        &assets,
        &MarkdownOptions::default(),
    )
    .unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<title>Engine Module</title>"));
    assert!(html.contains("id=\"codewiki-config\""));
    assert!(html.contains(&DiagramSettings::default().cdn_url));
    assert!(html.contains("id=\"mermaid-diagram-1\""));

    let html = render_document(
        &mut converter,
        &untitled,
        &theme,
        &assets,
        &MarkdownOptions::default(),
    )
    .unwrap();
    assert!(html.contains("<title>Engine Core Notes</title>"));

    let missing = render_document(
        &mut converter,
        &temp_dir.path().join("absent.md"),
        &theme,
        &assets,
        &MarkdownOptions::default(),
    );
    assert!(matches!(missing, Err(ViewerError::NotFound(_))));
}
