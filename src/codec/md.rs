//! Markdown to HTML conversion for wiki documents.
//!
//! On top of CommonMark + GFM the converter handles two wiki constructs:
//!
//! - Fenced ` ```mermaid ` blocks become empty `<div class="mermaid">` containers carrying the
//!   diagram source in `data-mermaid-code`. Rendering happens on the presentation surface; the
//!   source is passed through untouched apart from line-ending normalization and trimming.
//! - `<cite>…</cite>` blocks are lifted out before parsing, converted as markdown on their own,
//!   and put back wrapped in `<div class="cite">`.
//!
//! Headings get slug ids (see [`to_anchor`]) so in-document links can scroll to them.
use once_cell::sync::Lazy;
use pulldown_cmark::{
    html, CodeBlockKind, CowStr, Event, LinkType, Options, Parser as MdParser, Tag, TagEnd,
    TextMergeStream,
};
use regex::Regex;
use url::Url;

use crate::paths::to_anchor;

/// Info string that marks a fenced block as a diagram.
pub const DIAGRAM_LANGUAGE: &str = "mermaid";

static CITE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<cite>(.*?)</cite>").expect("valid cite regex"));
static CITE_PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<!-- CITE_BLOCK_\d+ -->$").expect("valid placeholder regex"));
static BARE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:https?://|www\.)[^\s<]*[^\s<?!.,:*_~)'"]"#).expect("valid url regex")
});

pub fn viewer_md_options() -> Options {
    let mut md_options = Options::empty();
    md_options.insert(Options::ENABLE_GFM);
    md_options.insert(Options::ENABLE_STRIKETHROUGH);
    md_options.insert(Options::ENABLE_TABLES);
    md_options.insert(Options::ENABLE_TASKLISTS);
    md_options
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownOptions {
    /// URL prefix for relative image sources.
    pub base_path: Option<String>,
    /// Escape raw HTML from the document instead of passing it through.
    pub sanitize: bool,
}

/// Stateful only in its diagram counter, which restarts on every [`convert_to_html`] call.
///
/// [`convert_to_html`]: MarkdownConverter::convert_to_html
#[derive(Debug, Default)]
pub struct MarkdownConverter {
    diagram_counter: usize,
}

impl MarkdownConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a markdown document. Never fails; malformed input degrades to literal text.
    pub fn convert_to_html(&mut self, markdown: &str, options: Option<&MarkdownOptions>) -> String {
        self.diagram_counter = 0;
        let defaults = MarkdownOptions::default();
        let options = options.unwrap_or(&defaults);
        self.convert_fragment(markdown, options)
    }

    /// Citation bodies are converted through here too, so their diagrams continue the count.
    fn convert_fragment(&mut self, markdown: &str, options: &MarkdownOptions) -> String {
        let (prepared, cite_blocks) = extract_cite_blocks(markdown);
        let mut output = self.render(&prepared, options);
        for (index, body) in cite_blocks.iter().enumerate() {
            let cite_html = format!(
                "<div class=\"cite\">{}</div>",
                self.convert_fragment(body, options)
            );
            output = substitute_placeholder(output, index, &cite_html);
        }
        output
    }

    fn render(&mut self, text: &str, options: &MarkdownOptions) -> String {
        let parser = TextMergeStream::new(MdParser::new_ext(text, viewer_md_options()));
        let inline_events = rewrite_inline(parser, options);

        let mut events = inline_events.into_iter();
        let mut rewritten: Vec<Event> = Vec::new();
        while let Some(event) = events.next() {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                    if info.trim() == DIAGRAM_LANGUAGE =>
                {
                    let mut source = String::new();
                    for inner in events.by_ref() {
                        match inner {
                            Event::End(TagEnd::CodeBlock) => break,
                            Event::Text(text) => source.push_str(&text),
                            _ => {}
                        }
                    }
                    rewritten.push(Event::Html(self.diagram_container(&source).into()));
                }
                Event::Start(Tag::Heading { level, .. }) => {
                    let mut inner = Vec::new();
                    for inner_event in events.by_ref() {
                        match inner_event {
                            Event::End(TagEnd::Heading(_)) => break,
                            other => inner.push(other),
                        }
                    }
                    let anchor = to_anchor(&heading_text(&inner));
                    let mut content = String::new();
                    html::push_html(&mut content, inner.into_iter());
                    let level = level as usize;
                    rewritten.push(Event::Html(
                        format!(
                            "<h{level} id=\"{}\">{content}</h{level}>\n",
                            escape_attribute(&anchor)
                        )
                        .into(),
                    ));
                }
                other => rewritten.push(other),
            }
        }

        let mut output = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut output, rewritten.into_iter());
        output
    }

    fn diagram_container(&mut self, source: &str) -> String {
        let index = self.diagram_counter;
        self.diagram_counter += 1;
        let normalized = source.replace("\r\n", "\n");
        format!(
            "<div class=\"mermaid\" id=\"mermaid-diagram-{index}\" data-mermaid-code=\"{}\"></div>\n",
            escape_attribute(normalized.trim())
        )
    }
}

/// Unescaped heading text with inline markup kept, so [`to_anchor`] can strip the tags.
fn heading_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) | Event::InlineHtml(t) | Event::Html(t) => {
                text.push_str(t)
            }
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text
}

/// Replace each `<cite>` block with an indexed comment placeholder and return the trimmed bodies.
fn extract_cite_blocks(markdown: &str) -> (String, Vec<String>) {
    let mut bodies = Vec::new();
    let prepared = CITE_RE.replace_all(markdown, |captures: &regex::Captures| {
        let index = bodies.len();
        bodies.push(captures[1].trim().to_string());
        format!("\n{}\n", cite_placeholder(index))
    });
    (prepared.into_owned(), bodies)
}

fn cite_placeholder(index: usize) -> String {
    format!("<!-- CITE_BLOCK_{index} -->")
}

fn substitute_placeholder(output: String, index: usize, replacement: &str) -> String {
    let placeholder = cite_placeholder(index);
    let wrapped = format!("<p>{placeholder}</p>");
    if output.contains(&wrapped) {
        output.replacen(&wrapped, replacement, 1)
    } else if output.contains(&placeholder) {
        output.replacen(&placeholder, replacement, 1)
    } else {
        tracing::debug!("Citation placeholder {index} did not survive parsing");
        output
    }
}

/// Inline-level rewriting: hard line breaks, raw-HTML sanitizing, bare URL autolinks, image
/// source rebasing.
fn rewrite_inline<'a>(
    events: impl Iterator<Item = Event<'a>>,
    options: &MarkdownOptions,
) -> Vec<Event<'a>> {
    let mut out = Vec::new();
    let mut link_depth = 0usize;
    let mut in_code_block = false;
    for event in events {
        match event {
            Event::SoftBreak => out.push(Event::HardBreak),
            Event::Html(raw) | Event::InlineHtml(raw)
                if options.sanitize && !CITE_PLACEHOLDER_RE.is_match(raw.trim()) =>
            {
                out.push(Event::Text(raw));
            }
            Event::InlineHtml(raw) => {
                if is_anchor_tag(&raw, "<a") {
                    link_depth += 1;
                } else if is_anchor_tag(&raw, "</a") {
                    link_depth = link_depth.saturating_sub(1);
                }
                out.push(Event::InlineHtml(raw));
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                out.push(Event::Start(Tag::CodeBlock(kind)));
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                out.push(Event::End(TagEnd::CodeBlock));
            }
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                link_depth += 1;
                out.push(Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }));
            }
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                link_depth += 1;
                let dest_url = match options
                    .base_path
                    .as_deref()
                    .and_then(|base| rebase_image_source(&dest_url, base))
                {
                    Some(rebased) => CowStr::from(rebased),
                    None => dest_url,
                };
                out.push(Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }));
            }
            Event::End(end @ (TagEnd::Link | TagEnd::Image)) => {
                link_depth = link_depth.saturating_sub(1);
                out.push(Event::End(end));
            }
            Event::Text(text) if link_depth == 0 && !in_code_block => {
                push_autolinked(text, &mut out);
            }
            other => out.push(other),
        }
    }
    out
}

/// `<a ...>` or `</a>`, but not `<abbr>` and friends.
fn is_anchor_tag(raw: &str, prefix: &str) -> bool {
    let raw = raw.trim_start();
    raw.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        && raw[prefix.len()..]
            .chars()
            .next()
            .is_some_and(|c| c == '>' || c.is_ascii_whitespace())
}

fn push_autolinked<'a>(text: CowStr<'a>, out: &mut Vec<Event<'a>>) {
    if !BARE_URL_RE.is_match(&text) {
        out.push(Event::Text(text));
        return;
    }
    let text: &str = &text;
    let mut last = 0;
    for found in BARE_URL_RE.find_iter(text) {
        if found.start() > last {
            out.push(Event::Text(text[last..found.start()].to_string().into()));
        }
        let label = found.as_str();
        let href = if label.starts_with("www.") {
            format!("http://{label}")
        } else {
            label.to_string()
        };
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: href.into(),
            title: "".into(),
            id: "".into(),
        }));
        out.push(Event::Text(label.to_string().into()));
        out.push(Event::End(TagEnd::Link));
        last = found.end();
    }
    if last < text.len() {
        out.push(Event::Text(text[last..].to_string().into()));
    }
}

fn rebase_image_source(dest: &str, base: &str) -> Option<String> {
    if dest.is_empty()
        || dest.starts_with('#')
        || dest.starts_with('/')
        || Url::parse(dest).is_ok()
    {
        return None;
    }
    Some(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        dest.trim_start_matches("./")
    ))
}

/// Escape text for a double- or single-quoted HTML attribute.
pub fn escape_attribute(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn unescape_attribute(text: &str) -> String {
        text.replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&")
    }

    fn diagram_sources(html: &str) -> Vec<String> {
        let re = Regex::new(r#"data-mermaid-code="([^"]*)""#).unwrap();
        re.captures_iter(html)
            .map(|c| unescape_attribute(&c[1]))
            .collect()
    }

    fn diagram_ids(html: &str) -> Vec<String> {
        let re = Regex::new(r#"id="(mermaid-diagram-\d+)""#).unwrap();
        re.captures_iter(html).map(|c| c[1].to_string()).collect()
    }

    #[test]
    fn diagram_source_passes_through() {
        let source = "graph TD\n  A[\"Start & 'go'\"] --> B{Choice?}\n  B -->|yes| C";
        let markdown = format!("Intro\n\n```mermaid\n\n{source}\n\n```\n");
        let html = MarkdownConverter::new().convert_to_html(&markdown, None);
        assert_eq!(diagram_sources(&html), vec![source.to_string()]);
        assert!(!html.contains("<pre>"));
    }

    #[test]
    fn diagram_line_endings_are_normalized() {
        let markdown = "```mermaid\r\nflowchart LR\r\n  A --> B\r\n```\r\n";
        let html = MarkdownConverter::new().convert_to_html(markdown, None);
        assert_eq!(diagram_sources(&html), vec!["flowchart LR\n  A --> B"]);
    }

    #[test]
    fn diagram_ids_count_from_zero_per_call() {
        let markdown = "```mermaid\na\n```\n\ntext\n\n```mermaid\nb\n```\n\n```mermaid\nc\n```\n";
        let mut converter = MarkdownConverter::new();
        let first = converter.convert_to_html(markdown, None);
        assert_eq!(
            diagram_ids(&first),
            vec![
                "mermaid-diagram-0",
                "mermaid-diagram-1",
                "mermaid-diagram-2"
            ]
        );
        let second = converter.convert_to_html("```mermaid\nd\n```\n", None);
        assert_eq!(diagram_ids(&second), vec!["mermaid-diagram-0"]);
    }

    #[test]
    fn other_code_blocks_render_normally() {
        let html = MarkdownConverter::new().convert_to_html("```rust\nfn main() {}\n```\n", None);
        assert!(html.contains("<pre><code class=\"language-rust\">fn main() {}"));
        assert!(!html.contains("mermaid"));
    }

    #[test]
    fn cite_block_matches_independent_conversion() {
        let inner = "**Source:** `core/engine.rs`\n\n- one\n- two";
        let markdown = format!("# Title\n\nBody text.\n\n<cite>\n{inner}\n</cite>\n\nAfter.\n");
        let html = MarkdownConverter::new().convert_to_html(&markdown, None);
        let expected = MarkdownConverter::new().convert_to_html(inner, None);
        assert!(html.contains(&format!("<div class=\"cite\">{expected}</div>")));
        assert!(!html.contains("CITE_BLOCK"));
        assert!(html.contains("<p>After.</p>"));
    }

    #[test]
    fn inline_cite_is_lifted_out_of_its_paragraph() {
        let html =
            MarkdownConverter::new().convert_to_html("See <cite>the *notes*</cite> here.", None);
        assert!(html.contains("<div class=\"cite\"><p>the <em>notes</em></p>\n</div>"));
        assert!(!html.contains("CITE_BLOCK"));
    }

    #[test]
    fn several_cites_keep_their_order() {
        let html = MarkdownConverter::new()
            .convert_to_html("<cite>first</cite>\n\n<cite>second</cite>\n", None);
        let first = html.find("first").unwrap();
        let second = html.find("second").unwrap();
        assert!(first < second);
        assert_eq!(html.matches("<div class=\"cite\">").count(), 2);
    }

    #[test]
    fn unterminated_cite_is_literal() {
        let html = MarkdownConverter::new().convert_to_html("<cite>dangling text", None);
        assert!(html.contains("dangling text"));
        assert!(!html.contains("class=\"cite\""));
    }

    #[test]
    fn heading_ids() {
        let html = MarkdownConverter::new()
            .convert_to_html("# Hello World\n\n## Using `run()` & friends\n", None);
        assert!(html.contains("<h1 id=\"hello-world\">Hello World</h1>"));
        assert!(html.contains(
            "<h2 id=\"using-run-friends\">Using <code>run()</code> &amp; friends</h2>"
        ));

        // Slugs come from the unescaped text, so entity names never leak into ids.
        let html = MarkdownConverter::new().convert_to_html("## Inputs & \"Outputs\"\n", None);
        assert!(html.contains("<h2 id=\"inputs-outputs\">Inputs &amp; \"Outputs\"</h2>"));
    }

    #[test]
    fn soft_breaks_become_line_breaks() {
        let html = MarkdownConverter::new().convert_to_html("line one\nline two\n", None);
        assert!(html.contains("line one<br />"));
    }

    #[test]
    fn tables_render() {
        let html = MarkdownConverter::new()
            .convert_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n", None);
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn bare_urls_are_autolinked() {
        let html = MarkdownConverter::new()
            .convert_to_html("Visit https://example.com/docs. Or www.example.org", None);
        assert!(html.contains("<a href=\"https://example.com/docs\">https://example.com/docs</a>."));
        assert!(html.contains("<a href=\"http://www.example.org\">www.example.org</a>"));
    }

    #[test]
    fn explicit_links_are_not_relinked() {
        let html = MarkdownConverter::new()
            .convert_to_html("[https://example.com](https://example.com)", None);
        assert_eq!(html.matches("<a ").count(), 1);
    }

    #[test]
    fn raw_html_anchors_are_not_relinked() {
        let html = MarkdownConverter::new().convert_to_html(
            "See <a href=\"https://x.io\">https://x.io</a> and https://y.io <abbr>URL</abbr>",
            None,
        );
        assert!(html.contains("<a href=\"https://x.io\">https://x.io</a> and "));
        assert_eq!(html.matches("<a ").count(), 2);
        assert!(html.contains("<a href=\"https://y.io\">https://y.io</a>"));
    }

    #[test]
    fn sanitize_escapes_raw_html_but_keeps_cites() {
        let options = MarkdownOptions {
            sanitize: true,
            ..Default::default()
        };
        let html = MarkdownConverter::new().convert_to_html(
            "<script>alert(1)</script>\n\n<cite>kept</cite>\n",
            Some(&options),
        );
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("<div class=\"cite\"><p>kept</p>\n</div>"));
    }

    #[test]
    fn base_path_rebases_relative_images() {
        let options = MarkdownOptions {
            base_path: Some("https://host/docs/".to_string()),
            ..Default::default()
        };
        let html = MarkdownConverter::new().convert_to_html(
            "![arch](./img/arch.png) ![logo](https://cdn/logo.png)",
            Some(&options),
        );
        assert!(html.contains("src=\"https://host/docs/img/arch.png\""));
        assert!(html.contains("src=\"https://cdn/logo.png\""));
    }
}
