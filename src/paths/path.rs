use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

pub const MARKDOWN_EXTENSION: &str = "md";

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static NON_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid non-word regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid space regex"));
static HYPHENS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid hyphen regex"));
static LINE_FRAGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^L(\d+)(?:-L(\d+))?$").expect("valid line fragment regex"));

/// Turn rendered heading content into a regularized anchor id.
///
/// Embedded markup tags are dropped before filtering, so `Using <code>foo</code>` and
/// `Using foo` produce the same anchor.
pub fn to_anchor(heading: &str) -> String {
    let lowered = heading.to_lowercase();
    let untagged = TAG_RE.replace_all(&lowered, "");
    let filtered = NON_WORD_RE.replace_all(&untagged, "");
    let hyphenated = WHITESPACE_RE.replace_all(&filtered, "-");
    HYPHENS_RE.replace_all(&hyphenated, "-").trim().to_string()
}

/// Lexically resolve `.` and `..` components without touching the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    // Above a relative root, keep the component.
                    if !normalized.has_root() {
                        normalized.push("..");
                    }
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Resolve `href` from `base_dir` the way a browser resolves a relative link.
pub fn resolve_from(base_dir: &Path, href: &str) -> PathBuf {
    normalize_path(&base_dir.join(href))
}

/// Append the markdown extension when `path` has none.
///
/// `foo` becomes `foo.md`; `foo.rs` and `foo.md` are unchanged.
pub fn with_markdown_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some() {
        path
    } else {
        let mut raw = path.into_os_string();
        raw.push(".");
        raw.push(MARKDOWN_EXTENSION);
        PathBuf::from(raw)
    }
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == MARKDOWN_EXTENSION)
        .unwrap_or(false)
}

/// Display form of a wiki file name.
pub fn strip_markdown_suffix(name: &str) -> &str {
    name.strip_suffix(".md").unwrap_or(name)
}

/// Split `target#fragment` into its parts. An empty fragment is treated as absent.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((target, fragment)) if !fragment.is_empty() => (target, Some(fragment)),
        Some((target, _)) => (target, None),
        None => (href, None),
    }
}

/// A zero-based, inclusive line range. The selection ends at the end of `end_line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSelection {
    pub start_line: u32,
    pub end_line: u32,
}

impl LineSelection {
    /// Parse a `L<start>` or `L<start>-L<end>` fragment (1-based, inclusive).
    pub fn from_fragment(fragment: &str) -> Option<LineSelection> {
        let captures = LINE_FRAGMENT_RE.captures(fragment)?;
        let start = captures.get(1)?.as_str().parse::<u32>().ok()?;
        let end = match captures.get(2) {
            Some(end) => end.as_str().parse::<u32>().ok()?,
            None => start,
        };
        Some(LineSelection {
            start_line: start.saturating_sub(1),
            end_line: end.saturating_sub(1),
        })
    }
}

/// Page title: the text of a leading `# ` heading, else the title-cased file stem.
pub fn document_title(markdown: &str, path: &Path) -> String {
    let first_line = markdown.lines().next().unwrap_or("").trim();
    if let Some(title) = first_line.strip_prefix("# ") {
        let title = title.trim();
        if !title.is_empty() {
            return title.to_string();
        }
    }
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().replace('_', " "))
        .unwrap_or_default();
    titlecase::titlecase(&stem)
}
