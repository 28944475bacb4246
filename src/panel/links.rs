//! Resolution of link clicks coming back from a presentation surface.
use std::path::{Path, PathBuf};

use crate::{
    config::WikiLayout,
    paths::{is_markdown, resolve_from, split_fragment, with_markdown_extension, LineSelection},
};

pub const FILE_SCHEME: &str = "file://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Same-document anchor, without the leading `#`.
    ScrollToAnchor(String),
    /// Open in the wiki viewer, then scroll to `anchor` if present.
    OpenWiki {
        path: PathBuf,
        anchor: Option<String>,
    },
    /// Non-markdown wiki target, handed to the host's default opener.
    OpenDocument(PathBuf),
    /// Workspace source file, optionally with a line range selected.
    OpenText {
        path: PathBuf,
        selection: Option<LineSelection>,
    },
    /// Message for the host's error notification.
    NotFound(String),
}

/// Decide what a click on `href` inside `current` should do.
pub fn resolve_link(href: &str, current: &Path, layout: &WikiLayout) -> LinkAction {
    if let Some(anchor) = href.strip_prefix('#') {
        return LinkAction::ScrollToAnchor(anchor.to_string());
    }
    if let Some(location) = href.strip_prefix(FILE_SCHEME) {
        return resolve_source_link(location, &layout.workspace_root);
    }

    let (target, fragment) = split_fragment(href);
    let anchor = fragment.map(str::to_string);
    let current_dir = current.parent().unwrap_or(Path::new(""));

    let beside = with_markdown_extension(resolve_from(current_dir, target));
    if beside.exists() {
        tracing::debug!("Resolved {} next to {:?}", href, current);
        return if is_markdown(&beside) {
            LinkAction::OpenWiki {
                path: beside,
                anchor,
            }
        } else {
            LinkAction::OpenDocument(beside)
        };
    }

    let from_root = with_markdown_extension(resolve_from(&layout.wiki_root, target));
    if from_root.exists() {
        tracing::debug!("Resolved {} from the wiki root", href);
        return LinkAction::OpenWiki {
            path: from_root,
            anchor,
        };
    }

    LinkAction::NotFound(format!("Wiki link target not found: {href}"))
}

fn resolve_source_link(location: &str, workspace_root: &Path) -> LinkAction {
    let (file_part, fragment) = split_fragment(location);
    let selection = fragment.and_then(LineSelection::from_fragment);
    let relative = file_part.trim_start_matches('/');
    let path = workspace_root.join(relative);
    if path.exists() {
        LinkAction::OpenText { path, selection }
    } else {
        LinkAction::NotFound(format!("File not found: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WikiSettings;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn workspace() -> (TempDir, WikiLayout) {
        let dir = tempdir().unwrap();
        let layout = WikiLayout::new(dir.path(), &WikiSettings::default());
        fs::create_dir_all(layout.wiki_root.join("core")).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(layout.wiki_root.join("overview.md"), "# Overview").unwrap();
        fs::write(layout.wiki_root.join("core").join("engine.md"), "# Engine").unwrap();
        fs::write(layout.wiki_root.join("diagram.svg"), "<svg/>").unwrap();
        fs::write(dir.path().join("src").join("main.rs"), "fn main() {}\n").unwrap();
        (dir, layout)
    }

    #[test]
    fn anchors_scroll() {
        let (_dir, layout) = workspace();
        assert_eq!(
            resolve_link("#setup", &layout.overview, &layout),
            LinkAction::ScrollToAnchor("setup".to_string())
        );
    }

    #[test]
    fn source_links_carry_selection() {
        let (_dir, layout) = workspace();
        let action = resolve_link("file:///src/main.rs#L5-L10", &layout.overview, &layout);
        assert_eq!(
            action,
            LinkAction::OpenText {
                path: layout.workspace_root.join("src/main.rs"),
                selection: Some(LineSelection {
                    start_line: 4,
                    end_line: 9
                }),
            }
        );
        let action = resolve_link("file://src/main.rs#intro", &layout.overview, &layout);
        assert!(matches!(action, LinkAction::OpenText { selection: None, .. }));
        let action = resolve_link("file:///src/missing.rs", &layout.overview, &layout);
        assert!(matches!(action, LinkAction::NotFound(m) if m.starts_with("File not found: ")));
    }

    #[test]
    fn relative_links_gain_extension_and_keep_fragment() {
        let (_dir, layout) = workspace();
        let action = resolve_link("core/engine#api", &layout.overview, &layout);
        assert_eq!(
            action,
            LinkAction::OpenWiki {
                path: layout.wiki_root.join("core/engine.md"),
                anchor: Some("api".to_string()),
            }
        );
        assert_eq!(
            resolve_link("diagram.svg", &layout.overview, &layout),
            LinkAction::OpenDocument(layout.wiki_root.join("diagram.svg"))
        );
    }

    #[test]
    fn parent_relative_links_open_as_wiki_pages() {
        let (_dir, layout) = workspace();
        let wiki = &layout.wiki_root;
        fs::create_dir_all(wiki.join("a")).unwrap();
        fs::write(wiki.join("a").join("b.md"), "[c](../c)").unwrap();
        fs::write(wiki.join("c.md"), "# C").unwrap();

        assert_eq!(
            resolve_link("../c", &wiki.join("a").join("b.md"), &layout),
            LinkAction::OpenWiki {
                path: wiki.join("c.md"),
                anchor: None,
            }
        );
    }

    #[test]
    fn falls_back_to_wiki_root() {
        let (_dir, layout) = workspace();
        let current = layout.wiki_root.join("core").join("engine.md");
        assert_eq!(
            resolve_link("overview", &current, &layout),
            LinkAction::OpenWiki {
                path: layout.overview.clone(),
                anchor: None,
            }
        );
        assert_eq!(
            resolve_link("nowhere.md", &current, &layout),
            LinkAction::NotFound("Wiki link target not found: nowhere.md".to_string())
        );
    }
}
