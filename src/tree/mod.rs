//! Materializes the navigation tree of a wiki, lazily, one level per request.
//!
//! Two sources feed the tree. When the wiki carries a module description
//! (`module_tree.json`) the hierarchy follows it, with the overview page pinned first.
//! Otherwise the wiki directory itself is listed.
use parking_lot::RwLock;
use serde::Serialize;
use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
    sync::Arc,
};

pub mod module_tree;
pub mod scan;

pub use module_tree::{ModuleTree, ModuleTreeNode};

use crate::config::WikiLayout;

pub const OVERVIEW_LABEL: &str = "Overview";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    None,
    Collapsed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeEntry {
    pub label: String,
    pub path: PathBuf,
    pub is_directory: bool,
    pub is_overview: bool,
    pub module_key: Option<String>,
    /// Document opened when the entry is selected, if any.
    pub open_target: Option<PathBuf>,
    pub tooltip: Option<String>,
}

impl TreeEntry {
    pub fn document(label: String, path: PathBuf) -> TreeEntry {
        TreeEntry {
            label,
            open_target: Some(path.clone()),
            tooltip: Some(path.to_string_lossy().into_owned()),
            path,
            is_directory: false,
            is_overview: false,
            module_key: None,
        }
    }

    pub fn directory(label: String, path: PathBuf, open_target: Option<PathBuf>) -> TreeEntry {
        TreeEntry {
            label,
            tooltip: Some(path.to_string_lossy().into_owned()),
            path,
            is_directory: true,
            is_overview: false,
            module_key: None,
            open_target,
        }
    }

    fn overview(path: PathBuf) -> TreeEntry {
        TreeEntry {
            label: OVERVIEW_LABEL.to_string(),
            open_target: Some(path.clone()),
            tooltip: Some(path.to_string_lossy().into_owned()),
            path,
            is_directory: false,
            is_overview: true,
            module_key: None,
        }
    }

    fn module(wiki_root: &Path, label: &str, module_key: String, node: &ModuleTreeNode) -> TreeEntry {
        let path = wiki_root.join(format!("{label}.md"));
        TreeEntry {
            label: label.to_string(),
            open_target: path.is_file().then(|| path.clone()),
            path,
            is_directory: node.has_children(),
            is_overview: false,
            module_key: Some(module_key),
            tooltip: node.path.clone(),
        }
    }

    pub fn expansion(&self) -> Expansion {
        if self.is_directory && !self.is_overview {
            Expansion::Collapsed
        } else {
            Expansion::None
        }
    }
}

/// Directories first, then labels case-insensitively; exact ties put lower-case first.
pub fn compare_entries(a: &TreeEntry, b: &TreeEntry) -> Ordering {
    b.is_directory
        .cmp(&a.is_directory)
        .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
        .then_with(|| b.label.cmp(&a.label))
}

/// An entry together with its fully expanded children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineNode {
    #[serde(flatten)]
    pub entry: TreeEntry,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutlineNode>,
}

/// Expansion stops here even if the file system nests deeper.
pub const MAX_OUTLINE_DEPTH: usize = 32;

fn sort_entries(entries: &mut [TreeEntry]) {
    entries.sort_by(compare_entries);
}

#[derive(Debug, Clone, Default)]
enum Description {
    #[default]
    Unloaded,
    Absent,
    Loaded(Arc<ModuleTree>),
}

/// Tree source for one workspace. The module description is parsed on first use and kept
/// until [`WikiTree::invalidate`] or a layout change.
#[derive(Debug, Default)]
pub struct WikiTree {
    layout: RwLock<Option<WikiLayout>>,
    description: RwLock<Description>,
}

impl WikiTree {
    pub fn new(layout: WikiLayout) -> WikiTree {
        WikiTree {
            layout: RwLock::new(Some(layout)),
            description: RwLock::new(Description::Unloaded),
        }
    }

    pub fn layout(&self) -> Option<WikiLayout> {
        self.layout.read().clone()
    }

    pub fn set_layout(&self, layout: Option<WikiLayout>) {
        let mut current = self.layout.write();
        if *current != layout {
            tracing::debug!("Wiki layout changed to {:?}", layout.as_ref().map(|l| &l.wiki_root));
            *current = layout;
            *self.description.write() = Description::Unloaded;
        }
    }

    pub fn invalidate(&self) {
        tracing::debug!("Discarding cached module tree");
        *self.description.write() = Description::Unloaded;
    }

    fn module_tree(&self, layout: &WikiLayout) -> Option<Arc<ModuleTree>> {
        if let Description::Loaded(tree) = &*self.description.read() {
            return Some(tree.clone());
        }
        let mut description = self.description.write();
        match &*description {
            Description::Loaded(tree) => Some(tree.clone()),
            Description::Absent => None,
            Description::Unloaded => match ModuleTree::load(&layout.module_tree) {
                Some(tree) => {
                    let tree = Arc::new(tree);
                    *description = Description::Loaded(tree.clone());
                    Some(tree)
                }
                None => {
                    *description = Description::Absent;
                    None
                }
            },
        }
    }

    /// Children of `entry`, or the root level when `entry` is `None`.
    pub fn children(&self, entry: Option<&TreeEntry>) -> Vec<TreeEntry> {
        let Some(layout) = self.layout() else {
            return Vec::new();
        };
        if !layout.wiki_root.is_dir() {
            tracing::debug!("Wiki root {:?} does not exist", layout.wiki_root);
            return Vec::new();
        }
        let mut entries = match entry {
            None => self.root_children(&layout),
            Some(TreeEntry {
                module_key: Some(key),
                ..
            }) => match self.module_tree(&layout) {
                Some(tree) => module_children(&tree, &layout.wiki_root, key),
                None => Vec::new(),
            },
            Some(entry) if entry.is_directory => scan::list_directory(&entry.path),
            Some(_) => Vec::new(),
        };
        sort_entries(&mut entries);
        if let (None, Some(overview_at)) = (entry, entries.iter().position(|e| e.is_overview)) {
            let overview = entries.remove(overview_at);
            entries.insert(0, overview);
        }
        entries
    }

    /// The whole tree, expanded eagerly.
    pub fn outline(&self) -> Vec<OutlineNode> {
        self.outline_below(None, 0)
    }

    fn outline_below(&self, entry: Option<&TreeEntry>, depth: usize) -> Vec<OutlineNode> {
        self.children(entry)
            .into_iter()
            .map(|child| {
                let children = if child.expansion() == Expansion::Collapsed
                    && depth + 1 < MAX_OUTLINE_DEPTH
                {
                    self.outline_below(Some(&child), depth + 1)
                } else {
                    Vec::new()
                };
                OutlineNode {
                    entry: child,
                    children,
                }
            })
            .collect()
    }

    fn root_children(&self, layout: &WikiLayout) -> Vec<TreeEntry> {
        match self.module_tree(layout) {
            Some(tree) => {
                let mut entries = Vec::new();
                if layout.overview.is_file() {
                    entries.push(TreeEntry::overview(layout.overview.clone()));
                }
                entries.extend(
                    tree.roots()
                        .map(|(key, node)| TreeEntry::module(&layout.wiki_root, key, key.clone(), node)),
                );
                entries
            }
            None => scan::list_directory(&layout.wiki_root),
        }
    }
}

fn module_children(tree: &ModuleTree, wiki_root: &Path, module_key: &str) -> Vec<TreeEntry> {
    match tree.resolve(module_key) {
        Some(node) => node
            .children()
            .map(|(segment, child)| {
                TreeEntry::module(wiki_root, segment, format!("{module_key}.{segment}"), child)
            })
            .collect(),
        None => {
            tracing::debug!("Module key {} not present in module tree", module_key);
            Vec::new()
        }
    }
}
