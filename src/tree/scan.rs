//! Filesystem fallback used when the wiki has no module description.
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::TreeEntry;
use crate::paths::{is_markdown, strip_markdown_suffix};

/// Shallow listing of `dir`, applying the markdown/directory de-duplication rules.
///
/// An unreadable directory yields an empty listing.
pub fn list_directory(dir: &Path) -> Vec<TreeEntry> {
    let parent_name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let mut entries = Vec::new();
    for item in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                if e.depth() == 0 {
                    tracing::debug!("Cannot read wiki directory {:?}: {}", dir, e);
                    return Vec::new();
                }
                tracing::debug!("Skipping unreadable wiki entry: {}", e);
                continue;
            }
        };
        let name = item.file_name().to_string_lossy().into_owned();
        let path = item.into_path();

        if path.is_dir() {
            let index = path.join(format!("{name}.md"));
            let open_target = index.is_file().then_some(index);
            entries.push(TreeEntry::directory(name, path, open_target));
            continue;
        }
        if !is_markdown(&path) {
            continue;
        }
        let base_name = strip_markdown_suffix(&name).to_string();
        if dir.join(&base_name).is_dir() {
            // The sibling directory represents this page.
            continue;
        }
        if parent_name.as_deref() == Some(base_name.as_str()) {
            // Already represented by the parent directory entry.
            continue;
        }
        entries.push(TreeEntry::document(base_name, path));
    }
    entries
}

/// Every openable page below `dir`, depth first, for hosts that render the whole tree at once.
pub fn all_documents(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok().map(|e| e.into_path()))
        .filter(|p| p.is_file() && is_markdown(p))
        .collect()
}
