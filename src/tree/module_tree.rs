use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

use crate::{config::get_content, error::ViewerError};

/// One module of the structured description. Absent or empty `children` means leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleTreeNode {
    /// Source location of the module, relative to the workspace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<BTreeMap<String, ModuleTreeNode>>,
}

impl ModuleTreeNode {
    pub fn has_children(&self) -> bool {
        self.children
            .as_ref()
            .map(|children| !children.is_empty())
            .unwrap_or(false)
    }

    pub fn children(&self) -> impl Iterator<Item = (&String, &ModuleTreeNode)> {
        self.children.iter().flat_map(|children| children.iter())
    }
}

/// Parsed `module_tree.json`: top-level module key to node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleTree(pub BTreeMap<String, ModuleTreeNode>);

impl ModuleTree {
    pub fn from_json(json: &str) -> Result<Self, ViewerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load the description, treating a missing file as absent and a malformed one as absent
    /// with a warning.
    pub fn load(path: &Path) -> Option<Self> {
        if !path.is_file() {
            tracing::debug!("No module tree at {:?}, using directory listing", path);
            return None;
        }
        match get_content(path).and_then(|json| Self::from_json(&json)) {
            Ok(tree) => {
                tracing::debug!("Loaded module tree with {} top-level modules", tree.0.len());
                Some(tree)
            }
            Err(e) => {
                tracing::warn!(
                    "Ignoring malformed module tree {:?}, falling back to directory listing: {}",
                    path,
                    e
                );
                None
            }
        }
    }

    pub fn roots(&self) -> impl Iterator<Item = (&String, &ModuleTreeNode)> {
        self.0.iter()
    }

    /// Follow a dotted module key (`a.b.c`) through the nested `children` maps.
    pub fn resolve(&self, module_key: &str) -> Option<&ModuleTreeNode> {
        let mut segments = module_key.split('.');
        let mut node = self.0.get(segments.next()?)?;
        for segment in segments {
            node = node.children.as_ref()?.get(segment)?;
        }
        Some(node)
    }
}
