//! Shared test utilities: recording host ports and a fixture wiki.

use crate::{
    config::{WikiLayout, WikiSettings},
    error::ViewerError,
    messages::HostMessage,
    panel::{FileWatchPort, PanelHost, Surface, WatchCallback, WatchSubscription},
    paths::LineSelection,
};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::{tempdir, TempDir};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    CreateSurface { title: String, path: PathBuf },
    OpenText {
        path: PathBuf,
        selection: Option<LineSelection>,
    },
    OpenDocument(PathBuf),
    OpenExternal(String),
    ShowError(String),
}

#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub html: Vec<String>,
    pub messages: Vec<HostMessage>,
    pub reveals: usize,
}

pub struct RecordingSurface {
    log: Arc<Mutex<SurfaceLog>>,
}

impl Surface for RecordingSurface {
    fn set_html(&mut self, html: String) {
        self.log.lock().html.push(html);
    }

    fn post_message(&mut self, message: HostMessage) -> Result<(), ViewerError> {
        self.log.lock().messages.push(message);
        Ok(())
    }

    fn reveal(&mut self) {
        self.log.lock().reveals += 1;
    }
}

#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    surfaces: Mutex<Vec<(PathBuf, Arc<Mutex<SurfaceLog>>)>>,
}

impl RecordingHost {
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                HostCall::ShowError(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.lock().len()
    }

    /// Log of the most recent surface created for `path`.
    pub fn surface(&self, path: &Path) -> Option<Arc<Mutex<SurfaceLog>>> {
        self.surfaces
            .lock()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, log)| log.clone())
    }
}

impl PanelHost for RecordingHost {
    fn create_surface(&self, title: &str, path: &Path) -> Result<Box<dyn Surface>, ViewerError> {
        self.calls.lock().push(HostCall::CreateSurface {
            title: title.to_string(),
            path: path.to_path_buf(),
        });
        let log = Arc::new(Mutex::new(SurfaceLog::default()));
        self.surfaces.lock().push((path.to_path_buf(), log.clone()));
        Ok(Box::new(RecordingSurface { log }))
    }

    fn open_text_document(
        &self,
        path: &Path,
        selection: Option<LineSelection>,
    ) -> Result<(), ViewerError> {
        self.calls.lock().push(HostCall::OpenText {
            path: path.to_path_buf(),
            selection,
        });
        Ok(())
    }

    fn open_document(&self, path: &Path) -> Result<(), ViewerError> {
        self.calls
            .lock()
            .push(HostCall::OpenDocument(path.to_path_buf()));
        Ok(())
    }

    fn open_external(&self, href: &str) -> Result<(), ViewerError> {
        self.calls.lock().push(HostCall::OpenExternal(href.to_string()));
        Ok(())
    }

    fn show_error(&self, message: &str) {
        self.calls.lock().push(HostCall::ShowError(message.to_string()));
    }
}

type CallbackMap = HashMap<PathBuf, Arc<WatchCallback>>;

/// Watch port whose change notifications are fired by the test.
#[derive(Default)]
pub struct ManualWatchPort {
    callbacks: Arc<Mutex<CallbackMap>>,
}

impl ManualWatchPort {
    pub fn trigger(&self, path: &Path) -> bool {
        let callback = self.callbacks.lock().get(path).cloned();
        match callback {
            Some(callback) => {
                (**callback)();
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.callbacks.lock().len()
    }
}

impl FileWatchPort for ManualWatchPort {
    fn watch(
        &self,
        path: &Path,
        on_change: WatchCallback,
    ) -> Result<WatchSubscription, ViewerError> {
        self.callbacks
            .lock()
            .insert(path.to_path_buf(), Arc::new(on_change));
        let callbacks = self.callbacks.clone();
        let watched = path.to_path_buf();
        Ok(WatchSubscription::new(move || {
            callbacks.lock().remove(&watched);
        }))
    }
}

/// A workspace with a small generated wiki:
///
/// ```text
/// .codewiki/
///   overview.md         links to core and to a source file
///   core.md             has a diagram
///   core/engine.md
///   module_tree.json    core { engine }, cli
/// src/main.rs
/// ```
pub fn wiki_fixture() -> (TempDir, WikiLayout) {
    init_logging();
    let dir = tempdir().expect("tempdir");
    let layout = WikiLayout::new(dir.path(), &WikiSettings::default());
    fs::create_dir_all(layout.wiki_root.join("core")).expect("wiki dirs");
    fs::create_dir_all(dir.path().join("src")).expect("src dir");
    fs::write(
        &layout.overview,
        "# Overview\n\nSee [core](core.md) and [main](file:///src/main.rs#L1-L2).\n",
    )
    .expect("overview");
    fs::write(
        layout.wiki_root.join("core.md"),
        "# Core\n\n```mermaid\ngraph TD\n  A --> B\n```\n\n## API\n",
    )
    .expect("core page");
    fs::write(
        layout.wiki_root.join("core").join("engine.md"),
        "# Engine\n\n## Usage\n",
    )
    .expect("engine page");
    fs::write(
        &layout.module_tree,
        r#"{"core": {"path": "src/core", "children": {"engine": {"path": "src/core/engine.rs"}}},
            "cli": {"path": "src/cli"}}"#,
    )
    .expect("module tree");
    fs::write(dir.path().join("src").join("main.rs"), "fn main() {}\n").expect("source");
    (dir, layout)
}
