//! One presentation surface per open wiki document.
//!
//! The presenter owns no UI. Everything host specific sits behind three ports:
//! [`PanelHost`] creates surfaces and performs navigation, a [`Surface`] shows one page and
//! relays messages, and [`FileWatchPort`] reports changes to an open document. Each open
//! panel holds the [`WatchSubscription`] for its file, so closing the panel stops the watch.
use parking_lot::{Mutex, RwLock};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Weak},
};

pub mod assets;
pub mod content;
pub mod links;

pub use content::{escape_html, render_page, PageAssets};
pub use links::{resolve_link, LinkAction};

use crate::{
    codec::{MarkdownConverter, MarkdownOptions},
    config::{get_content, WikiLayout},
    diagnostics::{LogLevel, SharedDiagnostics, RENDERER_SOURCE},
    error::ViewerError,
    messages::{HostMessage, SurfaceMessage},
    paths::{document_title, LineSelection},
    theme::ThemeInfo,
};

pub trait Surface: Send {
    fn set_html(&mut self, html: String);
    fn post_message(&mut self, message: HostMessage) -> Result<(), ViewerError>;
    fn reveal(&mut self);
}

pub trait PanelHost: Send + Sync {
    fn create_surface(&self, title: &str, path: &Path) -> Result<Box<dyn Surface>, ViewerError>;
    fn open_text_document(
        &self,
        path: &Path,
        selection: Option<LineSelection>,
    ) -> Result<(), ViewerError>;
    fn open_document(&self, path: &Path) -> Result<(), ViewerError>;
    fn open_external(&self, href: &str) -> Result<(), ViewerError>;
    fn show_error(&self, message: &str);

    /// Locally bundled diagram library, if the host ships one.
    fn diagram_script_uri(&self) -> Option<String> {
        None
    }

    /// URL prefix under which the surface can load files next to `document`.
    fn document_base_uri(&self, _document: &Path) -> Option<String> {
        None
    }
}

pub type WatchCallback = Box<dyn Fn() + Send + Sync>;

pub trait FileWatchPort: Send + Sync {
    fn watch(&self, path: &Path, on_change: WatchCallback)
        -> Result<WatchSubscription, ViewerError>;
}

/// Live watch registration. Dropping it disposes the watch.
pub struct WatchSubscription {
    dispose: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchSubscription {
    pub fn new<F: FnOnce() + Send + 'static>(dispose: F) -> Self {
        WatchSubscription {
            dispose: Some(Box::new(dispose)),
        }
    }

    pub fn noop() -> Self {
        WatchSubscription { dispose: None }
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl std::fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("active", &self.dispose.is_some())
            .finish()
    }
}

/// A [`FileWatchPort`] that never reports changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWatchPort;

impl FileWatchPort for NoopWatchPort {
    fn watch(&self, _path: &Path, _on_change: WatchCallback) -> Result<WatchSubscription, ViewerError> {
        Ok(WatchSubscription::noop())
    }
}

/// Read and convert one document into a full page.
pub fn render_document(
    converter: &mut MarkdownConverter,
    path: &Path,
    theme: &ThemeInfo,
    assets: &PageAssets,
    options: &MarkdownOptions,
) -> Result<String, ViewerError> {
    let markdown = get_content(path)?;
    let body = converter.convert_to_html(&markdown, Some(options));
    render_page(&body, &document_title(&markdown, path), theme, assets)
}

/// Title of the surface showing `path`.
pub fn panel_title(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("Wiki: {name}")
}

/// Attach the document path to a renderer diagnostic so reports can name the page.
fn tag_renderer_message(message: String, path: &Path) -> String {
    match serde_json::from_str::<serde_json::Value>(&message) {
        Ok(serde_json::Value::Object(mut fields)) => {
            fields
                .entry("filePath")
                .or_insert_with(|| path.to_string_lossy().into_owned().into());
            serde_json::Value::Object(fields).to_string()
        }
        _ => message,
    }
}

struct OpenPanel {
    surface: Box<dyn Surface>,
    _watch: WatchSubscription,
}

struct PresenterInner {
    host: Arc<dyn PanelHost>,
    watcher: Arc<dyn FileWatchPort>,
    diagnostics: SharedDiagnostics,
    layout: RwLock<WikiLayout>,
    theme: RwLock<ThemeInfo>,
    assets: PageAssets,
    sanitize: bool,
    converter: Mutex<MarkdownConverter>,
    panels: Mutex<HashMap<PathBuf, OpenPanel>>,
}

impl PresenterInner {
    fn render(&self, path: &Path) -> Result<String, ViewerError> {
        let options = MarkdownOptions {
            base_path: self.host.document_base_uri(path),
            sanitize: self.sanitize,
        };
        let theme = self.theme.read().clone();
        let mut converter = self.converter.lock();
        render_document(&mut converter, path, &theme, &self.assets, &options)
    }

    fn render_or_report(&self, path: &Path) -> Option<String> {
        match self.render(path) {
            Ok(html) => Some(html),
            Err(e) => {
                tracing::warn!("Failed to render {:?}: {}", path, e);
                self.host.show_error(&format!("Failed to read wiki file: {e}"));
                None
            }
        }
    }

    fn refresh(&self, path: &Path) {
        if !self.panels.lock().contains_key(path) {
            return;
        }
        let Some(html) = self.render_or_report(path) else {
            return;
        };
        if let Some(panel) = self.panels.lock().get_mut(path) {
            tracing::debug!("Refreshing panel for {:?}", path);
            panel.surface.set_html(html);
        }
    }

    fn post(&self, path: &Path, message: HostMessage) {
        if let Some(panel) = self.panels.lock().get_mut(path) {
            if let Err(e) = panel.surface.post_message(message) {
                tracing::warn!("Failed to post message to panel {:?}: {}", path, e);
            }
        }
    }
}

/// Cheap to clone; clones share the same set of panels.
#[derive(Clone)]
pub struct PanelPresenter {
    inner: Arc<PresenterInner>,
}

impl PanelPresenter {
    pub fn new(
        host: Arc<dyn PanelHost>,
        watcher: Arc<dyn FileWatchPort>,
        diagnostics: SharedDiagnostics,
        layout: WikiLayout,
        theme: ThemeInfo,
        mut assets: PageAssets,
    ) -> Self {
        if assets.diagram_script_uri.is_none() {
            assets.diagram_script_uri = host.diagram_script_uri();
        }
        PanelPresenter {
            inner: Arc::new(PresenterInner {
                host,
                watcher,
                diagnostics,
                layout: RwLock::new(layout),
                theme: RwLock::new(theme),
                assets,
                sanitize: false,
                converter: Mutex::new(MarkdownConverter::new()),
                panels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Escape raw HTML in documents shown from now on.
    pub fn with_sanitize(self, sanitize: bool) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.sanitize = sanitize;
                PanelPresenter {
                    inner: Arc::new(inner),
                }
            }
            Err(inner) => {
                tracing::warn!("Presenter already shared, sanitize setting ignored");
                PanelPresenter { inner }
            }
        }
    }

    pub fn set_layout(&self, layout: WikiLayout) {
        *self.inner.layout.write() = layout;
    }

    pub fn theme(&self) -> ThemeInfo {
        self.inner.theme.read().clone()
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.inner.panels.lock().contains_key(path)
    }

    pub fn open_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.inner.panels.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Show `path`, revealing the existing panel if there is one.
    pub fn open(&self, path: &Path) -> Result<(), ViewerError> {
        if let Some(panel) = self.inner.panels.lock().get_mut(path) {
            tracing::debug!("Revealing existing panel for {:?}", path);
            panel.surface.reveal();
            return Ok(());
        }

        let mut surface = self.inner.host.create_surface(&panel_title(path), path)?;
        if let Some(html) = self.inner.render_or_report(path) {
            surface.set_html(html);
        }

        let weak: Weak<PresenterInner> = Arc::downgrade(&self.inner);
        let watched = path.to_path_buf();
        let watch = self.inner.watcher.watch(
            path,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.refresh(&watched);
                }
            }),
        );
        let watch = match watch {
            Ok(watch) => watch,
            Err(e) => {
                tracing::warn!("Live refresh disabled for {:?}: {}", path, e);
                WatchSubscription::noop()
            }
        };

        let mut panels = self.inner.panels.lock();
        match panels.get_mut(path) {
            // Opened concurrently; keep the first panel.
            Some(existing) => existing.surface.reveal(),
            None => {
                tracing::info!("Opened wiki panel for {:?}", path);
                panels.insert(
                    path.to_path_buf(),
                    OpenPanel {
                        surface,
                        _watch: watch,
                    },
                );
            }
        }
        Ok(())
    }

    /// Called by the host when a surface was closed.
    pub fn dispose_panel(&self, path: &Path) {
        // Dropped outside the lock: stopping a watch may wait for an in-flight refresh.
        let removed = self.inner.panels.lock().remove(path);
        if removed.is_some() {
            tracing::debug!("Disposed panel for {:?}", path);
        }
    }

    /// The full page for `path` as an open panel would show it.
    pub fn render(&self, path: &Path) -> Result<String, ViewerError> {
        self.inner.render(path)
    }

    pub fn refresh(&self, path: &Path) {
        self.inner.refresh(path);
    }

    pub fn refresh_all(&self) {
        for path in self.open_paths() {
            self.inner.refresh(&path);
        }
    }

    pub fn update_theme(&self, theme: ThemeInfo) {
        *self.inner.theme.write() = theme.clone();
        for panel in self.inner.panels.lock().values_mut() {
            if let Err(e) = panel.surface.post_message(HostMessage::UpdateTheme {
                theme: theme.clone(),
            }) {
                tracing::warn!("Failed to deliver theme update: {}", e);
            }
        }
    }

    /// Decode a wire message from the surface showing `path`. Malformed input is logged.
    pub fn handle_raw_message(&self, path: &Path, json: &str) {
        match serde_json::from_str::<SurfaceMessage>(json) {
            Ok(message) => self.handle_message(path, message),
            Err(e) => tracing::warn!("Ignoring malformed surface message from {:?}: {}", path, e),
        }
    }

    pub fn handle_message(&self, path: &Path, message: SurfaceMessage) {
        match message {
            SurfaceMessage::OpenWikiLink { href } => self.follow_link(path, &href),
            SurfaceMessage::OpenExternalLink { href } => {
                if let Err(e) = self.inner.host.open_external(&href) {
                    self.inner
                        .host
                        .show_error(&format!("Failed to open wiki link: {e}"));
                }
            }
            SurfaceMessage::ConsoleLog {
                message,
                level,
                source,
            } => {
                let message = if source == RENDERER_SOURCE && level == LogLevel::Error {
                    tag_renderer_message(message, path)
                } else {
                    message
                };
                self.inner.diagnostics.lock().record(message, level, source);
            }
        }
    }

    pub fn follow_link(&self, current: &Path, href: &str) {
        let layout = self.inner.layout.read().clone();
        let result = match resolve_link(href, current, &layout) {
            LinkAction::ScrollToAnchor(anchor) => {
                self.inner.post(current, HostMessage::ScrollToAnchor { anchor });
                Ok(())
            }
            LinkAction::OpenWiki { path, anchor } => self.open(&path).map(|_| {
                if let Some(anchor) = anchor {
                    self.inner.post(&path, HostMessage::ScrollToAnchor { anchor });
                }
            }),
            LinkAction::OpenDocument(path) => self.inner.host.open_document(&path),
            LinkAction::OpenText { path, selection } => {
                self.inner.host.open_text_document(&path, selection)
            }
            LinkAction::NotFound(message) => {
                self.inner.host.show_error(&message);
                Ok(())
            }
        };
        if let Err(e) = result {
            self.inner
                .host
                .show_error(&format!("Failed to open wiki link: {e}"));
        }
    }

    /// Close every panel.
    pub fn dispose(&self) {
        let closed = std::mem::take(&mut *self.inner.panels.lock());
        tracing::debug!("Disposing {} wiki panels", closed.len());
    }
}
