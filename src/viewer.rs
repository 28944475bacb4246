//! The viewer context a host holds for one workspace.
use parking_lot::{Mutex, RwLock};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    commands::{Command, CommandOutcome},
    config::{ViewerConfig, WikiLayout},
    diagnostics::{DiagnosticsLog, SharedDiagnostics},
    error::ViewerError,
    event::ViewerEvent,
    panel::{FileWatchPort, PageAssets, PanelHost, PanelPresenter},
    report::{
        compose_error_listing, compose_help_request, compose_report, ErrorMonitor,
        RendererFailure, NO_ERRORS_HELP,
    },
    theme::{HostColorScheme, ThemeMapper},
    tree::{TreeEntry, WikiTree},
};

pub struct Viewer {
    config: ViewerConfig,
    layout: RwLock<WikiLayout>,
    tree: Arc<WikiTree>,
    diagnostics: SharedDiagnostics,
    theme_mapper: ThemeMapper,
    scheme: RwLock<HostColorScheme>,
    presenter: PanelPresenter,
    monitor: Mutex<ErrorMonitor>,
    events: UnboundedSender<ViewerEvent>,
}

impl Viewer {
    pub fn new<P: AsRef<Path>>(
        workspace_root: P,
        config: ViewerConfig,
        host: Arc<dyn PanelHost>,
        watcher: Arc<dyn FileWatchPort>,
        events: UnboundedSender<ViewerEvent>,
    ) -> Self {
        let layout = WikiLayout::new(workspace_root, &config.wiki);
        let diagnostics = DiagnosticsLog::shared(config.diagnostics.max_entries);
        let theme_mapper = ThemeMapper::new(&config.diagram);
        let scheme = HostColorScheme::default();
        let presenter = PanelPresenter::new(
            host,
            watcher,
            diagnostics.clone(),
            layout.clone(),
            theme_mapper.theme_for(scheme),
            PageAssets::new(&config.diagram),
        )
        .with_sanitize(config.wiki.sanitize_html);
        tracing::info!("Viewer ready for {}", layout.workspace_root.display());
        Viewer {
            tree: Arc::new(WikiTree::new(layout.clone())),
            layout: RwLock::new(layout),
            config,
            diagnostics,
            theme_mapper,
            scheme: RwLock::new(scheme),
            presenter,
            monitor: Mutex::new(ErrorMonitor::new()),
            events,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn layout(&self) -> WikiLayout {
        self.layout.read().clone()
    }

    pub fn tree(&self) -> Arc<WikiTree> {
        self.tree.clone()
    }

    pub fn diagnostics(&self) -> SharedDiagnostics {
        self.diagnostics.clone()
    }

    pub fn presenter(&self) -> &PanelPresenter {
        &self.presenter
    }

    pub fn has_wiki(&self) -> bool {
        self.layout.read().wiki_root.is_dir()
    }

    pub fn children(&self, entry: Option<&TreeEntry>) -> Vec<TreeEntry> {
        self.tree.children(entry)
    }

    /// Switch to another workspace folder; cached tree data is dropped.
    pub fn set_workspace_root<P: AsRef<Path>>(&self, workspace_root: P) {
        let layout = WikiLayout::new(workspace_root, &self.config.wiki);
        self.tree.set_layout(Some(layout.clone()));
        self.presenter.set_layout(layout.clone());
        *self.layout.write() = layout;
        self.emit(ViewerEvent::TreeChanged);
    }

    fn emit(&self, event: ViewerEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Viewer event receiver dropped");
        }
    }

    pub fn renderer_failures(&self) -> Vec<RendererFailure> {
        RendererFailure::from_entries(self.diagnostics.lock().entries())
    }

    /// One poll of the renderer-error monitor.
    pub fn check_renderer_errors(&self) -> Option<String> {
        let count = self.diagnostics.lock().renderer_error_entries().len();
        let notice = self.monitor.lock().check(count);
        if let Some(message) = &notice {
            self.emit(ViewerEvent::warn(message.clone()));
        }
        notice
    }

    pub fn execute(&self, command: Command) -> Result<CommandOutcome, ViewerError> {
        tracing::debug!("Executing {}", command);
        let outcome = match command {
            Command::Refresh => {
                self.tree.invalidate();
                self.presenter.refresh_all();
                self.emit(ViewerEvent::TreeChanged);
                CommandOutcome::Ok
            }
            Command::OpenFile(path) => {
                self.presenter.open(&path)?;
                CommandOutcome::Ok
            }
            Command::ShowDebugOutput => {
                let lines = self.diagnostics.lock().formatted();
                if lines.is_empty() {
                    CommandOutcome::Message("No debug output captured yet.".to_string())
                } else {
                    CommandOutcome::log_document(lines.join("\n"))
                }
            }
            Command::ShowRendererErrors => {
                let failures = self.renderer_failures();
                if failures.is_empty() {
                    CommandOutcome::Message("No Mermaid errors captured.".to_string())
                } else {
                    CommandOutcome::log_document(compose_error_listing(&failures))
                }
            }
            Command::ClearDebugOutput => {
                self.diagnostics.lock().clear();
                CommandOutcome::Message("Debug output cleared.".to_string())
            }
            Command::ShowErrorReport => CommandOutcome::markdown_document(compose_report(
                &self.renderer_failures(),
                self.config.diagnostics.excerpt_chars,
            )),
            Command::CopyHelpRequest => {
                let failures = self.renderer_failures();
                let help = compose_help_request(&failures);
                if help == NO_ERRORS_HELP {
                    CommandOutcome::Message(help)
                } else {
                    CommandOutcome::Clipboard(help)
                }
            }
            Command::SetColorScheme(scheme) => {
                *self.scheme.write() = scheme;
                self.presenter
                    .update_theme(self.theme_mapper.theme_for(scheme));
                CommandOutcome::Ok
            }
            Command::CheckRendererErrors => match self.check_renderer_errors() {
                Some(message) => CommandOutcome::Message(message),
                None => CommandOutcome::Ok,
            },
        };
        Ok(outcome)
    }

    pub fn color_scheme(&self) -> HostColorScheme {
        *self.scheme.read()
    }

    /// Document opened for a tree entry, if the entry is openable.
    pub fn open_target(entry: &TreeEntry) -> Option<PathBuf> {
        entry.open_target.clone()
    }

    #[cfg(feature = "service")]
    pub fn generation(
        &self,
        prompt: Arc<dyn crate::generate::CredentialPrompt>,
    ) -> crate::generate::GenerationWorkflow {
        crate::generate::GenerationWorkflow::new(
            self.layout(),
            self.config.generator.clone(),
            prompt,
            self.events.clone(),
        )
    }

    /// Poll the renderer-error monitor until `shutdown` flips to `true`.
    #[cfg(feature = "service")]
    pub async fn monitor_renderer_errors(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        let period =
            std::time::Duration::from_millis(self.config.diagnostics.monitor_interval_ms.max(1));
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_renderer_errors();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    pub fn dispose(&self) {
        self.presenter.dispose();
    }
}
