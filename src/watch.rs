//! Filesystem watching backed by `notify-debouncer-full`.
//!
//! [`NotifyWatchPort`] implements [`FileWatchPort`] for the panel presenter: one debouncer per
//! open document, owned by the returned [`WatchSubscription`]. [`watch_wiki`] watches a whole
//! wiki directory and is used to drive live reload.
use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher},
    DebounceEventResult, Debouncer, FileIdMap,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{
    error::ViewerError,
    panel::{FileWatchPort, WatchCallback, WatchSubscription},
    paths::is_markdown,
};

type DocumentWatcher = Debouncer<RecommendedWatcher, FileIdMap>;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn into_subscription(debouncer: DocumentWatcher) -> WatchSubscription {
    WatchSubscription::new(move || {
        tracing::debug!("Stopping file watcher");
        debouncer.stop();
    })
}

#[derive(Debug, Clone, Copy)]
pub struct NotifyWatchPort {
    debounce: Duration,
}

impl Default for NotifyWatchPort {
    fn default() -> Self {
        NotifyWatchPort {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl NotifyWatchPort {
    pub fn new(debounce: Duration) -> Self {
        NotifyWatchPort { debounce }
    }
}

impl FileWatchPort for NotifyWatchPort {
    /// Watches the parent directory so editors that replace the file on save are still seen.
    fn watch(
        &self,
        path: &Path,
        on_change: WatchCallback,
    ) -> Result<WatchSubscription, ViewerError> {
        let target: PathBuf = path.to_path_buf();
        let parent = path
            .parent()
            .ok_or_else(|| ViewerError::NotFound(format!("No parent directory for {path:?}")))?
            .to_path_buf();
        let filter_target = target.clone();
        let mut debouncer = new_debouncer(
            self.debounce,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let touched = events.iter().any(|event| {
                        is_content_change(&event.event.kind)
                            && event.paths.iter().any(|p| p == &filter_target)
                    });
                    if touched {
                        tracing::debug!("[Watcher] {:?} changed", filter_target);
                        on_change();
                    }
                }
                Err(errors) => {
                    tracing::warn!("[Watcher] errors for {:?}: {:?}", filter_target, errors);
                }
            },
        )?;
        debouncer
            .watcher()
            .watch(&parent, RecursiveMode::NonRecursive)?;
        tracing::debug!("[Watcher] watching {:?}", target);
        Ok(into_subscription(debouncer))
    }
}

/// Watch every wiki page and the module description below `wiki_root`.
pub fn watch_wiki(
    wiki_root: &Path,
    debounce: Duration,
    on_change: Arc<dyn Fn(Vec<PathBuf>) + Send + Sync>,
) -> Result<WatchSubscription, ViewerError> {
    let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
        match result {
            Ok(events) => {
                let mut changed: Vec<PathBuf> = events
                    .iter()
                    .filter(|event| is_content_change(&event.event.kind))
                    .flat_map(|event| event.paths.iter())
                    .filter(|p| {
                        !is_hidden(p)
                            && (is_markdown(p)
                                || p.extension().map(|ext| ext == "json").unwrap_or(false))
                    })
                    .cloned()
                    .collect();
                changed.sort();
                changed.dedup();
                if !changed.is_empty() {
                    tracing::debug!("[Watcher] {} wiki files changed", changed.len());
                    on_change(changed);
                }
            }
            Err(errors) => {
                tracing::warn!("[Watcher] wiki watcher errors: {:?}", errors);
            }
        }
    })?;
    debouncer
        .watcher()
        .watch(wiki_root, RecursiveMode::Recursive)?;
    tracing::info!("[Watcher] watching wiki at {}", wiki_root.display());
    Ok(into_subscription(debouncer))
}
