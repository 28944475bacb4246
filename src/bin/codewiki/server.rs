//! Wiki server with live reload
//!
//! Serves the workspace's wiki over HTTP:
//! - Renders wiki pages on request, with the same converter and page assets a host panel uses
//! - Serves every other file below the wiki root (images, SVG exports) as is
//! - Watches the wiki directory and sends Server-Sent Events (SSE) so open pages reload
//! - Accepts console output forwarded by pages, feeding the renderer error report

use axum::{
    extract::{Path as UrlPath, Query, Request, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        Html, IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use codewiki_viewer::{
    codec::{MarkdownConverter, MarkdownOptions},
    commands::{Command, CommandOutcome},
    messages::SurfaceMessage,
    panel::{escape_html, render_document, render_page, PageAssets},
    paths::{is_markdown, with_markdown_extension},
    tree::scan,
    viewer::Viewer,
    watch::{watch_wiki, DEFAULT_DEBOUNCE},
    ViewerError,
};
use serde::Deserialize;
use std::{
    convert::Infallible,
    net::SocketAddr,
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower::ServiceExt;
use tower_http::{services::ServeFile, trace::TraceLayer};

pub const EVENTS_ROUTE: &str = "/events";
pub const CONSOLE_ROUTE: &str = "/__codewiki/console";
pub const REPORT_ROUTE: &str = "/__codewiki/report";
pub const TREE_ROUTE: &str = "/__codewiki/tree";

/// Notification sent to SSE clients
#[derive(Debug, Clone)]
pub enum ServerNotification {
    /// Wiki files changed, reload page
    Reload {
        /// First changed file, for the log
        path: Option<PathBuf>,
    },
    /// Server is shutting down, close connection
    Shutdown,
}

#[derive(Clone)]
struct ServerState {
    notify_tx: broadcast::Sender<ServerNotification>,
    viewer: Arc<Viewer>,
}

/// Error page for a failed request.
struct PageError(ViewerError);

impl From<ViewerError> for PageError {
    fn from(e: ViewerError) -> Self {
        PageError(e)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        tracing::debug!("[WikiServer] {} {}", status, self.0);
        (status, self.0.to_string()).into_response()
    }
}

pub struct WikiServer {
    notify_tx: broadcast::Sender<ServerNotification>,
    port: u16,
    viewer: Arc<Viewer>,
}

impl WikiServer {
    pub fn new(viewer: Arc<Viewer>, port: u16) -> Self {
        // Channel capacity: keep last 100 notifications
        let (notify_tx, _) = broadcast::channel(100);
        Self {
            notify_tx,
            port,
            viewer,
        }
    }

    /// Serve until `shutdown_signal` resolves.
    pub async fn serve(
        self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let notify_tx_for_shutdown = self.notify_tx.clone();
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let wiki_root = self.viewer.layout().wiki_root;

        let state = ServerState {
            notify_tx: self.notify_tx.clone(),
            viewer: self.viewer.clone(),
        };

        let app = Router::new()
            .route("/", get(index_handler))
            .route(EVENTS_ROUTE, get(sse_handler))
            .route(CONSOLE_ROUTE, post(console_handler))
            .route(REPORT_ROUTE, get(report_handler))
            .route(TREE_ROUTE, get(tree_handler))
            .route("/*path", get(page_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        tracing::info!("Wiki server starting on http://{}", addr);
        println!("\nWiki server running at http://{}", addr);
        println!("Serving: {}", wiki_root.display());
        println!("Renderer report: http://{}{}\n", addr, REPORT_ROUTE);

        // Pages are rendered per request, so a change only has to drop the tree cache and
        // tell the open pages to reload.
        let tree = self.viewer.tree();
        let notify_tx_for_watcher = self.notify_tx.clone();
        let wiki_watch = watch_wiki(
            &wiki_root,
            DEFAULT_DEBOUNCE,
            Arc::new(move |changed: Vec<PathBuf>| {
                tree.invalidate();
                tracing::debug!(
                    "[WikiServer] {} wiki files changed, sending reload notification",
                    changed.len()
                );
                let _ = notify_tx_for_watcher.send(ServerNotification::Reload {
                    path: changed.into_iter().next(),
                });
            }),
        );
        let wiki_watch = match wiki_watch {
            Ok(watch) => Some(watch),
            Err(e) => {
                tracing::warn!(
                    "[WikiServer] Live reload disabled for {}: {}",
                    wiki_root.display(),
                    e
                );
                None
            }
        };

        let (monitor_tx, monitor_rx) = tokio::sync::watch::channel(false);
        let monitor = self
            .viewer
            .config()
            .diagnostics
            .auto_monitor
            .then(|| {
                let viewer = self.viewer.clone();
                tokio::spawn(async move { viewer.monitor_renderer_errors(monitor_rx).await })
            });

        let listener = tokio::net::TcpListener::bind(addr).await?;

        // Wrap shutdown signal to send notification to SSE clients before shutdown
        let wrapped_shutdown = async move {
            shutdown_signal.await;
            // Sent twice: the first produces the close event, the second ends the stream
            let _ = notify_tx_for_shutdown.send(ServerNotification::Shutdown);
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = notify_tx_for_shutdown.send(ServerNotification::Shutdown);
            tokio::time::sleep(Duration::from_millis(200)).await;
        };

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(wrapped_shutdown)
            .await?;

        monitor_tx.send_replace(true);
        if let Some(monitor) = monitor {
            let _ = monitor.await;
        }
        drop(wiki_watch);

        tracing::info!("Wiki server shut down");
        Ok(())
    }
}

/// Page assets for one served document.
fn page_assets(viewer: &Viewer, relative: &str) -> PageAssets {
    let mut assets = PageAssets::new(&viewer.config().diagram);
    let page: String = url::form_urlencoded::byte_serialize(relative.as_bytes()).collect();
    assets.console_endpoint = Some(format!("{CONSOLE_ROUTE}?page={page}"));
    assets.events_endpoint = Some(EVENTS_ROUTE.to_string());
    assets
}

/// A file below the wiki root answering a request.
#[derive(Debug, Clone, PartialEq)]
enum ServedFile {
    /// Markdown, rendered into a full page
    Page(PathBuf),
    /// Anything else, sent with its own content type
    Asset(PathBuf),
}

/// Map a request path onto a file below `wiki_root`. Escaping the wiki root is refused.
fn resolve_page(wiki_root: &Path, request: &str) -> Result<ServedFile, ViewerError> {
    let relative = Path::new(request.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ViewerError::PermissionDenied);
    }
    let candidate = wiki_root.join(relative);
    let file = if candidate.is_dir() {
        let name = candidate
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        candidate.join(format!("{name}.md"))
    } else {
        with_markdown_extension(candidate)
    };
    if !file.is_file() {
        return Err(ViewerError::NotFound(format!("No wiki page at /{request}")));
    }
    if is_markdown(&file) {
        Ok(ServedFile::Page(file))
    } else {
        Ok(ServedFile::Asset(file))
    }
}

fn render(viewer: &Viewer, page: &Path) -> Result<Html<String>, PageError> {
    let layout = viewer.layout();
    let relative = page
        .strip_prefix(&layout.wiki_root)
        .map_err(ViewerError::from)?
        .to_string_lossy()
        .replace('\\', "/");
    let html = render_document(
        &mut MarkdownConverter::new(),
        page,
        &viewer.presenter().theme(),
        &page_assets(viewer, &relative),
        &MarkdownOptions {
            sanitize: viewer.config().wiki.sanitize_html,
            ..Default::default()
        },
    )?;
    Ok(Html(html))
}

async fn index_handler(State(state): State<ServerState>) -> Result<Html<String>, PageError> {
    let layout = state.viewer.layout();
    if layout.overview.is_file() {
        return render(&state.viewer, &layout.overview);
    }
    tracing::debug!("[WikiServer] No overview page, listing documents");
    let mut body = String::from("<h1 id=\"wiki-pages\">Wiki pages</h1>\n<ul>\n");
    for document in scan::all_documents(&layout.wiki_root) {
        let relative = document
            .strip_prefix(&layout.wiki_root)
            .map_err(ViewerError::from)?
            .to_string_lossy()
            .replace('\\', "/");
        body.push_str(&format!(
            "<li><a href=\"/{0}\">{0}</a></li>\n",
            escape_html(&relative)
        ));
    }
    body.push_str("</ul>\n");
    let html = render_page(
        &body,
        "Wiki pages",
        &state.viewer.presenter().theme(),
        &page_assets(&state.viewer, ""),
    )?;
    Ok(Html(html))
}

async fn page_handler(
    State(state): State<ServerState>,
    UrlPath(path): UrlPath<String>,
    request: Request,
) -> Result<Response, PageError> {
    match resolve_page(&state.viewer.layout().wiki_root, &path)? {
        ServedFile::Page(page) => Ok(render(&state.viewer, &page)?.into_response()),
        ServedFile::Asset(file) => {
            tracing::trace!("[WikiServer] serving {} as is", file.display());
            let response = match ServeFile::new(&file).oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            Ok(response.into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConsoleQuery {
    page: Option<String>,
}

async fn console_handler(
    State(state): State<ServerState>,
    Query(query): Query<ConsoleQuery>,
    Json(message): Json<SurfaceMessage>,
) -> StatusCode {
    let wiki_root = state.viewer.layout().wiki_root;
    let page = query
        .page
        .map(|page| wiki_root.join(page.trim_start_matches('/')))
        .unwrap_or(wiki_root);
    match message {
        message @ SurfaceMessage::ConsoleLog { .. } => {
            state.viewer.presenter().handle_message(&page, message);
            StatusCode::NO_CONTENT
        }
        other => {
            tracing::debug!("[WikiServer] Ignoring navigation message {:?}", other);
            StatusCode::BAD_REQUEST
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ReportKind {
    #[default]
    Summary,
    Prompt,
    Listing,
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    #[serde(default)]
    format: ReportKind,
}

async fn report_handler(
    State(state): State<ServerState>,
    Query(query): Query<ReportQuery>,
) -> Result<String, PageError> {
    let command = match query.format {
        ReportKind::Summary => Command::ShowErrorReport,
        ReportKind::Prompt => Command::CopyHelpRequest,
        ReportKind::Listing => Command::ShowRendererErrors,
    };
    Ok(match state.viewer.execute(command)? {
        CommandOutcome::Document { content, .. } | CommandOutcome::Clipboard(content) => content,
        CommandOutcome::Message(message) => message,
        CommandOutcome::Ok => String::new(),
    })
}

async fn tree_handler(State(state): State<ServerState>) -> Response {
    Json(state.viewer.tree().outline()).into_response()
}

/// SSE endpoint handler
async fn sse_handler(
    State(state): State<ServerState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.notify_tx.subscribe();
    let stream = BroadcastStream::new(rx);

    let mut saw_shutdown = false;
    let stream = stream.filter_map(move |result| match result {
        Ok(ServerNotification::Reload { path }) => {
            tracing::trace!("[WikiServer] reload after change to {:?}", path);
            Some(Ok(Event::default().event("reload").data("reload")))
        }
        Ok(ServerNotification::Shutdown) => {
            // Send explicit close event to browser, then close stream on next poll
            if !saw_shutdown {
                saw_shutdown = true;
                Some(Ok(Event::default()
                    .event("close")
                    .data("Server shutting down")))
            } else {
                None
            }
        }
        Err(_) => {
            // Lagged behind, send reload anyway
            Some(Ok(Event::default().event("reload").data("reload")))
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
