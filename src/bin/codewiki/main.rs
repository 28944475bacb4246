//! codewiki CLI tool
//!
//! Command-line front end for browsing a generated code wiki.
//!
//! ## Commands
//!
//! - `tree`: Print the navigation tree of the workspace's wiki
//! - `render <page>`: Convert one wiki page into a self-contained HTML page
//! - `report <log>`: Build a renderer error report from a saved diagnostics log
//! - `generate`: Run the external documentation generator for the workspace
//! - `serve`: Serve the wiki over HTTP with live reload and console capture
//!
//! Settings are read from `codewiki.toml` in the workspace root unless `--config` points
//! elsewhere. Logging follows `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand, ValueEnum};
use codewiki_viewer::{
    commands::{Command, CommandOutcome},
    config::{ConfigProvider, TomlConfigProvider, ViewerConfig},
    diagnostics::ConsoleEntry,
    event::ViewerEvent,
    generate::{CredentialPrompt, GenerationOutcome},
    panel::{NoopWatchPort, PanelHost, Surface},
    paths::LineSelection,
    theme::HostColorScheme,
    tree::OutlineNode,
    viewer::Viewer,
    ViewerError,
};
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

mod server;

const CONFIG_FILE: &str = "codewiki.toml";

#[derive(Parser)]
#[command(name = "codewiki")]
#[command(author, version, about = "A viewer for generated code wikis", long_about = None)]
struct Cli {
    /// Workspace root containing the wiki directory
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path (default: <workspace>/codewiki.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemeArg {
    Light,
    Dark,
    HighContrast,
    HighContrastLight,
}

impl From<SchemeArg> for HostColorScheme {
    fn from(scheme: SchemeArg) -> Self {
        match scheme {
            SchemeArg::Light => HostColorScheme::Light,
            SchemeArg::Dark => HostColorScheme::Dark,
            SchemeArg::HighContrast => HostColorScheme::HighContrast,
            SchemeArg::HighContrastLight => HostColorScheme::HighContrastLight,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum ReportFormat {
    /// Markdown summary with source excerpts
    #[default]
    Summary,
    /// Narrative request for an assistant
    Prompt,
    /// Plain listing of every failure
    Listing,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the navigation tree
    Tree {
        /// Emit the expanded tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render one wiki page to HTML
    Render {
        /// Markdown page to render
        page: PathBuf,

        /// Write the page here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Colour scheme the page starts with
        #[arg(long, value_enum, default_value = "dark")]
        scheme: SchemeArg,

        /// Escape raw HTML embedded in the page
        #[arg(long)]
        sanitize: bool,
    },

    /// Compose a renderer error report from a saved diagnostics log
    Report {
        /// Log file with one formatted console entry per line
        log: PathBuf,

        #[arg(long, value_enum, default_value = "summary")]
        format: ReportFormat,
    },

    /// Generate the wiki with the external generator
    Generate,

    /// Serve the wiki with live reload
    Serve {
        /// Port for the server (default: 9037)
        #[arg(long, default_value = "9037")]
        port: u16,

        #[arg(long, value_enum, default_value = "dark")]
        scheme: SchemeArg,
    },
}

/// Host for a terminal session: documents are reported, never displayed.
struct TerminalHost;

impl PanelHost for TerminalHost {
    fn create_surface(&self, title: &str, _path: &Path) -> Result<Box<dyn Surface>, ViewerError> {
        Err(ViewerError::Host(format!(
            "cannot display \"{title}\" in a terminal; use `codewiki serve`"
        )))
    }

    fn open_text_document(
        &self,
        path: &Path,
        selection: Option<LineSelection>,
    ) -> Result<(), ViewerError> {
        match selection {
            Some(lines) => println!(
                "{}:{}-{}",
                path.display(),
                lines.start_line + 1,
                lines.end_line + 1
            ),
            None => println!("{}", path.display()),
        }
        Ok(())
    }

    fn open_document(&self, path: &Path) -> Result<(), ViewerError> {
        println!("{}", path.display());
        Ok(())
    }

    fn open_external(&self, url: &str) -> Result<(), ViewerError> {
        println!("{url}");
        Ok(())
    }

    fn show_error(&self, message: &str) {
        eprintln!("Error: {message}");
    }
}

/// Reads the API key from standard input.
struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn request_api_key(&self) -> Option<String> {
        print!("Enter your API key for CodeWiki (leave empty to cancel): ");
        std::io::stdout().flush().ok()?;
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).ok()?;
        let key = input.trim().to_string();
        (!key.is_empty()).then_some(key)
    }
}

fn print_outline(nodes: &[OutlineNode], depth: usize) {
    for node in nodes {
        let entry = &node.entry;
        let marker = if entry.is_directory { "/" } else { "" };
        let note = if entry.open_target.is_none() && !entry.is_directory {
            "  (no page)"
        } else {
            ""
        };
        println!("{}{}{}{}", "  ".repeat(depth), entry.label, marker, note);
        print_outline(&node.children, depth + 1);
    }
}

fn print_event(event: &ViewerEvent) {
    match event {
        ViewerEvent::GenerationProgress(message) => println!("{message}"),
        ViewerEvent::GenerationOutput { line, stderr: false } => println!("  {line}"),
        ViewerEvent::GenerationOutput { line, stderr: true } => eprintln!("  {line}"),
        ViewerEvent::GenerationFailed(message) => eprintln!("Error: {message}"),
        ViewerEvent::GenerationCancelled(message) => println!("{message}"),
        ViewerEvent::Notification { message, .. } => println!("{message}"),
        ViewerEvent::GenerationFinished | ViewerEvent::TreeChanged => {
            tracing::debug!("{}", event)
        }
    }
}

fn load_config(workspace: &Path, config: Option<PathBuf>) -> Result<ViewerConfig, ViewerError> {
    let config_path = config.unwrap_or_else(|| workspace.join(CONFIG_FILE));
    TomlConfigProvider::new(config_path).load()
}

fn load_viewer(
    workspace: &Path,
    config: Option<PathBuf>,
) -> Result<(Viewer, UnboundedReceiver<ViewerEvent>), ViewerError> {
    Ok(build_viewer(workspace, load_config(workspace, config)?))
}

/// Terminal commands never open panels, so no per-document watch is needed.
fn build_viewer(workspace: &Path, config: ViewerConfig) -> (Viewer, UnboundedReceiver<ViewerEvent>) {
    let (tx, rx) = unbounded_channel();
    let viewer = Viewer::new(
        workspace,
        config,
        Arc::new(TerminalHost),
        Arc::new(NoopWatchPort),
        tx,
    );
    (viewer, rx)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let workspace = std::path::absolute(&cli.workspace)?;

    match cli.command {
        Commands::Tree { json } => {
            let (viewer, _events) = load_viewer(&workspace, cli.config)?;
            if !viewer.has_wiki() {
                eprintln!(
                    "No wiki found at {}. Run `codewiki generate` first.",
                    viewer.layout().wiki_root.display()
                );
                std::process::exit(1);
            }
            let outline = viewer.tree().outline();
            if json {
                println!("{}", serde_json::to_string_pretty(&outline)?);
            } else {
                print_outline(&outline, 0);
            }
            Ok(())
        }

        Commands::Render {
            page,
            output,
            scheme,
            sanitize,
        } => {
            let mut config = load_config(&workspace, cli.config)?;
            config.wiki.sanitize_html |= sanitize;
            let (viewer, _events) = build_viewer(&workspace, config);
            viewer.execute(Command::SetColorScheme(scheme.into()))?;
            let html = viewer.presenter().render(&page)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, html)?;
                    println!("Rendered {} to {}", page.display(), path.display());
                }
                None => print!("{html}"),
            }
            Ok(())
        }

        Commands::Report { log, format } => {
            let (viewer, _events) = load_viewer(&workspace, cli.config)?;
            let content = std::fs::read_to_string(&log)?;
            let mut skipped = 0usize;
            {
                let diagnostics = viewer.diagnostics();
                let mut diagnostics = diagnostics.lock();
                for line in content.lines().filter(|l| !l.trim().is_empty()) {
                    match ConsoleEntry::parse_line(line) {
                        Some(entry) => diagnostics.push(entry),
                        None => skipped += 1,
                    }
                }
            }
            if skipped > 0 {
                tracing::warn!("Skipped {} unrecognized lines in {}", skipped, log.display());
            }
            let command = match format {
                ReportFormat::Summary => Command::ShowErrorReport,
                ReportFormat::Prompt => Command::CopyHelpRequest,
                ReportFormat::Listing => Command::ShowRendererErrors,
            };
            match viewer.execute(command)? {
                CommandOutcome::Document { content, .. } | CommandOutcome::Clipboard(content) => {
                    println!("{content}")
                }
                CommandOutcome::Message(message) => println!("{message}"),
                CommandOutcome::Ok => {}
            }
            Ok(())
        }

        Commands::Generate => {
            let (viewer, mut events) =
                load_viewer(&workspace, cli.config)?;
            let workflow = viewer.generation(Arc::new(TerminalPrompt));
            let handle = workflow.handle();
            ctrlc::set_handler(move || {
                println!("\nCancelling...");
                handle.cancel();
            })?;

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let outcome = runtime.block_on(async {
                let tree = viewer.tree();
                let run = tokio::spawn(async move { workflow.run(&tree).await });
                while let Some(event) = events.recv().await {
                    print_event(&event);
                    if matches!(
                        event,
                        ViewerEvent::GenerationFinished
                            | ViewerEvent::GenerationFailed(_)
                            | ViewerEvent::GenerationCancelled(_)
                    ) {
                        break;
                    }
                }
                run.await
                    .map_err(|e| ViewerError::Custom(format!("Generation task failed: {e}")))?
            });

            match outcome {
                Ok(GenerationOutcome::Completed) => Ok(()),
                Ok(GenerationOutcome::Cancelled(_)) => std::process::exit(130),
                Err(_) => std::process::exit(1),
            }
        }

        Commands::Serve { port, scheme } => {
            let (viewer, events) = load_viewer(&workspace, cli.config)?;
            viewer.execute(Command::SetColorScheme(scheme.into()))?;
            let viewer = Arc::new(viewer);

            println!(
                "Serving {}. Press Ctrl-C to stop.",
                viewer.layout().wiki_root.display()
            );

            let running = Arc::new(std::sync::atomic::AtomicBool::new(true));
            let r = running.clone();
            ctrlc::set_handler(move || {
                println!("\nShutting down...");
                r.store(false, std::sync::atomic::Ordering::SeqCst);
            })?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async {
                let printer = tokio::spawn(async move {
                    let mut events = events;
                    while let Some(event) = events.recv().await {
                        print_event(&event);
                    }
                });

                let shutdown = async move {
                    while running.load(std::sync::atomic::Ordering::SeqCst) {
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                };
                let result = server::WikiServer::new(viewer.clone(), port)
                    .serve(shutdown)
                    .await;
                viewer.dispose();
                printer.abort();
                result
            })?;

            println!("Shutdown complete");
            Ok(())
        }
    }
}
