//! # codewiki-viewer
//!
//! A viewer for generated code wikis: markdown documents with embedded diagrams and
//! citation blocks, organized by a module description produced by the generator.
//!
//! ## Overview
//!
//! A generated wiki lives in a `.codewiki/` directory at the workspace root. It holds one
//! markdown page per module, an `overview.md` home page and, usually, a `module_tree.json`
//! describing the module hierarchy. This crate turns that directory into something a host
//! (an editor extension, a terminal, a local web server) can present:
//!
//! - a lazily materialized navigation tree,
//! - one rendered page per open document, refreshed when the file changes,
//! - link navigation between pages, to source files, and to the web,
//! - a diagnostics log of everything the rendered pages report back, with error reports
//!   for failed diagrams.
//!
//! Diagram sources are never interpreted here. The converter emits them untouched inside
//! placeholder containers and the client script shipped with every page renders them.
//!
//! ## Architecture
//!
//! - **[`codec`]**: markdown to HTML (`MarkdownConverter`), diagram and citation handling
//! - **[`tree`]**: navigation tree from `module_tree.json` or a directory listing
//! - **[`panel`]**: the panel presenter, its host ports, page assembly and link resolution
//! - **[`theme`]**: host colour scheme to diagram theme mapping
//! - **[`diagnostics`]**: bounded console log fed by presentation surfaces
//! - **[`report`]**: renderer-error reports and the error monitor
//! - **[`messages`]**: the JSON message channel between host and surface
//! - **[`viewer`]**: the per-workspace context that wires everything together
//! - **[`generate`]** (feature `service`): runs the external generator
//! - **[`watch`]** (feature `service`): `notify` backed file watching
//!
//! ## Quick Start
//!
//! ### Converting a document
//!
//! ```rust
//! use codewiki_viewer::codec::MarkdownConverter;
//!
//! let mut converter = MarkdownConverter::new();
//! let html = converter.convert_to_html("# Title\n\n```mermaid\ngraph TD\nA-->B\n```\n", None);
//! assert!(html.contains("<h1 id=\"title\">Title</h1>"));
//! assert!(html.contains("id=\"mermaid-diagram-0\""));
//! ```
//!
//! ### Walking the tree
//!
//! ```rust,no_run
//! use codewiki_viewer::{
//!     config::{WikiLayout, WikiSettings},
//!     tree::WikiTree,
//! };
//!
//! let tree = WikiTree::new(WikiLayout::new("./my-project", &WikiSettings::default()));
//! for entry in tree.children(None) {
//!     println!("{} -> {:?}", entry.label, entry.open_target);
//!     for child in tree.children(Some(&entry)) {
//!         println!("  {}", child.label);
//!     }
//! }
//! ```
//!
//! ### Hosting panels
//!
//! A host implements [`panel::PanelHost`] and [`panel::Surface`] for its UI toolkit, and hands
//! a [`panel::FileWatchPort`] (e.g. [`watch::NotifyWatchPort`]) to the [`viewer::Viewer`].
//! Messages posted by a surface are passed to
//! [`PanelPresenter::handle_raw_message`](panel::PanelPresenter::handle_raw_message); the
//! viewer's commands return [`commands::CommandOutcome`]s for the host to display.
//!
//! ## Feature Flags
//!
//! - `service` (default): file watching and the generation workflow
//! - `bin`: the `codewiki` command line tool, including the `serve` live-reload server

pub mod codec;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod event;
#[cfg(feature = "service")]
pub mod generate;
pub mod messages;
pub mod panel;
pub mod paths;
pub mod report;
#[cfg(test)]
mod tests;
pub mod theme;
pub mod tree;
pub mod viewer;
#[cfg(feature = "service")]
pub mod watch;

pub use error::*;
