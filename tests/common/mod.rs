//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use codewiki_viewer::config::{WikiLayout, WikiSettings};
use std::{fs, path::Path};
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[allow(dead_code)]
pub fn layout(temp_dir: &TempDir) -> WikiLayout {
    WikiLayout::new(temp_dir.path(), &WikiSettings::default())
}

/// Create a wiki described by a module tree.
///
/// ```text
/// .codewiki/
///   overview.md
///   module_tree.json   api { handlers, models { user } }, Utils, cli
///   api.md  handlers.md  models.md  user.md  Utils.md
/// ```
///
/// `cli.md` is deliberately missing.
#[allow(dead_code)]
pub fn create_module_wiki(temp_dir: &TempDir) -> WikiLayout {
    let layout = layout(temp_dir);
    fs::create_dir_all(&layout.wiki_root).unwrap();
    fs::write(&layout.overview, "# Project Overview\n\nWelcome.\n").unwrap();
    fs::write(
        &layout.module_tree,
        r#"{
  "api": {
    "path": "src/api",
    "components": ["Router"],
    "children": {
      "handlers": {"path": "src/api/handlers.rs", "components": ["get", "post"]},
      "models": {
        "path": "src/api/models",
        "children": {"user": {"path": "src/api/models/user.rs"}}
      }
    }
  },
  "Utils": {"path": "src/utils.rs", "children": {}},
  "cli": {"path": "src/cli.rs"}
}"#,
    )
    .unwrap();
    for page in ["api", "handlers", "models", "user", "Utils"] {
        fs::write(
            layout.wiki_root.join(format!("{page}.md")),
            format!("# {page}\n"),
        )
        .unwrap();
    }
    layout
}

/// Create a wiki without a module tree.
///
/// ```text
/// .codewiki/
///   overview.md
///   guide.md
///   Zeta.md
///   notes.txt          ignored
///   api.md             hidden by the api/ directory
///   api/
///     api.md           directory index, not listed
///     endpoints.md
///   misc/
///     readme.md
/// ```
#[allow(dead_code)]
pub fn create_plain_wiki(temp_dir: &TempDir) -> WikiLayout {
    let layout = layout(temp_dir);
    let api = layout.wiki_root.join("api");
    let misc = layout.wiki_root.join("misc");
    fs::create_dir_all(&api).unwrap();
    fs::create_dir_all(&misc).unwrap();
    write_page(&layout.overview, "# Overview\n");
    write_page(&layout.wiki_root.join("guide.md"), "# Guide\n");
    write_page(&layout.wiki_root.join("Zeta.md"), "# Zeta\n");
    write_page(&layout.wiki_root.join("notes.txt"), "scratch\n");
    write_page(&layout.wiki_root.join("api.md"), "# API (top level)\n");
    write_page(&api.join("api.md"), "# API\n");
    write_page(&api.join("endpoints.md"), "# Endpoints\n");
    write_page(&misc.join("readme.md"), "# Readme\n");
    layout
}

#[allow(dead_code)]
pub fn write_page(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

/// Install a fake virtual environment whose `activate` puts stub `uv` and generator
/// executables first on `PATH`.
///
/// The stub generator prints `config_show` for `config show`, records the key passed to
/// `config set`, and for `generate --output DIR` writes an overview and a module tree into
/// `DIR`. `generate_exit` is its exit code for `generate`.
#[cfg(unix)]
#[allow(dead_code)]
pub fn install_stub_generator(workspace: &Path, config_show: &str, generate_exit: i32) {
    use std::os::unix::fs::PermissionsExt;

    let stubs = workspace.join("stubs");
    let venv_bin = workspace.join(".venv").join("bin");
    fs::create_dir_all(&stubs).unwrap();
    fs::create_dir_all(&venv_bin).unwrap();
    fs::write(
        venv_bin.join("activate"),
        format!("PATH=\"{}:$PATH\"\nexport PATH\n", stubs.display()),
    )
    .unwrap();

    let uv = "#!/bin/sh\necho \"uv $*\"\nexit 0\n".to_string();
    let codewiki = format!(
        r#"#!/bin/sh
case "$1 $2" in
  "config show")
    printf '%s\n' '{config_show}'
    ;;
  "config set")
    printf '%s' "$4" > "{workspace}/stored_key"
    ;;
  "generate --output")
    echo "Analyzing repository"
    echo "warning: slow model" >&2
    mkdir -p "$3"
    printf '# Overview\n' > "$3/overview.md"
    printf '{{"core": {{"path": "src/core"}}}}' > "$3/module_tree.json"
    exit {generate_exit}
    ;;
esac
"#,
        workspace = workspace.display(),
    );
    for (name, script) in [("uv", uv), ("codewiki", codewiki)] {
        let path = stubs.join(name);
        fs::write(&path, script).unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).unwrap();
    }
}
