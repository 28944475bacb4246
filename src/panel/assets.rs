//! Client assets compiled into the binary.
use include_dir::{include_dir, Dir};

static ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets");

pub const STYLESHEET: &str = "viewer.css";
pub const CLIENT_SCRIPT: &str = "viewer.js";

pub fn get_asset(name: &str) -> Option<&'static str> {
    ASSETS.get_file(name).and_then(|file| file.contents_utf8())
}

pub fn stylesheet() -> &'static str {
    get_asset(STYLESHEET).unwrap_or_default()
}

pub fn client_script() -> &'static str {
    get_asset(CLIENT_SCRIPT).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_assets_are_present() {
        assert!(stylesheet().contains(".mermaid-error"));
        assert!(client_script().contains("codewiki-config"));
        assert!(get_asset("missing.js").is_none());
    }
}
