pub mod path;

pub use path::{
    document_title, is_markdown, normalize_path, resolve_from, split_fragment,
    strip_markdown_suffix, to_anchor, with_markdown_extension, LineSelection,
};
