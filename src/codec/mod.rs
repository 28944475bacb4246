//! Document codecs: wiki markdown to HTML.
pub mod md;

pub use md::{
    escape_attribute, viewer_md_options, MarkdownConverter, MarkdownOptions,
    DIAGRAM_LANGUAGE,
};
