//! Resource converters.
//!
//! Each converter knows one API object: which of its fields reference
//! workspace files, which fields go first in the generated YAML, which are
//! dropped and which need forced quoting.

pub mod app;
pub mod job;
pub mod pipeline;

use std::sync::OnceLock;

use regex::Regex;

pub use app::App;
pub use job::Job;
pub use pipeline::Pipeline;

/// Turns a display name into a resource key: lowercase, every run of
/// non-alphanumeric characters collapsed to one `_`, no leading or trailing `_`.
pub fn normalize_key(name: &str) -> String {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    let separators =
        SEPARATORS.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").expect("separator pattern is valid"));
    let lowered = name.to_lowercase();
    separators
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Workspace paths are absolute; anything else (`dbfs:/`, repo-relative) is left alone.
pub(crate) fn is_workspace_path(path: &str) -> bool {
    path.starts_with('/')
}
