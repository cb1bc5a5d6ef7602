use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static DUMP_ON_VERIFY_FAILURE: OnceLock<bool> = OnceLock::new();
static DOT_DIR: OnceLock<PathBuf> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

/// `GRAPH_IR_DUMP_ON_VERIFY_FAILURE`: log the failing function's dump when
/// verification fails.
pub(crate) fn dump_on_verify_failure() -> bool {
    *DUMP_ON_VERIFY_FAILURE.get_or_init(|| match env::var("GRAPH_IR_DUMP_ON_VERIFY_FAILURE") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}

/// `GRAPH_IR_DOT_DIR`: directory for DOT files written without an explicit path.
pub(crate) fn dot_dir() -> &'static Path {
    DOT_DIR.get_or_init(|| match env::var("GRAPH_IR_DOT_DIR") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
        _ => PathBuf::from("."),
    })
}
