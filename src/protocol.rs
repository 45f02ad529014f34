use thiserror::Error;

/// Marker prefix on the compiler's stderr carrying the calling-convention
/// descriptor for the compiled function.
pub const ABI_MARKER: &str = "ABI: ";

/// Marker prefix on the executor's stdout carrying the post-call instance
/// state.
pub const RESULT_MARKER: &str = "this_json: ";

/// A stage completed without emitting its marker line. Protocol violation,
/// reported as a stage failure by the caller.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("missing {0} marker")]
pub struct MissingMarker(pub &'static str);

/// Scans a child-process stream for `<prefix><payload>` lines and returns the
/// payload of the last match. Repeated markers resolve to the final one.
pub fn scan_marker<'a>(stream: &'a str, prefix: &'static str) -> Result<&'a str, MissingMarker> {
    stream
        .lines()
        .filter_map(|line| line.strip_prefix(prefix))
        .last()
        .ok_or_else(|| MissingMarker(prefix.trim_end_matches(": ")))
}
