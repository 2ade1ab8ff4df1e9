//! Login marker
//!
//! A client announces its display name by sending `{<name>}` as a chat payload.

const MARKER_OPEN: &str = "{<";
const MARKER_CLOSE: &str = ">}";

/// Extract the name from the first `{<name>}` marker in `text`
///
/// The match is non-greedy: the name ends at the first `>}` after the opening `{<`.
pub fn parse_login_marker(text: &str) -> Option<&str> {
    let start = text.find(MARKER_OPEN)? + MARKER_OPEN.len();
    let len = text[start..].find(MARKER_CLOSE)?;
    Some(&text[start..start + len])
}
