//! Text normalization applied before vectorization.
//!
//! The fitted vectorizer was trained on text cleaned exactly this way, so the
//! serving path must reproduce it character for character: lowercase, keep
//! only `[a-z0-9]` and whitespace, collapse whitespace runs, trim.

/// Normalize raw query text into the alphabet the vectorizer was fitted on.
///
/// Pure and total: any input (including empty) returns a valid, possibly
/// empty, string containing only `[a-z0-9 ]` with single spaces and no
/// leading or trailing space. Idempotent.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
        // Everything else (punctuation, symbols, non-ASCII) is stripped and
        // does not introduce a word boundary, matching the fitted cleaner.
    }

    out
}
