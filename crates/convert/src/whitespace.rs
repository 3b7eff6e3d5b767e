//! Whitespace crunching for character data.

/// Collapses whitespace runs in `chunk` to single spaces, treating the
/// tail of the already-buffered text as part of the run so that no double
/// space ever crosses a chunk boundary.
pub fn crunch(chunk: &str, buffered: &str) -> String {
    let mut out = String::with_capacity(chunk.len());
    let mut last_was_space = buffered.ends_with(' ');
    for c in chunk.chars() {
        if matches!(c, ' ' | '\t' | '\r' | '\n' | '\u{a0}') {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}
