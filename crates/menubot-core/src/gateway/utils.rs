//! Shared gateway utilities.

/// Split a message into chunks of at most `max_len` characters,
/// preferring to break at newlines when possible.
///
/// Lengths are counted in `char`s and cuts always fall on char boundaries,
/// so accented menu text never panics or gets mangled.
pub fn chunk_message(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 || text.chars().count() <= max_len {
        return vec![text.to_owned()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        // Byte offset just past the `max_len`-th char, if the rest is longer.
        let limit = match remaining.char_indices().nth(max_len) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(remaining.to_owned());
                break;
            }
        };

        let slice = &remaining[..limit];
        let break_at = match slice.rfind('\n') {
            Some(0) | None => limit,
            Some(idx) => idx,
        };

        chunks.push(remaining[..break_at].to_owned());
        remaining = remaining[break_at..].trim_start_matches('\n');
    }

    chunks
}
