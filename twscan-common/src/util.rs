//! Utility functions.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Safe for multi-byte UTF-8 (CJK stock names) because it cuts on character
/// boundaries instead of byte indices.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Split a message into chunks of at most `max_chars` characters.
///
/// Splits on line boundaries where possible; a single line longer than the
/// limit is cut on character boundaries. Lengths are counted in characters,
/// not bytes, since chat APIs limit by characters.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    // A chunk may begin with a blank line, so emptiness cannot mark it open.
    let mut started = false;

    for line in text.lines() {
        let line_len = line.chars().count();
        let needed = if started { line_len + 1 } else { line_len };

        if current_len + needed <= max_chars {
            if started {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            started = true;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        current_len = 0;

        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            let mut pieces = chars.chunks(max_chars).peekable();
            while let Some(piece) = pieces.next() {
                let piece: String = piece.iter().collect();
                if pieces.peek().is_some() {
                    chunks.push(piece);
                } else {
                    current_len = piece.chars().count();
                    current = piece;
                }
            }
        } else {
            current.push_str(line);
            current_len = line_len;
        }
        started = true;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
