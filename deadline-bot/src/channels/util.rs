//! Shared utilities for channel implementations.

/// Discord's per-message character limit
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Split a message into chunks of at most `max_len` characters.
/// Splits on line boundaries; lines longer than `max_len` are hard-split.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();

        if current_len + line_len + 1 > max_len {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if line_len > max_len {
                let chars: Vec<char> = line.chars().collect();
                let mut pieces = chars.chunks(max_len).peekable();
                while let Some(piece) = pieces.next() {
                    if pieces.peek().is_some() {
                        chunks.push(piece.iter().collect());
                    } else {
                        current = piece.iter().collect();
                        current_len = piece.len();
                    }
                }
            } else {
                current = line.to_string();
                current_len = line_len;
            }
        } else {
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(line);
            current_len += line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
