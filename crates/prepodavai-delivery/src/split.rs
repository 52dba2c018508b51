// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splitting long text into channel-sized messages.

/// Split `text` into chunks of at most `limit` characters.
///
/// Cuts at the last newline in the window when it falls in the second half
/// of the window, otherwise at the limit. Always returns at least one chunk.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while chars.len() - start > limit {
        let window = &chars[start..start + limit];
        let cut = window
            .iter()
            .rposition(|c| *c == '\n')
            .filter(|pos| *pos >= limit / 2);
        match cut {
            Some(pos) => {
                chunks.push(window[..pos].iter().collect());
                start += pos + 1;
            }
            None => {
                chunks.push(window.iter().collect());
                start += limit;
            }
        }
    }
    if start < chars.len() {
        chunks.push(chars[start..].iter().collect());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 4096), vec!["hello"]);
        assert_eq!(split_message("", 4096), vec![""]);
    }

    #[test]
    fn hard_split_at_limit() {
        let text = "a".repeat(10_000);
        let chunks = split_message(&text, 4096);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4096));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn prefers_newline_boundaries() {
        let text = format!("{}\n{}", "x".repeat(7), "y".repeat(5));
        assert_eq!(split_message(&text, 10), vec!["x".repeat(7), "y".repeat(5)]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "ж".repeat(4096);
        assert_eq!(split_message(&text, 4096).len(), 1);
    }
}
