use std::time::{SystemTime, UNIX_EPOCH};

/// Truncate to at most `max_bytes` without splitting a character.
pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

/// Like `truncate_string`, with a trailing `...` when anything was cut.
pub fn preview(text: &str, max_bytes: usize) -> String {
    let truncated = truncate_string(text, max_bytes);
    if truncated.len() < text.len() {
        format!("{truncated}...")
    } else {
        truncated
    }
}

pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_string("héllo", 2), "h");
        assert_eq!(truncate_string("abc", 10), "abc");
    }

    #[test]
    fn preview_marks_cut_text() {
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("abc", 3), "abc");
    }
}
