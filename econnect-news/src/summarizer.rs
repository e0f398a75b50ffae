//! Extractive summarizer
//!
//! Keeps whole sentences from the start of the text while they fit within
//! the length cap. Lengths are counted in characters.

use unicode_segmentation::UnicodeSegmentation;

/// Default summary cap, in characters
pub const DEFAULT_MAX_LENGTH: usize = 300;

/// Returned for empty input
pub const SUMMARY_PLACEHOLDER: &str = "summary unavailable";

const ELLIPSIS: &str = "...";

/// Summarize `text` to at most `max_length` characters
///
/// Sentences are appended, joined by single spaces, until the next one would
/// exceed the cap. If even the first sentence does not fit, the text is hard
/// truncated and suffixed with `...`.
pub fn summarize(text: &str, max_length: usize) -> String {
    if text.trim().is_empty() {
        return SUMMARY_PLACEHOLDER.to_string();
    }

    let mut summary = String::new();
    let mut summary_len = 0;

    for sentence in sentences(text) {
        let separator = usize::from(!summary.is_empty());
        let sentence_len = sentence.chars().count();
        if summary_len + separator + sentence_len > max_length {
            break;
        }
        if separator == 1 {
            summary.push(' ');
        }
        summary.push_str(sentence);
        summary_len += separator + sentence_len;
    }

    if summary.is_empty() {
        truncate_with_ellipsis(text, max_length)
    } else {
        summary
    }
}

/// Sentences of `text`, trimmed, empties skipped
pub fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split_sentence_bounds()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn truncate_with_ellipsis(text: &str, max_length: usize) -> String {
    if max_length < ELLIPSIS.len() {
        return ELLIPSIS[..max_length].to_string();
    }
    let kept: String = text.chars().take(max_length - ELLIPSIS.len()).collect();
    format!("{kept}{ELLIPSIS}")
}
