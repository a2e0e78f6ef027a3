//! Flattens speech segments into a plain-text script for the summarizer.

use crate::results::ConversationResult;
use regex::Regex;
use std::{collections::HashMap, sync::LazyLock};

/// Speaker name used when a segment's label has no display name.
pub const UNKNOWN_SPEAKER: &str = "Unknown";

/// Word runs, single newlines, and any other single character. The
/// information separators U+001C..U+001F count as whitespace, so they end a
/// word run. The `,` alternative is shadowed by the word run.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\s\x1c-\x1f]+|\n|.|,").expect("token pattern is valid")
});

/// Render every segment as a `"<speaker>: <text>\n"` line, in order.
pub fn render(result: &ConversationResult) -> String {
    let speakers: HashMap<&str, &str> = result
        .conversation_analytics
        .speaker_labels
        .iter()
        .map(|label| (label.speaker.as_str(), label.display_text.as_str()))
        .collect();

    result
        .speech_segments
        .iter()
        .map(|segment| {
            let speaker = speakers
                .get(segment.segment_speaker.as_str())
                .copied()
                .unwrap_or(UNKNOWN_SPEAKER);
            format!("{}: {}\n", speaker, segment.display_text)
        })
        .collect()
}

/// Split `text` into truncation tokens.
pub fn tokens(text: &str) -> impl Iterator<Item = &str> {
    TOKEN.find_iter(text).map(|m| m.as_str())
}

/// Keep the first `limit` tokens of `text`. A limit of zero or less
/// returns the text unchanged.
pub fn truncate(text: &str, limit: i64) -> String {
    let limit = match usize::try_from(limit) {
        Ok(limit) if limit > 0 => limit,
        _ => return text.to_string(),
    };

    let truncated: Vec<&str> = tokens(text).take(limit).collect();
    debug!("Token count: {}", truncated.len());
    truncated.concat()
}

/// Build the transcript handed to the summarization backend.
pub fn assemble(result: &ConversationResult, token_count: i64) -> String {
    let transcript = render(result);
    debug!("Transcript:\n{}", transcript);
    truncate(&transcript, token_count)
}
