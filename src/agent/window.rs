//! Sliding-window conversation trimming.
//!
//! Only the most recent messages are sent to the model. The window never
//! starts on a tool result whose originating assistant call fell outside it,
//! since providers reject orphaned `tool` messages.

use crate::llm::{Message, MessageRole};

/// Tool results longer than this are cut when truncation is enabled.
pub const TOOL_RESULT_LIMIT: usize = 4_000;

/// Appended to a truncated tool result.
pub const TRUNCATION_MARKER: &str = "\n... [tool result truncated]";

/// Sliding-window trimmer.
#[derive(Debug, Clone, Copy)]
pub struct SlidingWindow {
    window_size: usize,
    truncate_results: bool,
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new(20, true)
    }
}

impl SlidingWindow {
    /// Window keeping at most `window_size` messages (minimum 1).
    #[must_use]
    pub fn new(window_size: usize, truncate_results: bool) -> Self {
        Self {
            window_size: window_size.max(1),
            truncate_results,
        }
    }

    /// Maximum number of kept messages.
    #[must_use]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Trim `messages` to the window.
    #[must_use]
    pub fn apply(&self, mut messages: Vec<Message>) -> Vec<Message> {
        if messages.len() > self.window_size {
            let mut start = messages.len() - self.window_size;
            while start < messages.len() && messages[start].role == MessageRole::Tool {
                start += 1;
            }
            messages.drain(..start);
        }

        if self.truncate_results {
            for message in messages.iter_mut().filter(|m| m.role == MessageRole::Tool) {
                if let Some(content) = message.content.as_mut() {
                    truncate_in_place(content);
                }
            }
        }

        messages
    }
}

fn truncate_in_place(content: &mut String) {
    if content.chars().count() <= TOOL_RESULT_LIMIT {
        return;
    }
    let cut = content
        .char_indices()
        .nth(TOOL_RESULT_LIMIT)
        .map_or(content.len(), |(idx, _)| idx);
    content.truncate(cut);
    content.push_str(TRUNCATION_MARKER);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;

    fn users(n: usize) -> Vec<Message> {
        (0..n).map(|i| Message::user(format!("msg-{i}"))).collect()
    }

    #[test]
    fn test_short_history_untouched() {
        let window = SlidingWindow::new(20, true);
        assert_eq!(window.apply(users(5)).len(), 5);
    }

    #[test]
    fn test_keeps_most_recent() {
        let window = SlidingWindow::new(10, false);
        let kept = window.apply(users(25));
        assert_eq!(kept.len(), 10);
        assert_eq!(kept[0], Message::user("msg-15"));
        assert_eq!(kept[9], Message::user("msg-24"));
    }

    #[test]
    fn test_skips_orphaned_tool_results() {
        let mut messages = users(3);
        messages.push(Message::assistant(
            None,
            vec![
                ToolCall::function("a", "http_request", "{}"),
                ToolCall::function("b", "http_request", "{}"),
            ],
        ));
        messages.push(Message::tool("a", "one"));
        messages.push(Message::tool("b", "two"));
        messages.push(Message::assistant(Some("done".into()), vec![]));

        // Window of 2 would start on tool result "b"
        let kept = SlidingWindow::new(2, false).apply(messages);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content.as_deref(), Some("done"));
    }

    #[test]
    fn test_truncates_long_tool_results() {
        let long = "é".repeat(TOOL_RESULT_LIMIT + 10);
        let messages = vec![Message::user("q"), Message::tool("a", long.clone())];

        let kept = SlidingWindow::new(20, true).apply(messages.clone());
        let content = kept[1].content.as_deref().unwrap();
        assert!(content.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            content.trim_end_matches(TRUNCATION_MARKER).chars().count(),
            TOOL_RESULT_LIMIT
        );

        let untouched = SlidingWindow::new(20, false).apply(messages);
        assert_eq!(untouched[1].content.as_deref(), Some(long.as_str()));
    }

    #[test]
    fn test_zero_window_is_clamped() {
        assert_eq!(SlidingWindow::new(0, true).window_size(), 1);
    }
}
