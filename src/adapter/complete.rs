//! Non-streaming rendering of a finished run.

use crate::agent::AgentResult;

/// Body text for a completed run.
///
/// Concatenates the text of every text-bearing block of the final message,
/// in order. When no block carries text the whole result is rendered instead.
#[must_use]
pub fn render_result(result: &AgentResult) -> String {
    let texts: Vec<&str> = result
        .message
        .content
        .iter()
        .filter_map(|block| block.text())
        .collect();

    if texts.is_empty() {
        result.to_string()
    } else {
        texts.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ContentBlock;

    #[test]
    fn test_concatenates_text_blocks_in_order() {
        let result = AgentResult::from_blocks(vec![
            ContentBlock::Text { text: "Embodied: ".into() },
            ContentBlock::ToolUse {
                id: "c1".into(),
                name: "http_request".into(),
                input: serde_json::json!({}),
            },
            ContentBlock::Text { text: "120 tCO2e".into() },
        ]);
        assert_eq!(render_result(&result), "Embodied: 120 tCO2e");
    }

    #[test]
    fn test_falls_back_to_full_rendering() {
        let result = AgentResult::from_blocks(vec![ContentBlock::ToolResult {
            tool_use_id: "c1".into(),
            content: "200".into(),
        }]);
        let body = render_result(&result);
        assert_eq!(body, result.to_string());
        assert!(body.contains("tool_result"));
    }

    #[test]
    fn test_empty_text_block_still_counts() {
        let result = AgentResult::from_blocks(vec![ContentBlock::Text { text: String::new() }]);
        assert_eq!(render_result(&result), "");
    }
}
