//! Context budget for tool results
//!
//! Caps every tool-result message before it joins the conversation so a
//! long document cannot grow the prompt without bound.

use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct ContextBudget {
    /// Maximum characters kept from a single tool result
    pub max_tool_result_chars: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_tool_result_chars: 8_000,
        }
    }
}

impl ContextBudget {
    pub fn new(max_tool_result_chars: usize) -> Self {
        Self {
            max_tool_result_chars,
        }
    }

    /// Truncate on a char boundary, appending a marker with the dropped count
    pub fn fit(&self, content: String) -> String {
        let total = content.chars().count();
        if total <= self.max_tool_result_chars {
            return content;
        }

        let dropped = total - self.max_tool_result_chars;
        info!(
            total_chars = total,
            kept_chars = self.max_tool_result_chars,
            "Truncating tool result"
        );

        let mut kept: String = content.chars().take(self.max_tool_result_chars).collect();
        kept.push_str(&format!("…[truncated {} chars]", dropped));
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_content_untouched() {
        let budget = ContextBudget::new(10);
        assert_eq!(budget.fit("0123456789".to_string()), "0123456789");
    }

    #[test]
    fn test_long_content_truncated_with_marker() {
        let budget = ContextBudget::new(4);
        assert_eq!(budget.fit("zażółć gęślą".to_string()), "zażó…[truncated 8 chars]");
    }
}
