//! System prompt sent ahead of every council review request.
//!
//! The per-seat request text comes from `governed_core::generate_council_tasks`;
//! this module only frames it for a chat-completion provider.

use crate::providers::ChatMessage;

/// Shared system prompt for reviewers.
///
/// Kept identical across seats so provider-side prompt caching can reuse it.
pub const REVIEWER_SYSTEM_PROMPT: &str = r#"You are one member of a review council judging an AI agent's output.

You see the task objective, its acceptance criteria and the output.
You do not see the other reviewers or their votes.

## Rules
1. Judge the output only against the stated objective and criteria
2. Reject when a criterion is unmet or a claim is unsupported
3. List concrete weaknesses and missing items, not general advice
4. Answer with a single JSON object and nothing else
"#;

/// Messages for one reviewer call.
pub fn reviewer_messages(prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(REVIEWER_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}
