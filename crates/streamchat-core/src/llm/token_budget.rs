//! Token budget management for LLM context windows.
//!
//! Keeps a request inside the model's context window by dropping the oldest
//! messages. Token counts are estimated, not measured: exact counting would
//! need a tokenizer per provider.

use streamchat_types::chat::Role;
use streamchat_types::llm::{Message, ProviderCapabilities};

/// Characters added to every message for role markers and framing.
const MESSAGE_OVERHEAD_CHARS: usize = 10;

/// Roughly how many characters make up one token.
const CHARS_PER_TOKEN: usize = 4;

/// Context window size and the share of it reserved for the reply.
#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    pub max_context_tokens: u32,
    pub max_output_tokens: u32,
}

impl TokenBudget {
    pub fn new(max_context_tokens: u32, max_output_tokens: u32) -> Self {
        Self {
            max_context_tokens,
            max_output_tokens,
        }
    }

    /// Derive a token budget from provider capabilities.
    pub fn from_capabilities(caps: &ProviderCapabilities) -> Self {
        Self::new(caps.max_context_tokens, caps.max_output_tokens)
    }

    /// Tokens left for the prompt once the reply is reserved.
    pub fn input_budget(&self) -> u32 {
        self.max_context_tokens.saturating_sub(self.max_output_tokens)
    }

    /// Estimated tokens for the system prompt plus `messages`.
    pub fn estimate(system: Option<&str>, messages: &[Message]) -> u32 {
        let system_chars = system.map(|s| s.len() + MESSAGE_OVERHEAD_CHARS).unwrap_or(0);
        let message_chars: usize = messages
            .iter()
            .map(|m| m.content.len() + MESSAGE_OVERHEAD_CHARS)
            .sum();
        ((system_chars + message_chars) / CHARS_PER_TOKEN) as u32
    }

    /// Drop the oldest messages until the estimate fits [`input_budget`].
    ///
    /// The newest message is always kept, even when it alone overflows the
    /// budget. The result never starts with an assistant message.
    ///
    /// [`input_budget`]: TokenBudget::input_budget
    pub fn trim(&self, system: Option<&str>, mut messages: Vec<Message>) -> Vec<Message> {
        let budget = self.input_budget();
        let mut dropped = 0usize;
        while messages.len() > 1 && Self::estimate(system, &messages) > budget {
            messages.remove(0);
            dropped += 1;
        }
        while messages.len() > 1
            && messages
                .first()
                .is_some_and(|m| m.role == Role::Assistant)
        {
            messages.remove(0);
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(
                dropped,
                kept = messages.len(),
                budget,
                "Trimmed conversation to fit the context window"
            );
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(n: usize, chars: usize) -> Vec<Message> {
        let mut out = Vec::new();
        for i in 0..n {
            out.push(Message::user(format!("{i}{}", "u".repeat(chars))));
            out.push(Message::assistant("a".repeat(chars)));
        }
        out.push(Message::user("latest"));
        out
    }

    #[test]
    fn test_estimate() {
        // (5 + 10) + (3 + 10) = 28 chars -> 7 tokens
        let messages = vec![Message::user("hello"), Message::assistant("hey")];
        assert_eq!(TokenBudget::estimate(None, &messages), 7);
        // system adds (2 + 10) = 12 chars -> 40 / 4 = 10
        assert_eq!(TokenBudget::estimate(Some("hi"), &messages), 10);
    }

    #[test]
    fn test_input_budget_saturates() {
        assert_eq!(TokenBudget::new(1000, 200).input_budget(), 800);
        assert_eq!(TokenBudget::new(100, 200).input_budget(), 0);
    }

    #[test]
    fn test_trim_keeps_everything_when_it_fits() {
        let budget = TokenBudget::new(1_000_000, 8192);
        let messages = exchange(3, 100);
        let trimmed = budget.trim(None, messages.clone());
        assert_eq!(trimmed, messages);
    }

    #[test]
    fn test_trim_drops_oldest_first() {
        // Each exchange is ~ (401 + 10 + 400 + 10) / 4 = 205 tokens.
        let budget = TokenBudget::new(600, 100);
        let trimmed = budget.trim(None, exchange(5, 400));
        assert!(TokenBudget::estimate(None, &trimmed) <= 500);
        assert_eq!(trimmed.last().unwrap().content, "latest");
        assert_eq!(trimmed.first().unwrap().role, Role::User);
        // Exchanges 3 and 4 survive along with the latest message.
        assert_eq!(trimmed.len(), 5);
        assert!(trimmed[0].content.starts_with('3'));
    }

    #[test]
    fn test_trim_never_drops_newest_user_message() {
        let budget = TokenBudget::new(10, 5);
        let mut messages = exchange(2, 50);
        messages.pop();
        messages.push(Message::user("x".repeat(1000)));
        let trimmed = budget.trim(None, messages);
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed[0].content.len(), 1000);
    }

    #[test]
    fn test_from_capabilities() {
        let caps = ProviderCapabilities {
            streaming: true,
            thinking_budget: true,
            max_context_tokens: 200_000,
            max_output_tokens: 8_192,
        };
        let budget = TokenBudget::from_capabilities(&caps);
        assert_eq!(budget.input_budget(), 191_808);
    }
}
