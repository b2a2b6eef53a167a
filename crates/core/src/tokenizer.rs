//! Tokenizer trait: the abstraction over token vocabularies.
//!
//! Budgets are compared across sections, so one render call must use a
//! single tokenizer instance throughout. The tokenizer should be the same
//! one used to negotiate the eventual model call.

use crate::error::TokenizerError;
use crate::message::Message;

pub trait Tokenizer: Send + Sync {
    /// A short identifier for logs (e.g., "estimate", "cl100k_base").
    fn name(&self) -> &str;

    /// Encode text into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode token ids back into text.
    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError>;

    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    /// Framing cost of one message in the model's wire format
    /// (role name, delimiters). Zero unless the vocabulary says otherwise.
    fn message_overhead(&self) -> usize {
        0
    }

    /// Tokens for a single message including framing overhead.
    fn count_message(&self, message: &Message) -> usize {
        self.message_overhead() + self.count(&message.text())
    }

    /// Tokens for a slice of messages.
    fn count_messages(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.count_message(m)).sum()
    }
}
