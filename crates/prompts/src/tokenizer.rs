//! Reference tokenizers.
//!
//! [`EstimateTokenizer`] uses a byte-length heuristic: ~4 bytes per token.
//! This approximation is accurate within ~10% for BPE tokenizers on English
//! text and keeps test budgets predictable. With the `tiktoken` feature,
//! [`Cl100kTokenizer`] counts with the real `cl100k_base` vocabulary.

use promptloom_core::{Tokenizer, TokenizerError};

/// Default per-message framing cost (role name, delimiters).
pub const DEFAULT_MESSAGE_OVERHEAD: usize = 4;

/// Heuristic tokenizer: 1 token ≈ 4 bytes, rounded up.
///
/// Encoding packs each 4-byte chunk into one `u32`, so decode is exact
/// except that trailing NUL bytes are dropped.
#[derive(Debug, Clone)]
pub struct EstimateTokenizer {
    message_overhead: usize,
}

impl EstimateTokenizer {
    pub fn new() -> Self {
        Self {
            message_overhead: DEFAULT_MESSAGE_OVERHEAD,
        }
    }

    pub fn with_message_overhead(mut self, overhead: usize) -> Self {
        self.message_overhead = overhead;
        self
    }
}

impl Default for EstimateTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for EstimateTokenizer {
    fn name(&self) -> &str {
        "estimate"
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        text.as_bytes()
            .chunks(4)
            .map(|chunk| {
                let mut buf = [0u8; 4];
                buf[..chunk.len()].copy_from_slice(chunk);
                u32::from_le_bytes(buf)
            })
            .collect()
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        let mut bytes: Vec<u8> = tokens.iter().flat_map(|t| t.to_le_bytes()).collect();
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        String::from_utf8(bytes).map_err(|e| TokenizerError::DecodeFailed(e.to_string()))
    }

    fn count(&self, text: &str) -> usize {
        text.len().div_ceil(4)
    }

    fn message_overhead(&self) -> usize {
        self.message_overhead
    }
}

/// `cl100k_base` BPE tokenizer (GPT-3.5 / GPT-4 family).
#[cfg(feature = "tiktoken")]
pub struct Cl100kTokenizer {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl Cl100kTokenizer {
    pub fn new() -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| TokenizerError::VocabularyUnavailable(format!("cl100k_base: {e}")))?;
        Ok(Self { bpe })
    }
}

#[cfg(feature = "tiktoken")]
impl std::fmt::Debug for Cl100kTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cl100kTokenizer").finish_non_exhaustive()
    }
}

#[cfg(feature = "tiktoken")]
impl Tokenizer for Cl100kTokenizer {
    fn name(&self) -> &str {
        "cl100k_base"
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|t| t as u32)
            .collect()
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        self.bpe
            .decode(tokens.iter().map(|&t| t as _).collect())
            .map_err(|e| TokenizerError::DecodeFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloom_core::Message;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(EstimateTokenizer::new().count(""), 0);
    }

    #[test]
    fn four_bytes_is_one_token() {
        assert_eq!(EstimateTokenizer::new().count("test"), 1);
    }

    #[test]
    fn five_bytes_rounds_up() {
        assert_eq!(EstimateTokenizer::new().count("hello"), 2);
    }

    #[test]
    fn count_matches_encode() {
        let tokenizer = EstimateTokenizer::new();
        for text in ["", "a", "Hello World", "assistant: Hello World", "héllo wörld"] {
            assert_eq!(tokenizer.count(text), tokenizer.encode(text).len(), "{text}");
        }
    }

    #[test]
    fn decode_reverses_encode() {
        let tokenizer = EstimateTokenizer::new();
        let text = "Budgets are shared — résumé";
        let tokens = tokenizer.encode(text);
        assert_eq!(tokenizer.decode(&tokens).unwrap(), text);
    }

    #[test]
    fn message_includes_overhead() {
        let tokenizer = EstimateTokenizer::new();
        // 4 bytes → 1 token + 4 overhead
        assert_eq!(tokenizer.count_message(&Message::user("test")), 5);

        let bare = EstimateTokenizer::new().with_message_overhead(0);
        assert_eq!(bare.count_message(&Message::user("test")), 1);
    }

    #[test]
    fn multiple_messages() {
        let msgs = vec![
            Message::user("hello"),      // 5 bytes → 2 tokens + 4 overhead = 6
            Message::assistant("world"), // 5 bytes → 2 tokens + 4 overhead = 6
        ];
        assert_eq!(EstimateTokenizer::new().count_messages(&msgs), 12);
    }

    #[cfg(feature = "tiktoken")]
    #[test]
    fn cl100k_round_trips_and_counts() {
        let tokenizer = Cl100kTokenizer::new().unwrap();
        let text = "Hello World";
        let tokens = tokenizer.encode(text);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokenizer.count(text), tokens.len());
        assert_eq!(tokenizer.decode(&tokens).unwrap(), text);

        let long = "Budgets are shared across every section of the prompt.";
        assert_eq!(tokenizer.count(long), tokenizer.encode(long).len());
        assert_eq!(tokenizer.decode(&tokenizer.encode(long)).unwrap(), long);
        assert_eq!(tokenizer.count_message(&Message::user(text)), 2);
    }
}
