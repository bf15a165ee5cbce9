//! Size estimation.
//!
//! Cost is a linear combination of word count and character count. The
//! weights are tuning parameters; the defaults land close to BPE token
//! counts for English prose.

use helix_core::message::Message;

/// Per-message overhead for role name and delimiters in the wire format.
pub const MESSAGE_OVERHEAD: u64 = 4;

/// Estimates the size cost of text sent to or received from a backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeEstimator {
    word_weight: f64,
    char_weight: f64,
}

impl SizeEstimator {
    pub fn new(word_weight: f64, char_weight: f64) -> Self {
        Self {
            word_weight: word_weight.max(0.0),
            char_weight: char_weight.max(0.0),
        }
    }

    /// Estimate the size of a string. Blank text costs nothing; anything
    /// else costs at least one unit.
    pub fn estimate(&self, text: &str) -> u64 {
        if text.trim().is_empty() {
            return 0;
        }
        let words = text.split_whitespace().count() as f64;
        let chars = text.chars().count() as f64;
        ((words * self.word_weight + chars * self.char_weight).ceil() as u64).max(1)
    }

    /// Estimate a single message including per-message overhead.
    pub fn estimate_message(&self, message: &Message) -> u64 {
        MESSAGE_OVERHEAD + self.estimate(&message.content)
    }

    /// Estimate a slice of messages.
    pub fn estimate_messages(&self, messages: &[Message]) -> u64 {
        messages.iter().map(|m| self.estimate_message(m)).sum()
    }
}

impl Default for SizeEstimator {
    fn default() -> Self {
        Self::new(1.3, 0.1)
    }
}
