// ============================================================
// Layer 4 — Fixed-Length Sequence Encoder
// ============================================================
// Turns raw text into exactly `max_len` token ids plus an
// attention mask:
//
//   "Markets rallied today"   max_len = 8
//     ids:  [412, 9810, 469, 1, 0, 0, 0, 0]
//     mask: [  1,    1,   1, 1, 0, 0, 0, 0]
//                           ^ </s>
//
//   - text is tokenised without special tokens
//   - overlong input is cut to max_len - 1 tokens
//   - the end-of-sequence token is appended
//   - the rest is filled with the pad token
//
// For summaries the ids double as training labels, except that
// padding positions become -100 so the loss skips them.

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use tokenizers::Tokenizer;

/// Label value ignored by the loss function.
pub const IGNORE_INDEX: i64 = -100;

pub const PAD_TOKEN: &str = "<pad>";
pub const EOS_TOKEN: &str = "</s>";
pub const UNK_TOKEN: &str = "<unk>";

/// Ids of the tokens the encoder inserts itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub pad_id: u32,
    pub eos_id: u32,
}

impl SpecialTokens {
    /// Look up `<pad>` and `</s>` in the tokenizer vocabulary.
    pub fn from_tokenizer(tokenizer: &Tokenizer) -> Result<Self> {
        let pad_id = tokenizer
            .token_to_id(PAD_TOKEN)
            .ok_or_else(|| anyhow!("Tokenizer has no '{PAD_TOKEN}' token"))?;
        let eos_id = tokenizer
            .token_to_id(EOS_TOKEN)
            .ok_or_else(|| anyhow!("Tokenizer has no '{EOS_TOKEN}' token"))?;
        Ok(Self { pad_id, eos_id })
    }
}

/// One encoded, fixed-length sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSequence {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl EncodedSequence {
    /// Number of real (non-padding) tokens
    pub fn real_len(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }

    /// Training labels: ids on real tokens, IGNORE_INDEX on padding.
    pub fn labels(&self) -> Vec<i64> {
        self.input_ids
            .iter()
            .zip(&self.attention_mask)
            .map(|(&id, &mask)| if mask == 1 { id as i64 } else { IGNORE_INDEX })
            .collect()
    }
}

/// Encodes text into sequences of exactly `max_len` tokens.
#[derive(Clone)]
pub struct SequenceEncoder {
    tokenizer: Arc<Tokenizer>,
    special:   SpecialTokens,
    max_len:   usize,
}

impl SequenceEncoder {
    pub fn new(tokenizer: Arc<Tokenizer>, max_len: usize) -> Result<Self> {
        if max_len == 0 {
            bail!("max_len must be at least 1");
        }
        let special = SpecialTokens::from_tokenizer(&tokenizer)?;
        Ok(Self { tokenizer, special, max_len })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn encode(&self, text: &str) -> Result<EncodedSequence> {
        let mut input_ids = self.tokenize(text)?;
        input_ids.truncate(self.max_len - 1);
        input_ids.push(self.special.eos_id);

        let real_len           = input_ids.len();
        let mut attention_mask = vec![1u32; real_len];

        input_ids.resize(self.max_len, self.special.pad_id);
        attention_mask.resize(self.max_len, 0);

        Ok(EncodedSequence { input_ids, attention_mask })
    }

    /// Untruncated token count including the end-of-sequence token.
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.tokenize(text)?.len() + 1)
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tiny_tokenizer;

    #[test]
    fn test_short_text_is_padded_to_max_len() {
        let enc = SequenceEncoder::new(tiny_tokenizer(), 10).unwrap();
        let seq = enc.encode("the market rose").unwrap();

        assert_eq!(seq.input_ids.len(), 10);
        assert_eq!(seq.attention_mask.len(), 10);
        // 3 words + </s>
        assert_eq!(seq.real_len(), 4);
        assert_eq!(seq.input_ids[3], enc.special_tokens().eos_id);
        assert!(seq.input_ids[4..].iter().all(|&id| id == enc.special_tokens().pad_id));
        assert_eq!(seq.attention_mask, vec![1, 1, 1, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_long_text_is_truncated_and_keeps_eos() {
        let enc  = SequenceEncoder::new(tiny_tokenizer(), 4).unwrap();
        let seq  = enc.encode("the market rose today as shares of the bank rallied").unwrap();

        assert_eq!(seq.input_ids.len(), 4);
        assert_eq!(seq.real_len(), 4);
        assert_eq!(*seq.input_ids.last().unwrap(), enc.special_tokens().eos_id);
    }

    #[test]
    fn test_labels_only_mask_padding() {
        let enc    = SequenceEncoder::new(tiny_tokenizer(), 8).unwrap();
        let seq    = enc.encode("shares rallied").unwrap();
        let labels = seq.labels();

        for (i, label) in labels.iter().enumerate() {
            if seq.attention_mask[i] == 1 {
                assert_eq!(*label, seq.input_ids[i] as i64);
            } else {
                assert_eq!(*label, IGNORE_INDEX);
            }
        }
        assert_eq!(labels.iter().filter(|&&l| l == IGNORE_INDEX).count(), 8 - 3);
    }

    #[test]
    fn test_empty_text_is_just_eos() {
        let enc = SequenceEncoder::new(tiny_tokenizer(), 5).unwrap();
        let seq = enc.encode("").unwrap();
        assert_eq!(seq.real_len(), 1);
        assert_eq!(seq.input_ids[0], enc.special_tokens().eos_id);
    }

    #[test]
    fn test_count_tokens_is_not_truncated() {
        let enc = SequenceEncoder::new(tiny_tokenizer(), 2).unwrap();
        assert_eq!(enc.count_tokens("the market rose today").unwrap(), 5);
    }

    #[test]
    fn test_zero_max_len_is_rejected() {
        assert!(SequenceEncoder::new(tiny_tokenizer(), 0).is_err());
    }
}
