use anyhow::Context;
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::data::encoder::SequenceEncoder;
use crate::domain::example::SummaryExample;

/// One example after encoding. Sequences are already padded to their maxima.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedExample {
    pub text:                  String,
    pub summary:               String,
    pub text_input_ids:        Vec<u32>,
    pub text_attention_mask:   Vec<u32>,
    /// Summary ids with padding replaced by IGNORE_INDEX
    pub labels:                Vec<i64>,
    pub labels_attention_mask: Vec<u32>,
}

/// Article/summary pairs, encoded once when the dataset is built.
///
/// Encoding up front means a row the tokenizer rejects fails `setup()`
/// instead of surfacing as `None` from `get`, which the data loader
/// would read as the end of the epoch.
pub struct NewsSummaryDataset {
    examples: Vec<SummaryExample>,
    encoded:  Vec<EncodedExample>,
}

impl NewsSummaryDataset {
    pub fn new(
        examples:              Vec<SummaryExample>,
        tokenizer:             Arc<Tokenizer>,
        text_max_token_len:    usize,
        summary_max_token_len: usize,
    ) -> anyhow::Result<Self> {
        let text_encoder    = SequenceEncoder::new(tokenizer.clone(), text_max_token_len)?;
        let summary_encoder = SequenceEncoder::new(tokenizer, summary_max_token_len)?;

        let encoded = examples
            .iter()
            .enumerate()
            .map(|(index, example)| {
                encode(&text_encoder, &summary_encoder, example)
                    .with_context(|| format!("Cannot encode example {}", index))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self { examples, encoded })
    }

    pub fn examples(&self) -> &[SummaryExample] {
        &self.examples
    }
}

fn encode(
    text_encoder:    &SequenceEncoder,
    summary_encoder: &SequenceEncoder,
    example:         &SummaryExample,
) -> anyhow::Result<EncodedExample> {
    let text    = text_encoder.encode(&example.text)?;
    let summary = summary_encoder.encode(&example.summary)?;

    Ok(EncodedExample {
        text:                  example.text.clone(),
        summary:               example.summary.clone(),
        labels:                summary.labels(),
        text_input_ids:        text.input_ids,
        text_attention_mask:   text.attention_mask,
        labels_attention_mask: summary.attention_mask,
    })
}

impl Dataset<EncodedExample> for NewsSummaryDataset {
    fn get(&self, index: usize) -> Option<EncodedExample> {
        self.encoded.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.encoded.len()
    }
}
