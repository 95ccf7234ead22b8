// ============================================================
// Layer 5 — Summary Model
// ============================================================
// Wraps the T5 encoder-decoder with the loss and the three
// step functions the trainer drives:
//
//   training_step   → train_loss       (autodiff backend, dropout on)
//   validation_step → validation_loss  (inner backend, dropout off)
//   test_step       → test_loss        (inner backend, dropout off)
//
// Teacher forcing: the decoder sees the labels shifted one
// position right and predicts the labels themselves.

use burn::prelude::*;

use crate::data::batcher::SummaryBatch;
use crate::ml::{loss::masked_cross_entropy, t5::T5};

#[derive(Module, Debug)]
pub struct SummaryModel<B: Backend> {
    pub t5: T5<B>,
}

impl<B: Backend> SummaryModel<B> {
    pub fn new(t5: T5<B>) -> Self {
        Self { t5 }
    }

    /// Returns (loss [1], logits [B, T, V]).
    pub fn forward(
        &self,
        input_ids:              Tensor<B, 2, Int>,
        attention_mask:         Tensor<B, 2, Int>,
        decoder_attention_mask: Tensor<B, 2, Int>,
        labels:                 Tensor<B, 2, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 3>) {
        let decoder_input_ids = self.t5.shift_right(labels.clone());
        let logits = self.t5.forward(
            input_ids,
            attention_mask,
            decoder_input_ids,
            Some(decoder_attention_mask),
        );
        let loss = masked_cross_entropy(logits.clone(), labels);
        (loss, logits)
    }

    pub fn training_step(&self, batch: SummaryBatch<B>) -> Tensor<B, 1> {
        self.step(batch)
    }

    pub fn validation_step(&self, batch: SummaryBatch<B>) -> Tensor<B, 1> {
        self.step(batch)
    }

    pub fn test_step(&self, batch: SummaryBatch<B>) -> Tensor<B, 1> {
        self.step(batch)
    }

    fn step(&self, batch: SummaryBatch<B>) -> Tensor<B, 1> {
        let (loss, _) = self.forward(
            batch.text_input_ids,
            batch.text_attention_mask,
            batch.labels_attention_mask,
            batch.labels,
        );
        loss
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{batcher::SummaryBatcher, dataset::NewsSummaryDataset};
    use crate::test_support::{sample_examples, tiny_config, tiny_tokenizer, TestBackend};
    use burn::data::{dataloader::batcher::Batcher, dataset::Dataset};

    #[test]
    fn test_step_returns_finite_positive_loss() {
        let tokenizer = tiny_tokenizer();
        let vocab     = tokenizer.get_vocab_size(false);
        let ds        = NewsSummaryDataset::new(sample_examples(), tokenizer, 16, 8).unwrap();
        let batch     = SummaryBatcher::<TestBackend>::new(Default::default())
            .batch(vec![ds.get(0).unwrap(), ds.get(1).unwrap()]);

        let model = SummaryModel::new(tiny_config(vocab).init::<TestBackend>(&Default::default()).unwrap());
        let (loss, logits) = model.forward(
            batch.text_input_ids.clone(),
            batch.text_attention_mask.clone(),
            batch.labels_attention_mask.clone(),
            batch.labels.clone(),
        );
        assert_eq!(logits.dims(), [2, 8, vocab]);

        let value = loss.into_data().to_vec::<f32>().unwrap()[0];
        assert!(value.is_finite() && value > 0.0);

        let step = model.validation_step(batch).into_data().to_vec::<f32>().unwrap()[0];
        assert!((step - value).abs() < 1e-5);
    }
}
