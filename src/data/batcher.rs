// ============================================================
// Layer 4 — Summary Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<EncodedExample>
// into device tensors.
//
//   Input:  N EncodedExamples, text length S, summary length T
//   Output: SummaryBatch with tensors [N, S] and [N, T]
//
// Every sequence is pre-padded by the encoder, so batching is
// a flatten + reshape:
//   [e1_t1, ..., e1_tS, e2_t1, ..., eN_tS] → [N, S]

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::data::dataset::EncodedExample;

// ─── SummaryBatch ─────────────────────────────────────────────────────────────
/// A batch ready for the model forward pass.
/// All tensors have batch_size as their first dimension.
#[derive(Debug, Clone)]
pub struct SummaryBatch<B: Backend> {
    /// Article token ids, shape [batch_size, text_len]
    pub text_input_ids: Tensor<B, 2, Int>,

    /// 1 = real article token, 0 = padding, shape [batch_size, text_len]
    pub text_attention_mask: Tensor<B, 2, Int>,

    /// Summary ids with padding set to -100, shape [batch_size, summary_len]
    pub labels: Tensor<B, 2, Int>,

    /// 1 = real summary token, 0 = padding, shape [batch_size, summary_len]
    pub labels_attention_mask: Tensor<B, 2, Int>,
}

// ─── SummaryBatcher ───────────────────────────────────────────────────────────
/// Holds the target device so tensors are created on the right GPU/CPU.
#[derive(Clone, Debug)]
pub struct SummaryBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SummaryBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn stack<T: Copy>(
        &self,
        rows:  impl Iterator<Item = Vec<T>>,
        width: usize,
        count: usize,
    ) -> Tensor<B, 2, Int>
    where
        i64: From<T>,
    {
        let flat: Vec<i64> = rows.flat_map(|row| row.into_iter().map(i64::from)).collect();
        Tensor::<B, 1, Int>::from_data(TensorData::new(flat, [count * width]), &self.device)
            .reshape([count, width])
    }
}

impl<B: Backend> Batcher<EncodedExample, SummaryBatch<B>> for SummaryBatcher<B> {
    fn batch(&self, items: Vec<EncodedExample>) -> SummaryBatch<B> {
        let batch_size  = items.len();
        let text_len    = items.first().map_or(0, |e| e.text_input_ids.len());
        let summary_len = items.first().map_or(0, |e| e.labels.len());

        let text_input_ids = self.stack(
            items.iter().map(|e| e.text_input_ids.clone()), text_len, batch_size,
        );
        let text_attention_mask = self.stack(
            items.iter().map(|e| e.text_attention_mask.clone()), text_len, batch_size,
        );
        let labels = self.stack(
            items.iter().map(|e| e.labels.clone()), summary_len, batch_size,
        );
        let labels_attention_mask = self.stack(
            items.iter().map(|e| e.labels_attention_mask.clone()), summary_len, batch_size,
        );

        SummaryBatch {
            text_input_ids,
            text_attention_mask,
            labels,
            labels_attention_mask,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::NewsSummaryDataset;
    use crate::test_support::{sample_examples, tiny_tokenizer, TestBackend};
    use burn::data::dataset::Dataset;

    #[test]
    fn test_batch_shapes() {
        let ds    = NewsSummaryDataset::new(sample_examples(), tiny_tokenizer(), 12, 5).unwrap();
        let items = vec![ds.get(0).unwrap(), ds.get(1).unwrap(), ds.get(2).unwrap()];

        let batch = SummaryBatcher::<TestBackend>::new(Default::default()).batch(items);
        assert_eq!(batch.text_input_ids.dims(), [3, 12]);
        assert_eq!(batch.text_attention_mask.dims(), [3, 12]);
        assert_eq!(batch.labels.dims(), [3, 5]);
        assert_eq!(batch.labels_attention_mask.dims(), [3, 5]);
    }

    #[test]
    fn test_rows_keep_sample_order() {
        let ds    = NewsSummaryDataset::new(sample_examples(), tiny_tokenizer(), 8, 4).unwrap();
        let first = ds.get(0).unwrap();
        let items = vec![first.clone(), ds.get(1).unwrap()];

        let batch = SummaryBatcher::<TestBackend>::new(Default::default()).batch(items);
        let row0: Vec<i64> = batch
            .labels
            .slice([0..1, 0..4])
            .into_data()
            .convert::<i64>()
            .to_vec()
            .unwrap();
        assert_eq!(row0, first.labels);
    }
}
