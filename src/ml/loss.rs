use burn::{prelude::*, tensor::activation};

use crate::data::encoder::IGNORE_INDEX;

/// Mean token cross-entropy over positions whose label is not IGNORE_INDEX.
///
/// logits: [B, T, V], labels: [B, T] → scalar [1]
///
/// A batch where every label is ignored yields 0 instead of NaN.
pub fn masked_cross_entropy<B: Backend>(logits: Tensor<B, 3>, labels: Tensor<B, 2, Int>) -> Tensor<B, 1> {
    let [batch, len, vocab] = logits.dims();
    let n = batch * len;

    let log_probs = activation::log_softmax(logits.reshape([n, vocab]), 1);
    let labels    = labels.reshape([n]);
    let ignored   = labels.clone().equal_elem(IGNORE_INDEX);

    // gather needs a valid index even where the label is ignored
    let targets = labels.mask_fill(ignored.clone(), 0).unsqueeze_dim::<2>(1);
    let picked  = log_probs.gather(1, targets).reshape([n]);
    let keep    = ignored.bool_not().float();

    let total = (picked * keep.clone()).sum().neg();
    let count = keep.sum().clamp_min(1.0);
    total / count
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestBackend;
    use burn::tensor::TensorData;

    fn logits(values: Vec<f32>, shape: [usize; 3]) -> Tensor<TestBackend, 3> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    fn labels(values: Vec<i64>, shape: [usize; 2]) -> Tensor<TestBackend, 2, Int> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_data().to_vec::<f32>().unwrap()[0]
    }

    #[test]
    fn test_uniform_logits_give_log_vocab() {
        let loss = masked_cross_entropy(logits(vec![0.0; 8], [1, 2, 4]), labels(vec![1, 3], [1, 2]));
        assert!((scalar(loss) - 4f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_ignored_positions_do_not_count() {
        // position 0 is confident and right, position 1 is ignored garbage
        let values = vec![10.0, 0.0, 0.0, /* */ 0.0, 0.0, 50.0];
        let with_ignore = masked_cross_entropy(
            logits(values.clone(), [1, 2, 3]),
            labels(vec![0, IGNORE_INDEX], [1, 2]),
        );
        let only_first = masked_cross_entropy(
            logits(values[..3].to_vec(), [1, 1, 3]),
            labels(vec![0], [1, 1]),
        );
        assert!((scalar(with_ignore) - scalar(only_first)).abs() < 1e-6);
    }

    #[test]
    fn test_all_ignored_is_zero() {
        let loss = masked_cross_entropy(
            logits(vec![1.0, 2.0, 3.0, 4.0], [1, 2, 2]),
            labels(vec![IGNORE_INDEX, IGNORE_INDEX], [1, 2]),
        );
        assert_eq!(scalar(loss), 0.0);
    }
}
