// ============================================================
// Layer 4 — Train/Test Splitter
// ============================================================
// Randomly shuffles examples and splits them into two sets:
//   - Training set: used to update model weights
//   - Test set:     used for validation loss, checkpoint
//                   selection and the final test loss
//
// The test partition gets ceil(n * test_fraction) examples,
// the training partition gets the rest. With the default
// fraction of 0.1 that is a 90/10 split.
//
// The shuffle is seeded so `evaluate` can rebuild exactly the
// partition that `train` held out.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `examples` with `seed` and split into (train, test).
///
/// # Example
/// ```ignore
/// let (train, test) = split_train_test(all_examples, 0.1, 42);
/// // test has ceil(10%) of the examples, train the remainder
/// ```
pub fn split_train_test<T>(mut examples: Vec<T>, test_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    examples.shuffle(&mut rng);

    let total     = examples.len();
    let fraction  = if test_fraction.is_nan() { 0.0 } else { test_fraction.clamp(0.0, 1.0) };
    let test_size = ((total as f64) * fraction).ceil() as usize;
    let split_at  = total - test_size.min(total);

    // split_off(n) leaves [0..n) in `examples` and returns [n..total)
    let test = examples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} train, {} test (seed {})",
        examples.len(),
        test.len(),
        seed,
    );

    (examples, test)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_partition_rounds_up() {
        let items: Vec<usize> = (0..95).collect();
        let (train, test)     = split_train_test(items, 0.1, 7);
        // ceil(9.5) = 10
        assert_eq!(test.len(), 10);
        assert_eq!(train.len(), 85);
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let items: Vec<usize> = (0..50).collect();
        let (train, test)     = split_train_test(items, 0.3, 1);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let (_, a) = split_train_test((0..40).collect::<Vec<usize>>(), 0.25, 99);
        let (_, b) = split_train_test((0..40).collect::<Vec<usize>>(), 0.25, 99);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let (train, test) = split_train_test(Vec::<usize>::new(), 0.1, 0);
        assert!(train.is_empty());
        assert!(test.is_empty());
    }

    #[test]
    fn test_fraction_is_clamped() {
        let (train, test) = split_train_test((0..10).collect::<Vec<usize>>(), 1.5, 0);
        assert!(train.is_empty());
        assert_eq!(test.len(), 10);

        let (train, test) = split_train_test((0..10).collect::<Vec<usize>>(), 0.0, 0);
        assert_eq!(train.len(), 10);
        assert!(test.is_empty());
    }
}
