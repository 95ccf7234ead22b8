// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the raw CSV to tensor batches:
//
//   news_summary.csv
//       │
//       ▼
//   CsvLoader             → (text, summary) pairs, nulls dropped
//       │
//       ▼
//   split_train_test      → seeded 90/10 partition
//       │
//       ▼
//   NewsSummaryDataset    → encodes one example per `get`
//       │                   (SequenceEncoder: fixed length + masks)
//       ▼
//   SummaryBatcher        → stacks examples into [N, len] tensors
//       │
//       ▼
//   NewsSummaryDataModule → train / val / test DataLoaders

/// Reads (article, summary) columns from a CSV file
pub mod loader;

/// Seeded train/test partitioning
pub mod splitter;

/// Fixed-length token encoding with attention masks and labels
pub mod encoder;

/// Implements Burn's Dataset trait for encoded examples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Builds the train / validation / test data loaders
pub mod datamodule;
