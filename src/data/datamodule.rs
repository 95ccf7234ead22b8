// ============================================================
// Layer 4 — News Summary Data Module
// ============================================================
// Bundles everything the trainer needs to pull batches:
// the two partitions, the tokenizer, batch size, sequence
// maxima and worker count.
//
//   setup()            → builds the train and test datasets
//   train_dataloader() → shuffled batches of the train split
//   val_dataloader()   → ordered batches of the test split
//   test_dataloader()  → ordered batches of the test split
//
// Loaders are generic over the backend so the trainer can ask
// for autodiff batches (training) and plain batches
// (validation) from the same module.

use anyhow::{anyhow, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::data::{
    batcher::{SummaryBatch, SummaryBatcher},
    dataset::NewsSummaryDataset,
};
use crate::domain::example::SummaryExample;

pub struct NewsSummaryDataModule {
    train_examples:        Vec<SummaryExample>,
    test_examples:         Vec<SummaryExample>,
    tokenizer:             Arc<Tokenizer>,
    batch_size:            usize,
    text_max_token_len:    usize,
    summary_max_token_len: usize,
    num_workers:           usize,
    seed:                  u64,
    train_dataset:         Option<Arc<NewsSummaryDataset>>,
    test_dataset:          Option<Arc<NewsSummaryDataset>>,
}

impl NewsSummaryDataModule {
    /// Defaults: batch size 8, 512 text tokens, 128 summary tokens, 2 workers
    pub fn new(
        train_examples: Vec<SummaryExample>,
        test_examples:  Vec<SummaryExample>,
        tokenizer:      Arc<Tokenizer>,
    ) -> Self {
        Self {
            train_examples,
            test_examples,
            tokenizer,
            batch_size:            8,
            text_max_token_len:    512,
            summary_max_token_len: 128,
            num_workers:           2,
            seed:                  42,
            train_dataset:         None,
            test_dataset:          None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_token_lens(mut self, text: usize, summary: usize) -> Self {
        self.text_max_token_len    = text;
        self.summary_max_token_len = summary;
        self
    }

    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    /// Seed for the training loader's shuffle
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build both datasets. Must run before any loader is requested.
    pub fn setup(&mut self) -> Result<()> {
        self.train_dataset = Some(Arc::new(NewsSummaryDataset::new(
            self.train_examples.clone(),
            self.tokenizer.clone(),
            self.text_max_token_len,
            self.summary_max_token_len,
        )?));
        self.test_dataset = Some(Arc::new(NewsSummaryDataset::new(
            self.test_examples.clone(),
            self.tokenizer.clone(),
            self.text_max_token_len,
            self.summary_max_token_len,
        )?));
        tracing::debug!(
            "Data module ready: {} train / {} test examples",
            self.train_examples.len(),
            self.test_examples.len()
        );
        Ok(())
    }

    pub fn train_len(&self) -> usize {
        self.train_examples.len()
    }

    pub fn test_len(&self) -> usize {
        self.test_examples.len()
    }

    pub fn test_examples(&self) -> &[SummaryExample] {
        &self.test_examples
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn train_dataloader<B: Backend>(
        &self,
        device: B::Device,
    ) -> Result<Arc<dyn DataLoader<SummaryBatch<B>>>> {
        let dataset = self.dataset(&self.train_dataset)?;
        Ok(DataLoaderBuilder::new(SummaryBatcher::<B>::new(device))
            .batch_size(self.batch_size)
            .shuffle(self.seed)
            .num_workers(self.num_workers)
            .build(dataset))
    }

    pub fn val_dataloader<B: Backend>(
        &self,
        device: B::Device,
    ) -> Result<Arc<dyn DataLoader<SummaryBatch<B>>>> {
        self.ordered_loader(device)
    }

    pub fn test_dataloader<B: Backend>(
        &self,
        device: B::Device,
    ) -> Result<Arc<dyn DataLoader<SummaryBatch<B>>>> {
        self.ordered_loader(device)
    }

    fn ordered_loader<B: Backend>(
        &self,
        device: B::Device,
    ) -> Result<Arc<dyn DataLoader<SummaryBatch<B>>>> {
        let dataset = self.dataset(&self.test_dataset)?;
        Ok(DataLoaderBuilder::new(SummaryBatcher::<B>::new(device))
            .batch_size(self.batch_size)
            .num_workers(self.num_workers)
            .build(dataset))
    }

    fn dataset(&self, slot: &Option<Arc<NewsSummaryDataset>>) -> Result<Arc<NewsSummaryDataset>> {
        slot.clone()
            .ok_or_else(|| anyhow!("NewsSummaryDataModule::setup() has not been called"))
    }
}
