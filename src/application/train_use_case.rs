// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full fine-tuning pipeline in order:
//
//   Step 1: Load the CSV and drop incomplete rows (Layer 4 - data)
//   Step 2: Seeded train/test split               (Layer 4 - data)
//   Step 3: Load or build the tokenizer           (Layer 6 - infra)
//   Step 4: Build the data module                 (Layer 4 - data)
//   Step 5: Load pretrained T5                    (Layer 5 - ml)
//   Step 6: Save configs + tokenizer              (Layer 6 - infra)
//   Step 7: Run training loop                     (Layer 5 - ml)
//   Step 8: Reload best checkpoint, summarize one
//           test article as a smoke check         (Layer 5 - ml)
//   Step 9: Export the raw parameter state        (Layer 6 - infra)

use anyhow::{bail, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};
use tokenizers::Tokenizer;

use crate::application::Accelerator;
use crate::data::{
    datamodule::NewsSummaryDataModule,
    loader::{CsvLoader, TextEncoding},
    splitter::split_train_test,
};
use crate::domain::{example::SummaryExample, traits::ExampleSource};
use crate::infra::{
    checkpoint::{export_state, BestCheckpoint, CheckpointManager},
    metrics::MetricsLogger,
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    inferencer::Inferencer,
    model::SummaryModel,
    pretrained::{has_weights, load_model_config, load_pretrained},
    trainer::run_training,
};

/// Name of the run directory under `log_dir`
pub const RUN_NAME: &str = "news_summary";

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run. Saved next to the checkpoint so
// evaluation and inference can reproduce the split and encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub csv_path:              String,
    pub text_column:           String,
    pub summary_column:        String,
    pub encoding:              TextEncoding,
    pub model_dir:             String,
    pub checkpoint_dir:        String,
    pub log_dir:               String,
    pub state_path:            String,
    pub text_max_token_len:    usize,
    pub summary_max_token_len: usize,
    pub batch_size:            usize,
    pub epochs:                usize,
    pub lr:                    f64,
    pub test_fraction:         f64,
    pub num_workers:           usize,
    pub seed:                  u64,
    pub device:                Accelerator,
    pub log_every:             usize,
    /// Only used when no tokenizer.json exists and one is built
    pub vocab_size:            usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            csv_path:              "news_summary.csv".to_string(),
            text_column:           "ctext".to_string(),
            summary_column:        "text".to_string(),
            encoding:              TextEncoding::Latin1,
            model_dir:             "t5-base".to_string(),
            checkpoint_dir:        "checkpoints".to_string(),
            log_dir:               "logs".to_string(),
            state_path:            "news_data_model.mpk".to_string(),
            text_max_token_len:    512,
            summary_max_token_len: 128,
            batch_size:            8,
            epochs:                3,
            lr:                    1e-4,
            test_fraction:         0.1,
            num_workers:           2,
            seed:                  42,
            device:                Accelerator::Gpu,
            log_every:             50,
            vocab_size:            32128,
        }
    }
}

/// What the CLI reports after training
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub best:   BestCheckpoint,
    /// (article, reference summary, generated summary) of the first test example
    pub sample: Option<(String, String, String)>,
}

// ─── Shared data preparation ─────────────────────────────────────────────────
/// The split and tokenizer a TrainConfig describes.
pub struct PreparedData {
    pub train:     Vec<SummaryExample>,
    pub test:      Vec<SummaryExample>,
    pub tokenizer: Arc<Tokenizer>,
}

/// Steps 1–3: load, split, tokenizer. Shared by train, evaluate and stats.
///
/// A tokenizer built from the corpus is written to `checkpoint_dir`
/// only when `persist_tokenizer` is set; read-only commands keep it
/// in memory.
pub fn prepare_data(cfg: &TrainConfig, persist_tokenizer: bool) -> Result<PreparedData> {
    let loader = CsvLoader::new(&cfg.csv_path)
        .with_columns(&cfg.text_column, &cfg.summary_column)
        .with_encoding(cfg.encoding);
    let examples = loader.load_all()?;
    if examples.is_empty() {
        bail!("No usable examples in '{}'", cfg.csv_path);
    }

    let (train, test) = split_train_test(examples, cfg.test_fraction, cfg.seed);
    tracing::info!("Split: {} train, {} test", train.len(), test.len());

    let tokenizer = resolve_tokenizer(cfg, &train, persist_tokenizer)?;
    Ok(PreparedData { train, test, tokenizer: Arc::new(tokenizer) })
}

/// Pretrained tokenizer if the model directory has one, otherwise the
/// checkpoint directory's, otherwise one built from the training split.
fn resolve_tokenizer(
    cfg:     &TrainConfig,
    train:   &[SummaryExample],
    persist: bool,
) -> Result<Tokenizer> {
    let pretrained = TokenizerStore::new(&cfg.model_dir);
    if pretrained.exists() {
        tracing::info!("Using pretrained tokenizer '{}'", pretrained.path().display());
        return pretrained.load();
    }
    let texts = train
        .iter()
        .flat_map(|e| [e.text.as_str(), e.summary.as_str()]);
    let saved = TokenizerStore::new(&cfg.checkpoint_dir);
    if persist {
        saved.load_or_build(texts, cfg.vocab_size)
    } else if saved.exists() {
        saved.load()
    } else {
        TokenizerStore::build(texts, cfg.vocab_size)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end on the configured device
    pub fn execute(&self) -> Result<TrainReport> {
        match self.config.device {
            Accelerator::Gpu => {
                let device = WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                self.execute_on::<Autodiff<Wgpu>>(device)
            }
            Accelerator::Cpu => {
                tracing::info!("Using ndarray CPU backend");
                self.execute_on::<Autodiff<NdArray>>(NdArrayDevice::Cpu)
            }
        }
    }

    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Steps 1-3: Load, split, tokenizer ─────────────────────────────────
        let PreparedData { train, test, tokenizer } = prepare_data(cfg, true)?;

        // ── Step 4: Data module ───────────────────────────────────────────────
        let mut data = NewsSummaryDataModule::new(train, test, tokenizer.clone())
            .with_batch_size(cfg.batch_size)
            .with_max_token_lens(cfg.text_max_token_len, cfg.summary_max_token_len)
            .with_num_workers(cfg.num_workers)
            .with_seed(cfg.seed);
        data.setup()?;

        // ── Step 5: Pretrained model ──────────────────────────────────────────
        let model_dir     = Path::new(&cfg.model_dir);
        let mut model_cfg = load_model_config(model_dir)?;
        let tok_vocab     = tokenizer.get_vocab_size(true);
        if has_weights(model_dir) {
            if tok_vocab > model_cfg.vocab_size {
                bail!(
                    "Tokenizer has {} tokens but the pretrained model only {}",
                    tok_vocab,
                    model_cfg.vocab_size
                );
            }
        } else if tok_vocab != model_cfg.vocab_size {
            tracing::info!("Resizing vocabulary to the tokenizer's {} tokens", tok_vocab);
            model_cfg.vocab_size = tok_vocab;
        }
        let model = SummaryModel::new(load_pretrained::<B>(model_dir, &model_cfg, &device)?);

        // ── Step 6: Save configs + tokenizer for inference ────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.save_config(cfg)?;
        ckpt_manager.save_model_config(&model_cfg)?;
        TokenizerStore::new(&cfg.checkpoint_dir).save(&tokenizer)?;

        // ── Step 7: Training loop (Layer 5) ───────────────────────────────────
        let metrics = MetricsLogger::new(&cfg.log_dir, RUN_NAME)?;
        let outcome = run_training(cfg, &data, model, &ckpt_manager, &metrics, &device)?;
        let Some(best) = outcome.best else {
            bail!("Training never produced a finite loss; no checkpoint was saved");
        };

        // ── Step 8: Reload best checkpoint and summarize one test article ─────
        let inferencer =
            Inferencer::<B::InnerBackend>::from_checkpoint(&ckpt_manager, tokenizer, device)?;
        let sample = match data.test_examples().first() {
            Some(example) => {
                let predicted = inferencer.summarize(&example.text)?;
                tracing::info!("Reference summary: {}", example.summary);
                tracing::info!("Generated summary: {}", predicted);
                Some((example.text.clone(), example.summary.clone(), predicted))
            }
            None => None,
        };

        // ── Step 9: Export raw state ──────────────────────────────────────────
        export_state(inferencer.model(), Path::new(&cfg.state_path))?;

        Ok(TrainReport { best, sample })
    }
}
