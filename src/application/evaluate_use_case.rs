// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Scores the best checkpoint on the held-out split.
//
//   Step 1: Read the run's saved TrainConfig
//   Step 2: Rebuild the same seeded split + tokenizer
//   Step 3: Restore the best checkpoint
//   Step 4: Mean test_loss over the test dataloader

use anyhow::{bail, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::Backend,
};
use std::path::PathBuf;

use crate::application::{train_use_case::prepare_data, Accelerator};
use crate::data::datamodule::NewsSummaryDataModule;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{model::SummaryModel, trainer::mean_loss};

#[derive(Debug, Clone)]
pub struct EvaluateReport {
    pub test_loss:     f64,
    pub test_examples: usize,
    /// Epoch the evaluated checkpoint was saved at
    pub epoch:         Option<usize>,
}

pub struct EvaluateUseCase {
    checkpoint_dir: PathBuf,
    /// Overrides the device the run was trained on
    device:         Option<Accelerator>,
}

impl EvaluateUseCase {
    pub fn new(checkpoint_dir: impl Into<PathBuf>, device: Option<Accelerator>) -> Self {
        Self { checkpoint_dir: checkpoint_dir.into(), device }
    }

    pub fn execute(&self) -> Result<EvaluateReport> {
        let ckpt_manager = CheckpointManager::new(&self.checkpoint_dir);
        let device = match self.device {
            Some(device) => device,
            None         => ckpt_manager.load_config()?.device,
        };
        match device {
            Accelerator::Gpu => self.execute_on::<Wgpu>(WgpuDevice::default()),
            Accelerator::Cpu => self.execute_on::<NdArray>(NdArrayDevice::Cpu),
        }
    }

    pub fn execute_on<B: Backend>(&self, device: B::Device) -> Result<EvaluateReport> {
        let ckpt_manager = CheckpointManager::new(&self.checkpoint_dir);

        // ── Step 1: Saved run configuration ───────────────────────────────────
        let cfg = ckpt_manager.load_config()?;

        // ── Step 2: Same split, same tokenizer ────────────────────────────────
        let prepared = prepare_data(&cfg, false)?;
        if prepared.test.is_empty() {
            bail!("The test split is empty; nothing to evaluate");
        }
        let mut data = NewsSummaryDataModule::new(prepared.train, prepared.test, prepared.tokenizer)
            .with_batch_size(cfg.batch_size)
            .with_max_token_lens(cfg.text_max_token_len, cfg.summary_max_token_len)
            .with_num_workers(cfg.num_workers)
            .with_seed(cfg.seed);
        data.setup()?;

        // ── Step 3: Best checkpoint ───────────────────────────────────────────
        let model_cfg = ckpt_manager.load_model_config()?;
        let model     = SummaryModel::new(model_cfg.init::<B>(&device)?);
        let model     = ckpt_manager.load_best(model, &device)?;
        let epoch     = ckpt_manager.best_meta()?.map(|m| m.epoch);

        // ── Step 4: test_loss ─────────────────────────────────────────────────
        let loader    = data.test_dataloader::<B>(device)?;
        let test_loss = mean_loss(loader, |batch| model.test_step(batch));
        tracing::info!("test_loss={:.4} over {} examples", test_loss, data.test_len());

        Ok(EvaluateReport { test_loss, test_examples: data.test_len(), epoch })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::data::loader::TextEncoding;
    use crate::infra::{checkpoint::BestCheckpoint, tokenizer_store::TokenizerStore};
    use crate::test_support::{sample_examples, tiny_config, TestBackend};
    use std::{fs, path::Path};

    fn saved_run(dir: &Path, test_fraction: f64) -> PathBuf {
        let csv = dir.join("news.csv");
        let mut body = String::from("text,ctext\n");
        for ex in sample_examples() {
            body.push_str(&format!("\"{}\",\"{}\"\n", ex.summary, ex.text));
        }
        fs::write(&csv, body).unwrap();

        let ckpt_dir = dir.join("checkpoints");
        let cfg = TrainConfig {
            csv_path:              csv.display().to_string(),
            model_dir:             dir.join("no-model").display().to_string(),
            checkpoint_dir:        ckpt_dir.display().to_string(),
            encoding:              TextEncoding::Utf8,
            text_max_token_len:    16,
            summary_max_token_len: 8,
            batch_size:            2,
            num_workers:           1,
            test_fraction,
            device:                Accelerator::Cpu,
            vocab_size:            200,
            ..TrainConfig::default()
        };

        // builds and stores the tokenizer the same way training does
        let prepared  = prepare_data(&cfg, true).unwrap();
        let model_cfg = tiny_config(prepared.tokenizer.get_vocab_size(true));
        let model     = SummaryModel::<TestBackend>::new(model_cfg.init(&Default::default()).unwrap());
        let ckpt      = CheckpointManager::new(&ckpt_dir);
        ckpt.save_config(&cfg).unwrap();
        ckpt.save_model_config(&model_cfg).unwrap();
        ckpt.save_best(&model, BestCheckpoint { epoch: 2, validation_loss: 3.0 }).unwrap();
        assert!(TokenizerStore::new(&ckpt_dir).exists());
        ckpt_dir
    }

    #[test]
    fn test_evaluate_reports_finite_test_loss() {
        let dir      = tempfile::tempdir().unwrap();
        let ckpt_dir = saved_run(dir.path(), 0.34);

        let report = EvaluateUseCase::new(&ckpt_dir, None)
            .execute_on::<TestBackend>(Default::default())
            .unwrap();

        assert_eq!(report.test_examples, 3);
        assert_eq!(report.epoch, Some(2));
        assert!(report.test_loss.is_finite());
        assert!(report.test_loss > 0.0);
    }

    #[test]
    fn test_evaluate_without_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = EvaluateUseCase::new(dir.path(), Some(Accelerator::Cpu)).execute();
        assert!(result.is_err());
    }
}
