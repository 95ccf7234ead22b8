// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the fine-tuned summarizer.
//
// Only the best epoch (lowest validation loss) is kept:
//
//   checkpoints/
//     best-checkpoint.mpk.gz   ← full-precision weights (gzip named MessagePack)
//     best-checkpoint.json     ← {"epoch": 2, "validation_loss": 1.84}
//     train_config.json        ← TrainConfig used for the run
//     model_config.json        ← T5Config needed to rebuild the model
//     tokenizer.json           ← copy of the tokenizer (infra::tokenizer_store)
//
// The raw state export is separate from the checkpoint: a
// full-precision named MessagePack file holding parameters only,
// reloadable into any model built from the same T5Config.
//
// Loading fails if the architecture doesn't match the record.

use anyhow::{anyhow, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, NamedMpkGzFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::{model::SummaryModel, t5::T5Config};

const BEST_CHECKPOINT: &str = "best-checkpoint";
const BEST_META:       &str = "best-checkpoint.json";
const TRAIN_CONFIG:    &str = "train_config.json";
const MODEL_CONFIG:    &str = "model_config.json";

/// Recorder for the best checkpoint. Full precision so evaluation and
/// inference see exactly the weights that scored best.
type CheckpointRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Which epoch the saved weights come from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestCheckpoint {
    pub epoch:           usize,
    pub validation_loss: f64,
}

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Overwrite the best checkpoint with `model`.
    pub fn save_best<B: Backend>(&self, model: &SummaryModel<B>, meta: BestCheckpoint) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // recorder appends the .mpk.gz extension
        let path = self.dir.join(BEST_CHECKPOINT);
        CheckpointRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let meta_path = self.dir.join(BEST_META);
        fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)
            .with_context(|| format!("Failed to write '{}'", meta_path.display()))?;

        tracing::debug!(
            "Saved best checkpoint: epoch {} (validation_loss={:.4})",
            meta.epoch,
            meta.validation_loss
        );
        Ok(())
    }

    /// Restore the best checkpoint into `model`, which must have the
    /// same architecture.
    pub fn load_best<B: Backend>(
        &self,
        model:  SummaryModel<B>,
        device: &B::Device,
    ) -> Result<SummaryModel<B>> {
        let path = self.dir.join(BEST_CHECKPOINT);
        if let Some(meta) = self.best_meta()? {
            tracing::info!(
                "Loading best checkpoint from epoch {} (validation_loss={:.4})",
                meta.epoch,
                meta.validation_loss
            );
        }

        let record = CheckpointRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display()
                )
            })?;
        Ok(model.load_record(record))
    }

    /// None until the first checkpoint is written
    pub fn best_meta(&self) -> Result<Option<BestCheckpoint>> {
        let path = self.dir.join(BEST_META);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(TRAIN_CONFIG);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(TRAIN_CONFIG);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' first.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save_model_config(&self, cfg: &T5Config) -> Result<()> {
        let path = self.dir.join(MODEL_CONFIG);
        cfg.save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))
    }

    pub fn load_model_config(&self) -> Result<T5Config> {
        let path = self.dir.join(MODEL_CONFIG);
        T5Config::load(&path)
            .map_err(|e| anyhow!("Cannot read model config '{}': {:?}", path.display(), e))
    }
}

// ─── Raw State Export ─────────────────────────────────────────────────────────
/// Write only the model parameters to `path` (named MessagePack).
pub fn export_state<B: Backend>(model: &SummaryModel<B>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
        .record(model.clone().into_record(), path.to_path_buf())
        .with_context(|| format!("Failed to export model state to '{}'", path.display()))?;
    tracing::info!("Model state exported to '{}'", path.display());
    Ok(())
}

/// Load parameters written by [`export_state`] into a freshly built model.
pub fn import_state<B: Backend>(
    model:  SummaryModel<B>,
    path:   &Path,
    device: &B::Device,
) -> Result<SummaryModel<B>> {
    let record = NamedMpkFileRecorder::<FullPrecisionSettings>::new()
        .load(path.to_path_buf(), device)
        .with_context(|| format!("Cannot load model state '{}'", path.display()))?;
    Ok(model.load_record(record))
}
