// ============================================================
// Layer 2 — SummarizeUseCase
// ============================================================
// Restores a trained model and summarizes one article.
//
//   1. Pick the tokenizer: the checkpoint's copy, else the
//      pretrained model directory's
//   2. Restore the model from the best checkpoint, or from an
//      exported state file when one is given
//   3. Run beam search with the requested generation settings
//
// Inference never needs gradients, so the plain (non-autodiff)
// backend is used.

use anyhow::{bail, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::Backend,
};
use std::{path::{Path, PathBuf}, sync::Arc};

use crate::application::Accelerator;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::{generation::GenerationConfig, inferencer::Inferencer, pretrained::load_model_config};

/// Where the model comes from and how to decode.
#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    pub checkpoint_dir: PathBuf,
    /// Exported raw state; used instead of the best checkpoint when set
    pub state_path:     Option<PathBuf>,
    pub model_dir:      PathBuf,
    pub device:         Accelerator,
    pub generation:     GenerationConfig,
}

pub struct SummarizeUseCase {
    request: SummarizeRequest,
}

impl SummarizeUseCase {
    pub fn new(request: SummarizeRequest) -> Self {
        Self { request }
    }

    pub fn summarize(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            bail!("Nothing to summarize: the input text is empty");
        }
        match self.request.device {
            Accelerator::Gpu => self.summarize_on::<Wgpu>(text, WgpuDevice::default()),
            Accelerator::Cpu => self.summarize_on::<NdArray>(text, NdArrayDevice::Cpu),
        }
    }

    pub fn summarize_on<B: Backend>(&self, text: &str, device: B::Device) -> Result<String> {
        let inferencer = self.inferencer::<B>(device)?;
        inferencer.summarize(text)
    }

    fn inferencer<B: Backend>(&self, device: B::Device) -> Result<Inferencer<B>> {
        let req          = &self.request;
        let ckpt_manager = CheckpointManager::new(&req.checkpoint_dir);
        let tokenizer    = Arc::new(self.tokenizer_store().load()?);

        let inferencer = match &req.state_path {
            None => Inferencer::<B>::from_checkpoint(&ckpt_manager, tokenizer, device)?,
            Some(path) => {
                // the checkpoint's configs describe the exported model when present
                let model_cfg = match ckpt_manager.load_model_config() {
                    Ok(cfg) => cfg,
                    Err(_)  => load_model_config(&req.model_dir)?,
                };
                let text_max = ckpt_manager
                    .load_config()
                    .map(|c| c.text_max_token_len)
                    .unwrap_or(512);
                Inferencer::<B>::from_state_file(path, &model_cfg, tokenizer, text_max, device)?
            }
        };
        Ok(inferencer.with_generation(req.generation.clone()))
    }

    fn tokenizer_store(&self) -> TokenizerStore {
        let saved = TokenizerStore::new(&self.request.checkpoint_dir);
        if saved.exists() {
            saved
        } else {
            TokenizerStore::new(&self.request.model_dir)
        }
    }
}

/// Inline text wins; otherwise the file's contents.
pub fn read_input(text: Option<String>, file: Option<&Path>) -> Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Cannot read input file '{}': {}", path.display(), e)
        }),
        (None, None) => bail!("Provide the article with --text or --file"),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::infra::checkpoint::{export_state, BestCheckpoint};
    use crate::ml::model::SummaryModel;
    use crate::test_support::{tiny_config, tiny_tokenizer, TestBackend};

    fn trained_checkpoint(dir: &Path) -> SummarizeRequest {
        let ckpt_dir  = dir.join("checkpoints");
        let ckpt      = CheckpointManager::new(&ckpt_dir);
        let tokenizer = tiny_tokenizer();
        let model_cfg = tiny_config(tokenizer.get_vocab_size(false));
        let model     = SummaryModel::<TestBackend>::new(model_cfg.init(&Default::default()).unwrap());

        ckpt.save_config(&TrainConfig { text_max_token_len: 16, ..TrainConfig::default() }).unwrap();
        ckpt.save_model_config(&model_cfg).unwrap();
        ckpt.save_best(&model, BestCheckpoint { epoch: 1, validation_loss: 2.0 }).unwrap();
        TokenizerStore::new(&ckpt_dir).save(&tokenizer).unwrap();
        export_state(&model, &dir.join("state.mpk")).unwrap();

        SummarizeRequest {
            checkpoint_dir: ckpt_dir,
            state_path:     None,
            model_dir:      dir.join("missing-model"),
            device:         Accelerator::Cpu,
            generation:     GenerationConfig::new().with_max_length(5),
        }
    }

    #[test]
    fn test_checkpoint_and_state_file_agree() {
        let dir = tempfile::tempdir().unwrap();
        let req = trained_checkpoint(dir.path());

        let from_ckpt = SummarizeUseCase::new(req.clone())
            .summarize_on::<TestBackend>("the bank rallied", Default::default())
            .unwrap();

        let from_state = SummarizeUseCase::new(SummarizeRequest {
            state_path: Some(dir.path().join("state.mpk")),
            ..req
        })
        .summarize_on::<TestBackend>("the bank rallied", Default::default())
        .unwrap();

        assert_eq!(from_ckpt, from_state);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let req = trained_checkpoint(dir.path());
        assert!(SummarizeUseCase::new(req).summarize("   ").is_err());
    }

    #[test]
    fn test_read_input_prefers_inline_text() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "from file").unwrap();

        assert_eq!(read_input(Some("inline".into()), Some(file.path())).unwrap(), "inline");
        assert_eq!(read_input(None, Some(file.path())).unwrap(), "from file");
        assert!(read_input(None, None).is_err());
    }
}
