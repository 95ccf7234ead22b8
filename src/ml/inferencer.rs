// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Turns an article into a summary with a frozen model:
//
//   text ─SequenceEncoder(512)─► ids, mask [1, 512]
//        ─beam_search──────────► generated ids
//        ─tokenizer.decode─────► text, special tokens skipped
//        ─clean_up_tokenization► "Shares rose ." → "Shares rose."
//
// The model can come from the best checkpoint or from an
// exported raw state file.

use anyhow::{anyhow, Result};
use burn::{prelude::*, tensor::TensorData};
use std::{path::Path, sync::Arc};
use tokenizers::Tokenizer;

use crate::data::encoder::SequenceEncoder;
use crate::domain::traits::Summarizer;
use crate::infra::checkpoint::{import_state, CheckpointManager};
use crate::ml::{
    generation::{beam_search, GenerationConfig},
    model::SummaryModel,
    t5::T5Config,
};

pub struct Inferencer<B: Backend> {
    model:      SummaryModel<B>,
    encoder:    SequenceEncoder,
    generation: GenerationConfig,
    device:     B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(
        model:              SummaryModel<B>,
        tokenizer:          Arc<Tokenizer>,
        text_max_token_len: usize,
        device:             B::Device,
    ) -> Result<Self> {
        Ok(Self {
            model,
            encoder:    SequenceEncoder::new(tokenizer, text_max_token_len)?,
            generation: GenerationConfig::new(),
            device,
        })
    }

    /// Rebuild the model from the checkpoint's configs and load the
    /// best weights.
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        tokenizer:    Arc<Tokenizer>,
        device:       B::Device,
    ) -> Result<Self> {
        let train_cfg = ckpt_manager.load_config()?;
        let model_cfg = ckpt_manager.load_model_config()?;
        let model     = SummaryModel::new(model_cfg.init::<B>(&device)?);
        let model     = ckpt_manager.load_best(model, &device)?;
        tracing::info!("Model loaded from checkpoint '{}'", ckpt_manager.dir().display());
        Self::new(model, tokenizer, train_cfg.text_max_token_len, device)
    }

    /// Build a model from `model_cfg` and load an exported state file into it.
    pub fn from_state_file(
        path:               &Path,
        model_cfg:          &T5Config,
        tokenizer:          Arc<Tokenizer>,
        text_max_token_len: usize,
        device:             B::Device,
    ) -> Result<Self> {
        let model = SummaryModel::new(model_cfg.init::<B>(&device)?);
        let model = import_state(model, path, &device)?;
        tracing::info!("Model loaded from state file '{}'", path.display());
        Self::new(model, tokenizer, text_max_token_len, device)
    }

    pub fn model(&self) -> &SummaryModel<B> {
        &self.model
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn summarize(&self, text: &str) -> Result<String> {
        let encoded = self.encoder.encode(text)?;
        let len     = encoded.input_ids.len();

        let input_ids      = self.int_row(&encoded.input_ids, len);
        let attention_mask = self.int_row(&encoded.attention_mask, len);

        let generated = beam_search(&self.model.t5, input_ids, attention_mask, &self.generation)?;
        tracing::debug!("Generated {} tokens", generated.len());

        let predictions = [self.decode(&generated)?];
        Ok(predictions.join(""))
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let text = self
            .encoder
            .tokenizer()
            .decode(ids, true)
            .map_err(|e| anyhow!("Decode: {e}"))?;
        Ok(clean_up_tokenization(&text))
    }

    fn int_row(&self, values: &[u32], len: usize) -> Tensor<B, 2, Int> {
        let values: Vec<i64> = values.iter().map(|&v| v as i64).collect();
        Tensor::from_data(TensorData::new(values, [1, len]), &self.device)
    }
}

impl<B: Backend> Summarizer for Inferencer<B> {
    fn summarize(&self, text: &str) -> Result<String> {
        Inferencer::summarize(self, text)
    }
}

/// Remove the spaces tokenizers leave before punctuation and
/// English contractions.
pub fn clean_up_tokenization(text: &str) -> String {
    text.replace(" .", ".")
        .replace(" ?", "?")
        .replace(" !", "!")
        .replace(" ,", ",")
        .replace(" ' ", "'")
        .replace(" n't", "n't")
        .replace(" 'm", "'m")
        .replace(" 's", "'s")
        .replace(" 've", "'ve")
        .replace(" 're", "'re")
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::checkpoint::export_state;
    use crate::test_support::{tiny_config, tiny_tokenizer, TestBackend};

    #[test]
    fn test_clean_up_tokenization() {
        assert_eq!(
            clean_up_tokenization("shares rose , but it did n't last . why ?"),
            "shares rose, but it didn't last. why?"
        );
        assert_eq!(clean_up_tokenization("the bank 's results"), "the bank's results");
    }

    fn inferencer() -> Inferencer<TestBackend> {
        let tokenizer = tiny_tokenizer();
        let vocab     = tokenizer.get_vocab_size(false);
        let model     = SummaryModel::new(tiny_config(vocab).init(&Default::default()).unwrap());
        Inferencer::new(model, tokenizer, 16, Default::default())
            .unwrap()
            .with_generation(GenerationConfig::new().with_max_length(6))
    }

    #[test]
    fn test_summarize_produces_text_without_special_tokens() {
        let summary = inferencer().summarize("the market rose today").unwrap();
        assert!(!summary.contains("</s>"));
        assert!(!summary.contains("<pad>"));
        assert!(summary.split_whitespace().count() <= 5);
    }

    #[test]
    fn test_summarizer_trait_matches_inherent_method() {
        let inf = inferencer();
        let via_trait: &dyn Summarizer = &inf;
        assert_eq!(
            via_trait.summarize("oil prices fell").unwrap(),
            inf.summarize("oil prices fell").unwrap()
        );
    }

    #[test]
    fn test_from_state_file_restores_same_outputs() {
        let dir       = tempfile::tempdir().unwrap();
        let path      = dir.path().join("news_data_model.mpk");
        let tokenizer = tiny_tokenizer();
        let cfg       = tiny_config(tokenizer.get_vocab_size(false));
        let model     = SummaryModel::<TestBackend>::new(cfg.init(&Default::default()).unwrap());
        export_state(&model, &path).unwrap();

        let gen      = GenerationConfig::new().with_max_length(6);
        let original = Inferencer::new(model, tokenizer.clone(), 16, Default::default())
            .unwrap()
            .with_generation(gen.clone());
        let restored = Inferencer::<TestBackend>::from_state_file(&path, &cfg, tokenizer, 16, Default::default())
            .unwrap()
            .with_generation(gen);

        let text = "gold climbed to a record";
        assert_eq!(original.summarize(text).unwrap(), restored.summarize(text).unwrap());
    }
}
