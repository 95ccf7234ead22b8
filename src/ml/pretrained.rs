// ============================================================
// Layer 5 — Pretrained Weight Import
// ============================================================
// Loads a HuggingFace T5 directory:
//
//   <model_dir>/
//     config.json        → T5Config
//     tokenizer.json     → (infra::tokenizer_store)
//     pytorch_model.bin  → T5 record via burn-import
//
// HuggingFace parameter names are rewritten onto the Burn
// module tree, e.g.
//
//   encoder.block.3.layer.1.DenseReluDense.wi.weight
//     → encoder.blocks.3.ff.wi.weight
//   decoder.block.0.layer.0.SelfAttention.relative_attention_bias.weight
//     → decoder.relative_attention_bias.weight
//
// Every pattern maps an original name in one go, so the result
// does not depend on whether remaps are applied in sequence.

use anyhow::{anyhow, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use serde::Deserialize;
use std::{fs, path::Path};

use crate::ml::t5::{T5Config, T5};

pub const CONFIG_FILE:  &str = "config.json";
pub const WEIGHTS_FILE: &str = "pytorch_model.bin";

const KEY_REMAPS: [(&str, &str); 9] = [
    (
        r"^(encoder|decoder)\.block\.0\.layer\.0\.SelfAttention\.relative_attention_bias\.",
        "${1}.relative_attention_bias.",
    ),
    (
        r"^(encoder|decoder)\.block\.([0-9]+)\.layer\.0\.SelfAttention\.(q|k|v|o)\.",
        "${1}.blocks.${2}.self_attn.${3}.",
    ),
    (
        r"^(encoder|decoder)\.block\.([0-9]+)\.layer\.0\.layer_norm\.",
        "${1}.blocks.${2}.self_attn_norm.",
    ),
    (r"^decoder\.block\.([0-9]+)\.layer\.1\.EncDecAttention\.", "decoder.blocks.${1}.cross_attn."),
    (r"^decoder\.block\.([0-9]+)\.layer\.1\.layer_norm\.", "decoder.blocks.${1}.cross_attn_norm."),
    (r"^decoder\.block\.([0-9]+)\.layer\.2\.DenseReluDense\.", "decoder.blocks.${1}.ff."),
    (r"^decoder\.block\.([0-9]+)\.layer\.2\.layer_norm\.", "decoder.blocks.${1}.ff_norm."),
    (r"^encoder\.block\.([0-9]+)\.layer\.1\.DenseReluDense\.", "encoder.blocks.${1}.ff."),
    (r"^encoder\.block\.([0-9]+)\.layer\.1\.layer_norm\.", "encoder.blocks.${1}.ff_norm."),
];

/// Tied checkpoints may still carry a copy of the head
const TIED_HEAD_REMAP: (&str, &str) = (r"^lm_head\.", "unused_lm_head.");

// ─── config.json ──────────────────────────────────────────────────────────────
/// The subset of HuggingFace's T5 `config.json` the model needs.
/// Absent keys take t5-base values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HfT5Config {
    pub vocab_size:                      usize,
    pub d_model:                         usize,
    pub d_kv:                            usize,
    pub d_ff:                            usize,
    pub num_layers:                      usize,
    pub num_decoder_layers:              Option<usize>,
    pub num_heads:                       usize,
    pub relative_attention_num_buckets:  usize,
    pub relative_attention_max_distance: usize,
    pub dropout_rate:                    f64,
    pub layer_norm_epsilon:              f64,
    pub feed_forward_proj:               String,
    pub pad_token_id:                    usize,
    pub eos_token_id:                    usize,
    pub decoder_start_token_id:          usize,
    pub tie_word_embeddings:             bool,
}

impl Default for HfT5Config {
    fn default() -> Self {
        let base = T5Config::new();
        Self {
            vocab_size:                      base.vocab_size,
            d_model:                         base.d_model,
            d_kv:                            base.d_kv,
            d_ff:                            base.d_ff,
            num_layers:                      base.num_layers,
            num_decoder_layers:              base.num_decoder_layers,
            num_heads:                       base.num_heads,
            relative_attention_num_buckets:  base.relative_attention_num_buckets,
            relative_attention_max_distance: base.relative_attention_max_distance,
            dropout_rate:                    base.dropout_rate,
            layer_norm_epsilon:              base.layer_norm_epsilon,
            feed_forward_proj:               base.feed_forward_proj,
            pad_token_id:                    base.pad_token_id,
            eos_token_id:                    base.eos_token_id,
            decoder_start_token_id:          base.decoder_start_token_id,
            tie_word_embeddings:             base.tie_word_embeddings,
        }
    }
}

impl From<HfT5Config> for T5Config {
    fn from(hf: HfT5Config) -> Self {
        let mut cfg = T5Config::new()
            .with_vocab_size(hf.vocab_size)
            .with_d_model(hf.d_model)
            .with_d_kv(hf.d_kv)
            .with_d_ff(hf.d_ff)
            .with_num_layers(hf.num_layers)
            .with_num_heads(hf.num_heads)
            .with_relative_attention_num_buckets(hf.relative_attention_num_buckets)
            .with_relative_attention_max_distance(hf.relative_attention_max_distance)
            .with_dropout_rate(hf.dropout_rate)
            .with_layer_norm_epsilon(hf.layer_norm_epsilon)
            .with_feed_forward_proj(hf.feed_forward_proj)
            .with_pad_token_id(hf.pad_token_id)
            .with_eos_token_id(hf.eos_token_id)
            .with_decoder_start_token_id(hf.decoder_start_token_id)
            .with_tie_word_embeddings(hf.tie_word_embeddings);
        cfg.num_decoder_layers = hf.num_decoder_layers;
        cfg
    }
}

/// Read `<model_dir>/config.json`, or fall back to t5-base values.
pub fn load_model_config(model_dir: &Path) -> Result<T5Config> {
    let path = model_dir.join(CONFIG_FILE);
    if !path.exists() {
        tracing::warn!(
            "No '{}' found, using t5-base architecture defaults",
            path.display()
        );
        return Ok(T5Config::new());
    }
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
    let hf: HfT5Config = serde_json::from_str(&text)
        .with_context(|| format!("Invalid model config '{}'", path.display()))?;
    Ok(hf.into())
}

/// Whether `<model_dir>` holds pretrained weights
pub fn has_weights(model_dir: &Path) -> bool {
    model_dir.join(WEIGHTS_FILE).exists()
}

/// Build a T5 from `cfg` and load `<model_dir>/pytorch_model.bin` into it.
/// Without a weights file the model keeps its random initialisation.
pub fn load_pretrained<B: Backend>(
    model_dir: &Path,
    cfg:       &T5Config,
    device:    &B::Device,
) -> Result<T5<B>> {
    let model   = cfg.init::<B>(device)?;
    let weights = model_dir.join(WEIGHTS_FILE);

    if !weights.exists() {
        tracing::warn!(
            "No '{}' found, training from randomly initialised weights",
            weights.display()
        );
        return Ok(model);
    }

    let mut args = LoadArgs::new(weights.clone());
    for (pattern, replacement) in KEY_REMAPS {
        args = args.with_key_remap(pattern, replacement);
    }
    if cfg.tie_word_embeddings {
        args = args.with_key_remap(TIED_HEAD_REMAP.0, TIED_HEAD_REMAP.1);
    }

    let record = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(args, device)
        .map_err(|e| anyhow!("Cannot load pretrained weights '{}': {:?}", weights.display(), e))?;

    tracing::info!("Loaded pretrained weights from '{}'", weights.display());
    Ok(model.load_record(record))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tiny_config, TestBackend};

    #[test]
    fn test_hf_config_json_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{
                "architectures": ["T5ForConditionalGeneration"],
                "d_ff": 2048, "d_kv": 64, "d_model": 512,
                "num_heads": 8, "num_layers": 6,
                "vocab_size": 32128, "n_positions": 512,
                "task_specific_params": {"summarization": {"num_beams": 4}}
            }"#,
        )
        .unwrap();

        let cfg = load_model_config(dir.path()).unwrap();
        assert_eq!(cfg.d_model, 512);
        assert_eq!(cfg.num_layers, 6);
        assert_eq!(cfg.decoder_layers(), 6);
        // absent keys keep t5 defaults
        assert_eq!(cfg.relative_attention_max_distance, 128);
        assert_eq!(cfg.feed_forward_proj, "relu");
        assert!(cfg.tie_word_embeddings);
    }

    #[test]
    fn test_missing_config_uses_t5_base() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_model_config(dir.path()).unwrap();
        assert_eq!(cfg.d_model, 768);
        assert_eq!(cfg.num_heads, 12);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        let err = load_model_config(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains(CONFIG_FILE));
    }

    #[test]
    fn test_missing_weights_fall_back_to_random_init() {
        let dir   = tempfile::tempdir().unwrap();
        let model = load_pretrained::<TestBackend>(dir.path(), &tiny_config(10), &Default::default()).unwrap();
        assert_eq!(model.encoder.blocks.len(), 1);
        assert!(!has_weights(dir.path()));
    }
}
