// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Manages tokenizer loading, building, and saving.
//
// The normal path loads the pretrained T5 `tokenizer.json`
// shipped with the model. When no pretrained tokenizer exists
// (training from scratch), a word-level vocabulary is built
// from the corpus and written in HuggingFace JSON format with
// T5's special tokens at T5's ids:
//
//   <pad> = 0    </s> = 1    <unk> = 2
//
// The vocabulary is counted over the pieces the tokenizer's own
// BertNormalizer + Whitespace pre-tokenizer produce, so
// punctuation gets ids instead of collapsing into <unk>.
// `build` stays in memory; `load_or_build` also saves.

use anyhow::{anyhow, Context, Result};
use std::{collections::HashMap, fs, path::PathBuf};
use tokenizers::{
    normalizers::bert::BertNormalizer, pre_tokenizers::whitespace::Whitespace, NormalizedString,
    Normalizer, OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer, Tokenizer,
};

use crate::data::encoder::{EOS_TOKEN, PAD_TOKEN, UNK_TOKEN};

const TOKENIZER_FILE: &str = "tokenizer.json";
const SPECIAL_TOKENS: [&str; 3] = [PAD_TOKEN, EOS_TOKEN, UNK_TOKEN];

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Load a previously saved tokenizer from JSON file
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    /// Load existing tokenizer or build a word-level one from texts and save it
    pub fn load_or_build<'a>(
        &self,
        texts:      impl IntoIterator<Item = &'a str>,
        vocab_size: usize,
    ) -> Result<Tokenizer> {
        if self.exists() {
            tracing::info!("Loading tokenizer from '{}'", self.path().display());
            return self.load();
        }
        let tokenizer = Self::build(texts, vocab_size)?;
        self.save(&tokenizer)?;
        tracing::info!("Tokenizer saved to '{}'", self.path().display());
        Ok(tokenizer)
    }

    /// Write `tokenizer` into this store's directory
    pub fn save(&self, tokenizer: &Tokenizer) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.path();
        tokenizer
            .save(&path, true)
            .map_err(|e| anyhow!("Cannot save tokenizer to '{}': {}", path.display(), e))
    }

    /// Build a word-level tokenizer from `texts` in memory.
    ///
    /// The vocabulary is counted over the same normalizer and
    /// pre-tokenizer the returned tokenizer applies, so every piece it
    /// produces on the corpus (punctuation included) has an id.
    pub fn build<'a>(
        texts:      impl IntoIterator<Item = &'a str>,
        vocab_size: usize,
    ) -> Result<Tokenizer> {
        tracing::info!("Building word-level tokenizer (vocab_size={})", vocab_size);
        let normalizer    = normalizer();
        let pre_tokenizer = Whitespace::default();

        // ── Step 1: Count piece frequencies ───────────────────────────────────
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for piece in split_pieces(&normalizer, &pre_tokenizer, text)? {
                *freq.entry(piece).or_insert(0) += 1;
            }
        }

        // Most frequent first; ties broken alphabetically so rebuilding
        // from the same corpus always yields the same ids
        let mut pieces: Vec<(String, usize)> = freq.into_iter().collect();
        pieces.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        pieces.truncate(vocab_size.saturating_sub(SPECIAL_TOKENS.len()));

        // ── Step 2: Build vocab JSON ──────────────────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (id, token) in SPECIAL_TOKENS.iter().enumerate() {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        for (piece, _) in &pieces {
            if !vocab.contains_key(piece) {
                let id = vocab.len();
                vocab.insert(piece.clone(), serde_json::json!(id));
            }
        }
        let vocab_len = vocab.len();

        // ── Step 3: Assemble tokenizer JSON in HuggingFace format ─────────────
        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .enumerate()
            .map(|(id, token)| serde_json::json!({
                "id": id, "content": token, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": serde_json::to_value(&normalizer)?,
            "pre_tokenizer": serde_json::to_value(&pre_tokenizer)?,
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let tokenizer = Tokenizer::from_bytes(serde_json::to_vec(&tokenizer_json)?)
            .map_err(|e| anyhow!("Cannot assemble tokenizer: {e}"))?;
        tracing::info!("Tokenizer built with {} entries", vocab_len);
        Ok(tokenizer)
    }
}

// lowercasing BERT normalizer
fn normalizer() -> BertNormalizer {
    BertNormalizer::new(true, true, None, true)
}

/// Normalize then pre-tokenize `text` exactly as the built tokenizer will.
fn split_pieces(
    normalizer:    &BertNormalizer,
    pre_tokenizer: &Whitespace,
    text:          &str,
) -> Result<Vec<String>> {
    let mut normalized = NormalizedString::from(text);
    normalizer
        .normalize(&mut normalized)
        .map_err(|e| anyhow!("Normalization error: {e}"))?;

    let mut pre_tokenized = PreTokenizedString::from(normalized);
    pre_tokenizer
        .pre_tokenize(&mut pre_tokenized)
        .map_err(|e| anyhow!("Pre-tokenization error: {e}"))?;

    Ok(pre_tokenized
        .get_splits(OffsetReferential::Normalized, OffsetType::Byte)
        .into_iter()
        .map(|(piece, _, _)| piece.to_string())
        .collect())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_uses_t5_special_ids() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let tok   = store.load_or_build(["Stocks rose while stocks fell"], 100).unwrap();

        assert_eq!(tok.token_to_id(PAD_TOKEN), Some(0));
        assert_eq!(tok.token_to_id(EOS_TOKEN), Some(1));
        assert_eq!(tok.token_to_id(UNK_TOKEN), Some(2));
        // most frequent word gets the first free id
        assert_eq!(tok.token_to_id("stocks"), Some(3));
        assert!(store.exists());
    }

    #[test]
    fn test_vocab_size_is_respected() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let tok   = store.load_or_build(["a b c d e f g h i j"], 6).unwrap();
        assert_eq!(tok.get_vocab_size(false), 6);
    }

    #[test]
    fn test_existing_tokenizer_is_reused() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        store.load_or_build(["alpha beta"], 50).unwrap();

        // a different corpus must not rebuild the vocabulary
        let tok = store.load_or_build(["gamma delta"], 50).unwrap();
        assert!(tok.token_to_id("alpha").is_some());
        assert!(tok.token_to_id("gamma").is_none());
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let dir   = tempfile::tempdir().unwrap();
        let tok   = TokenizerStore::new(dir.path()).load_or_build(["known words"], 50).unwrap();
        let enc   = tok.encode("unseen", false).unwrap();
        assert_eq!(enc.get_ids(), &[2]);
    }

    #[test]
    fn test_punctuation_survives_encode_and_decode() {
        let text = "The market rose, then fell... a rally!";
        let tok  = TokenizerStore::build([text], 100).unwrap();

        let enc = tok.encode(text, false).unwrap();
        assert!(!enc.get_ids().contains(&2), "pieces mapped to <unk>: {:?}", enc.get_tokens());
        assert_eq!(
            enc.get_tokens(),
            &["the", "market", "rose", ",", "then", "fell", "...", "a", "rally", "!"]
        );

        let decoded = tok.decode(enc.get_ids(), true).unwrap();
        assert_eq!(decoded, "the market rose , then fell ... a rally !");
    }

    #[test]
    fn test_build_does_not_write_files() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        TokenizerStore::build(["in memory only"], 50).unwrap();
        assert!(!store.exists());
    }

    #[test]
    fn test_save_copies_tokenizer() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(src.path()).load_or_build(["copy me"], 50).unwrap();

        let copy = TokenizerStore::new(dst.path());
        copy.save(&tok).unwrap();
        assert!(copy.exists());
        let reloaded = copy.load().unwrap();
        assert_eq!(reloaded.token_to_id("copy"), tok.token_to_id("copy"));
    }
}
