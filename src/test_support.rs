// Shared fixtures for the unit tests: a word-level tokenizer over a
// tiny financial-news corpus, matching examples, and a T5 small enough
// to run a forward pass on ndarray in milliseconds.

use burn::backend::{Autodiff, NdArray};
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::domain::example::SummaryExample;
use crate::infra::tokenizer_store::TokenizerStore;
use crate::ml::t5::T5Config;

pub type TestBackend         = NdArray;
pub type TestAutodiffBackend = Autodiff<NdArray>;

const CORPUS: [(&str, &str); 6] = [
    (
        "the market rose today as shares of the bank rallied after strong results",
        "market rose as bank shares rallied",
    ),
    (
        "oil prices fell sharply on monday as supply fears eased across the region",
        "oil prices fell on monday",
    ),
    (
        "the central bank kept interest rates unchanged and signalled patience",
        "central bank kept rates unchanged",
    ),
    (
        "technology shares led the index higher while energy stocks lagged behind",
        "technology shares led the index higher",
    ),
    (
        "the government announced a new budget with higher spending on roads",
        "government announced a new budget",
    ),
    (
        "gold climbed to a record as investors sought safety from market turmoil",
        "gold climbed to a record",
    ),
];

pub fn sample_examples() -> Vec<SummaryExample> {
    CORPUS
        .iter()
        .map(|(text, summary)| SummaryExample::new(*text, *summary))
        .collect()
}

pub fn tiny_tokenizer() -> Arc<Tokenizer> {
    let dir   = tempfile::tempdir().unwrap();
    let store = TokenizerStore::new(dir.path());
    let texts = CORPUS.iter().flat_map(|(t, s)| [*t, *s]);
    Arc::new(store.load_or_build(texts, 200).unwrap())
}

pub fn tiny_config(vocab_size: usize) -> T5Config {
    T5Config::new()
        .with_vocab_size(vocab_size)
        .with_d_model(16)
        .with_d_kv(4)
        .with_d_ff(32)
        .with_num_layers(1)
        .with_num_heads(2)
        .with_relative_attention_num_buckets(8)
        .with_relative_attention_max_distance(16)
        .with_dropout_rate(0.0)
}
