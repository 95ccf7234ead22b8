// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands and all their configurable flags:
//
//   train     — fine-tune on the news CSV
//   summarize — summarize an article with a trained model
//   evaluate  — test_loss of the best checkpoint
//   stats     — token length statistics of the training split
//
// Defaults reproduce the t5-base news_summary run.

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::{train_use_case::TrainConfig, Accelerator};
use crate::data::loader::TextEncoding;
use crate::ml::generation::GenerationConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune T5 on the news summary CSV
    Train(TrainArgs),

    /// Summarize an article with a trained model
    Summarize(SummarizeArgs),

    /// Compute the test loss of the best checkpoint
    Evaluate(EvaluateArgs),

    /// Print token length statistics of the training split
    Stats(StatsArgs),
}

// ─── Value enums ──────────────────────────────────────────────────────────────
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DeviceArg {
    Gpu,
    Cpu,
}

impl From<DeviceArg> for Accelerator {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Gpu => Accelerator::Gpu,
            DeviceArg::Cpu => Accelerator::Cpu,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum EncodingArg {
    Latin1,
    Utf8,
}

impl From<EncodingArg> for TextEncoding {
    fn from(e: EncodingArg) -> Self {
        match e {
            EncodingArg::Latin1 => TextEncoding::Latin1,
            EncodingArg::Utf8   => TextEncoding::Utf8,
        }
    }
}

// ─── Shared data flags ────────────────────────────────────────────────────────
/// Where the examples come from and how they are split and encoded.
/// Shared by `train` and `stats` so both see the same split.
#[derive(Args, Debug)]
pub struct DataArgs {
    /// CSV file with one article and one reference summary per row
    #[arg(long, default_value = "news_summary.csv")]
    pub csv_path: String,

    /// Column holding the full article
    #[arg(long, default_value = "ctext")]
    pub text_column: String,

    /// Column holding the reference summary
    #[arg(long, default_value = "text")]
    pub summary_column: String,

    #[arg(long, value_enum, default_value_t = EncodingArg::Latin1)]
    pub encoding: EncodingArg,

    /// Pretrained model directory (config.json, pytorch_model.bin, tokenizer.json)
    #[arg(long, default_value = "t5-base")]
    pub model_dir: String,

    /// Where checkpoints, configs and the tokenizer are written
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Articles are truncated or padded to this many tokens
    #[arg(long, default_value_t = 512)]
    pub text_max_token_len: usize,

    /// Summaries are truncated or padded to this many tokens
    #[arg(long, default_value_t = 128)]
    pub summary_max_token_len: usize,

    /// Fraction of examples held out for validation and test
    #[arg(long, default_value_t = 0.1)]
    pub test_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Vocabulary size when a tokenizer has to be built from the corpus
    #[arg(long, default_value_t = 32128)]
    pub vocab_size: usize,
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Directory for the step and epoch CSV logs
    #[arg(long, default_value = "logs")]
    pub log_dir: String,

    /// Raw parameter state exported after training
    #[arg(long, default_value = "news_data_model.mpk")]
    pub state_path: String,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    /// AdamW learning rate
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Data loader worker threads
    #[arg(long, default_value_t = 2)]
    pub num_workers: usize,

    #[arg(long, value_enum, default_value_t = DeviceArg::Gpu)]
    pub device: DeviceArg,

    /// Log train_loss to the console every N steps (0 disables)
    #[arg(long, default_value_t = 50)]
    pub log_every: usize,
}

impl From<DataArgs> for TrainConfig {
    fn from(d: DataArgs) -> Self {
        TrainConfig {
            csv_path:              d.csv_path,
            text_column:           d.text_column,
            summary_column:        d.summary_column,
            encoding:              d.encoding.into(),
            model_dir:             d.model_dir,
            checkpoint_dir:        d.checkpoint_dir,
            text_max_token_len:    d.text_max_token_len,
            summary_max_token_len: d.summary_max_token_len,
            test_fraction:         d.test_fraction,
            seed:                  d.seed,
            vocab_size:            d.vocab_size,
            ..TrainConfig::default()
        }
    }
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            log_dir:     a.log_dir,
            state_path:  a.state_path,
            batch_size:  a.batch_size,
            epochs:      a.epochs,
            lr:          a.lr,
            num_workers: a.num_workers,
            device:      a.device.into(),
            log_every:   a.log_every,
            ..TrainConfig::from(a.data)
        }
    }
}

// ─── summarize ────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Article text
    #[arg(long, conflicts_with = "file")]
    pub text: Option<String>,

    /// Read the article from this file
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Load this exported state instead of the best checkpoint
    #[arg(long)]
    pub state_path: Option<PathBuf>,

    /// Fallback for the tokenizer and model config
    #[arg(long, default_value = "t5-base")]
    pub model_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = DeviceArg::Gpu)]
    pub device: DeviceArg,

    #[arg(long, default_value_t = 2)]
    pub num_beams: usize,

    /// Longest summary in tokens, start token included
    #[arg(long, default_value_t = 150)]
    pub max_length: usize,

    #[arg(long, default_value_t = 2.5)]
    pub repetition_penalty: f32,

    #[arg(long, default_value_t = 1.0)]
    pub length_penalty: f32,

    /// Stop once num_beams hypotheses are finished
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub early_stopping: bool,
}

impl SummarizeArgs {
    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig::new()
            .with_num_beams(self.num_beams)
            .with_max_length(self.max_length)
            .with_repetition_penalty(self.repetition_penalty)
            .with_length_penalty(self.length_penalty)
            .with_early_stopping(self.early_stopping)
    }
}

// ─── evaluate ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Defaults to the device the run was trained on
    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,
}

// ─── stats ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct StatsArgs {
    #[command(flatten)]
    pub data: DataArgs,
}
