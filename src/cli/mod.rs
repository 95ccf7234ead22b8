// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// `clap`, hands each command to its Layer 2 use case, and is
// the only layer that prints.
//
//   train     → TrainUseCase
//   summarize → SummarizeUseCase
//   evaluate  → EvaluateUseCase
//   stats     → StatsUseCase

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, StatsArgs, SummarizeArgs, TrainArgs};

use crate::application::stats_use_case::TokenStats;

#[derive(Parser, Debug)]
#[command(
    name = "news-summarizer",
    version = "0.1.0",
    about = "Fine-tune T5 on news articles, then summarize new ones."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand; no computation happens here.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)     => run_train(args),
            Commands::Summarize(args) => run_summarize(args),
            Commands::Evaluate(args)  => run_evaluate(args),
            Commands::Stats(args)     => run_stats(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}'", args.data.csv_path);
    let report = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete. Best checkpoint: epoch {} (validation_loss={:.4})",
        report.best.epoch, report.best.validation_loss
    );
    if let Some((text, reference, generated)) = report.sample {
        println!("\nArticle:   {}", text);
        println!("Reference: {}", reference);
        println!("Generated: {}", generated);
    }
    Ok(())
}

fn run_summarize(args: SummarizeArgs) -> Result<()> {
    use crate::application::summarize_use_case::{read_input, SummarizeRequest, SummarizeUseCase};

    let generation = args.generation();
    let text = read_input(args.text, args.file.as_deref())?;
    let use_case = SummarizeUseCase::new(SummarizeRequest {
        checkpoint_dir: args.checkpoint_dir,
        state_path:     args.state_path,
        model_dir:      args.model_dir,
        device:         args.device.into(),
        generation,
    });

    let summary = use_case.summarize(&text)?;
    println!("\nSummary: {}", summary);
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let report = EvaluateUseCase::new(args.checkpoint_dir, args.device.map(Into::into)).execute()?;
    match report.epoch {
        Some(epoch) => println!("Checkpoint from epoch {}", epoch),
        None        => println!("Checkpoint epoch unknown"),
    }
    println!("test_loss={:.4} over {} examples", report.test_loss, report.test_examples);
    Ok(())
}

fn run_stats(args: StatsArgs) -> Result<()> {
    use crate::application::stats_use_case::StatsUseCase;

    let report = StatsUseCase::new(args.data.into()).execute()?;
    print_stats("Article tokens", report.text.as_ref());
    print_stats("Summary tokens", report.summary.as_ref());
    Ok(())
}

fn print_stats(label: &str, stats: Option<&TokenStats>) {
    let Some(s) = stats else {
        println!("{label}: no examples");
        return;
    };
    println!(
        "{label}: n={} min={} median={} mean={:.1} p95={} max={} | {} over limit {}",
        s.count, s.min, s.median, s.mean, s.p95, s.max, s.over_limit, s.limit
    );
}
