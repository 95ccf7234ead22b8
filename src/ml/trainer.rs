// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Fine-tunes the summarizer with AdamW and keeps the single
// best checkpoint by validation loss.
//
//   for epoch in 1..=epochs:
//     train:    shuffled batches → training_step → backward → AdamW
//               every step appended to steps.csv as train_loss
//     validate: model.valid() (no dropout, no autodiff graph)
//               → validation_step over the held-out split
//     checkpoint if validation_loss < best so far
//
// Key Burn insight:
//   - Training runs on B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - so the validation loader must batch on B::InnerBackend too

use anyhow::Result;
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use std::sync::Arc;

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::SummaryBatch, datamodule::NewsSummaryDataModule};
use crate::infra::{
    checkpoint::{BestCheckpoint, CheckpointManager},
    metrics::{EpochMetrics, MetricsLogger, StepMetrics},
};
use crate::ml::model::SummaryModel;

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// None when no epoch ever produced a finite monitored loss
    pub best:  Option<BestCheckpoint>,
    pub steps: usize,
}

pub fn run_training<B: AutodiffBackend>(
    cfg:          &TrainConfig,
    data:         &NewsSummaryDataModule,
    mut model:    SummaryModel<B>,
    ckpt_manager: &CheckpointManager,
    metrics:      &MetricsLogger,
    device:       &B::Device,
) -> Result<TrainOutcome> {

    // ── AdamW optimiser ───────────────────────────────────────────────────────
    let mut optim = AdamWConfig::new()
        .with_beta_1(0.9)
        .with_beta_2(0.999)
        .with_epsilon(1e-6)
        .with_weight_decay(0.0)
        .init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = data.train_dataloader::<B>(device.clone())?;
    let val_loader   = data.val_dataloader::<B::InnerBackend>(device.clone())?;

    tracing::info!(
        "Training on {} examples, validating on {} (batch size {})",
        data.train_len(), data.test_len(), data.batch_size()
    );
    let monitor_train = data.test_len() == 0;
    if monitor_train {
        tracing::warn!("Validation split is empty; monitoring train_loss instead");
    }

    let mut best: Option<BestCheckpoint> = None;
    let mut step = 0usize;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let loss = model.training_step(batch);
            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            train_loss_sum += loss_val;
            train_batches  += 1;
            step           += 1;

            // Backward pass + AdamW update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);

            metrics.log_step(&StepMetrics { step, epoch, train_loss: loss_val })?;
            if cfg.log_every > 0 && step % cfg.log_every == 0 {
                tracing::info!("epoch {} step {} | train_loss={:.4}", epoch, step, loss_val);
            }
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else {
            f64::NAN
        };

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid    = model.valid();
        let avg_val_loss   = mean_loss(val_loader.clone(), |batch| model_valid.validation_step(batch));
        let epoch_metrics  = EpochMetrics::new(epoch, avg_train_loss, avg_val_loss);
        metrics.log_epoch(&epoch_metrics)?;

        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | validation_loss={:.4}",
            epoch, cfg.epochs, avg_train_loss, avg_val_loss,
        );

        // ── Checkpoint on improvement ─────────────────────────────────────────
        let monitored = if monitor_train { avg_train_loss } else { avg_val_loss };
        let best_loss = best.map_or(f64::INFINITY, |b| b.validation_loss);
        let improved  = if monitor_train {
            monitored < best_loss
        } else {
            epoch_metrics.is_improvement(best_loss)
        };

        if improved {
            let meta = BestCheckpoint { epoch, validation_loss: monitored };
            ckpt_manager.save_best(&model, meta)?;
            tracing::info!("Epoch {}: monitored loss improved to {:.4}, checkpoint saved", epoch, monitored);
            best = Some(meta);
        } else {
            tracing::info!("Epoch {}: no improvement over {:.4}", epoch, best_loss);
        }
    }

    tracing::info!("Training complete after {} steps", step);
    Ok(TrainOutcome { best, steps: step })
}

/// Example-weighted mean of `step_fn` over every batch in `loader`.
/// NaN when the loader is empty.
pub fn mean_loss<B: Backend>(
    loader:  Arc<dyn DataLoader<SummaryBatch<B>>>,
    step_fn: impl Fn(SummaryBatch<B>) -> Tensor<B, 1>,
) -> f64 {
    let mut weighted = 0.0f64;
    let mut examples = 0usize;

    for batch in loader.iter() {
        let n = batch.text_input_ids.dims()[0];
        let loss: f64 = step_fn(batch).into_scalar().elem::<f64>();
        weighted += loss * n as f64;
        examples += n;
    }

    if examples > 0 { weighted / examples as f64 } else { f64::NAN }
}
