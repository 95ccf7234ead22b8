// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to CSV files, one directory per run:
//
//   logs/news_summary/
//     version_0/   ← first run
//     version_1/   ← second run
//       steps.csv    step,epoch,train_loss
//       epochs.csv   epoch,train_loss,validation_loss
//
// A new logger always takes the next free version number, so
// earlier runs are never overwritten.
//
// Example epochs.csv:
//   epoch,train_loss,validation_loss
//   1,2.104512,1.873300
//   2,1.652207,1.790144

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const STEPS_FILE:  &str = "steps.csv";
const EPOCHS_FILE: &str = "epochs.csv";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Mean loss over the epoch's training batches
    pub train_loss: f64,

    /// Mean loss over the validation batches; the monitored value
    pub validation_loss: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, validation_loss: f64) -> Self {
        Self { epoch, train_loss, validation_loss }
    }

    /// Returns true if this epoch improved over the previous best validation_loss
    pub fn is_improvement(&self, best_validation_loss: f64) -> bool {
        self.validation_loss < best_validation_loss
    }
}

/// One logged optimiser step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMetrics {
    pub step:       usize,
    pub epoch:      usize,
    pub train_loss: f64,
}

pub struct MetricsLogger {
    run_dir: PathBuf,
}

impl MetricsLogger {
    /// Create `<root>/<name>/version_N` with the next free N and write
    /// both CSV headers.
    pub fn new(root: impl AsRef<Path>, name: &str) -> Result<Self> {
        let base = root.as_ref().join(name);
        fs::create_dir_all(&base)
            .with_context(|| format!("Cannot create log directory '{}'", base.display()))?;

        let version = next_version(&base)?;
        let run_dir = base.join(format!("version_{version}"));
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("Cannot create '{}'", run_dir.display()))?;

        let mut f = fs::File::create(run_dir.join(STEPS_FILE))?;
        writeln!(f, "step,epoch,train_loss")?;
        let mut f = fs::File::create(run_dir.join(EPOCHS_FILE))?;
        writeln!(f, "epoch,train_loss,validation_loss")?;

        tracing::info!("Logging metrics to '{}'", run_dir.display());
        Ok(Self { run_dir })
    }

    pub fn log_step(&self, m: &StepMetrics) -> Result<()> {
        let mut f = self.append(STEPS_FILE)?;
        writeln!(f, "{},{},{:.6}", m.step, m.epoch, m.train_loss)?;
        Ok(())
    }

    pub fn log_epoch(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = self.append(EPOCHS_FILE)?;
        writeln!(f, "{},{:.6},{:.6}", m.epoch, m.train_loss, m.validation_loss)?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, validation_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.validation_loss,
        );
        Ok(())
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    fn append(&self, file: &str) -> Result<fs::File> {
        let path = self.run_dir.join(file);
        OpenOptions::new()
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open '{}'", path.display()))
    }
}

/// One past the highest existing `version_N` under `base`
fn next_version(base: &Path) -> Result<usize> {
    let mut next = 0;
    for entry in fs::read_dir(base)? {
        let name = entry?.file_name();
        if let Some(n) = name
            .to_str()
            .and_then(|s| s.strip_prefix("version_"))
            .and_then(|s| s.parse::<usize>().ok())
        {
            next = next.max(n + 1);
        }
    }
    Ok(next)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 2.5, 2.3);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
        // equal loss is not an improvement
        assert!(!m.is_improvement(2.3));
    }

    #[test]
    fn test_runs_get_increasing_versions() {
        let dir = tempfile::tempdir().unwrap();
        let a   = MetricsLogger::new(dir.path(), "news_summary").unwrap();
        let b   = MetricsLogger::new(dir.path(), "news_summary").unwrap();

        assert!(a.run_dir().ends_with("news_summary/version_0"));
        assert!(b.run_dir().ends_with("news_summary/version_1"));
    }

    #[test]
    fn test_rows_are_appended_after_header() {
        let dir    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path(), "run").unwrap();

        logger.log_step(&StepMetrics { step: 1, epoch: 1, train_loss: 3.25 }).unwrap();
        logger.log_epoch(&EpochMetrics::new(1, 3.0, 2.5)).unwrap();

        let steps  = fs::read_to_string(logger.run_dir().join(STEPS_FILE)).unwrap();
        let epochs = fs::read_to_string(logger.run_dir().join(EPOCHS_FILE)).unwrap();
        assert_eq!(steps, "step,epoch,train_loss\n1,1,3.250000\n");
        assert_eq!(epochs, "epoch,train_loss,validation_loss\n1,3.000000,2.500000\n");
    }
}
