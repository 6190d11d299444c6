use std::fmt;
use std::fs;
use std::path::Path;
use swin::training::FoldOutcome;

/// Best validation accuracy of every finished fold.
pub struct CrossValidationSummary {
    desc: String,
    outcomes: Vec<FoldOutcome>,
}

impl CrossValidationSummary {
    pub fn new(desc: &str) -> Self {
        Self {
            desc: desc.to_string(),
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: FoldOutcome) {
        self.outcomes.push(outcome);
    }

    /// Best scores of the folds that improved at least once.
    fn best_scores(&self) -> Vec<f64> {
        self.outcomes
            .iter()
            .filter(|o| o.best_epoch.is_some())
            .map(|o| o.best_score)
            .collect()
    }

    pub fn mean_best_score(&self) -> Option<f64> {
        let scores = self.best_scores();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    /// Population standard deviation of the best scores.
    pub fn std_best_score(&self) -> Option<f64> {
        let scores = self.best_scores();
        let mean = self.mean_best_score()?;
        let variance =
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        Some(variance.sqrt())
    }

    pub fn write(&self, path: &Path) -> swin::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_string())?;
        log::info!("Cross-validation summary written to {}", path.display());
        Ok(())
    }
}

impl fmt::Display for CrossValidationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cross-validation Summary: {}", self.desc)?;
        writeln!(f, "==================")?;
        writeln!(f, "Folds: {}", self.outcomes.len())?;
        writeln!(f)?;

        for outcome in &self.outcomes {
            let ending = outcome.termination.reason();
            match outcome.best_epoch {
                Some(epoch) => writeln!(
                    f,
                    "Fold {}: best val acc {:.4} at epoch {} ({} epochs, {})",
                    outcome.fold, outcome.best_score, epoch, outcome.epochs_run, ending
                )?,
                None => writeln!(
                    f,
                    "Fold {}: no improvement ({} epochs, {})",
                    outcome.fold, outcome.epochs_run, ending
                )?,
            }
        }

        if let (Some(mean), Some(std)) = (self.mean_best_score(), self.std_best_score()) {
            writeln!(f)?;
            writeln!(f, "Mean best val acc: {:.4} ± {:.4}", mean, std)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swin::training::Termination;

    fn outcome(fold: usize, best_score: f64, best_epoch: Option<usize>) -> FoldOutcome {
        FoldOutcome {
            fold,
            termination: Termination::Stagnation,
            epochs_run: 20,
            best_score,
            best_epoch,
        }
    }

    #[test]
    fn test_empty_summary_has_no_mean() {
        let summary = CrossValidationSummary::new("RESwin");
        assert_eq!(summary.mean_best_score(), None);
        assert_eq!(summary.std_best_score(), None);
    }

    #[test]
    fn test_mean_and_std_skip_folds_without_improvement() {
        let mut summary = CrossValidationSummary::new("RESwin");
        summary.record(outcome(1, 0.8, Some(4)));
        summary.record(outcome(2, 0.6, Some(9)));
        summary.record(outcome(3, f64::NEG_INFINITY, None));

        assert!((summary.mean_best_score().unwrap() - 0.7).abs() < 1e-12);
        assert!((summary.std_best_score().unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_write_lists_every_fold() -> swin::Result<()> {
        let mut summary = CrossValidationSummary::new("RESwin");
        summary.record(outcome(1, 0.8125, Some(4)));
        summary.record(outcome(2, f64::NEG_INFINITY, None));

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("logs").join("RESwin_cv_summary.txt");
        summary.write(&path)?;

        let contents = fs::read_to_string(&path)?;
        assert!(contents.contains("Folds: 2"));
        assert!(contents.contains("Fold 1: best val acc 0.8125 at epoch 4"));
        assert!(contents.contains("Fold 2: no improvement (20 epochs, stagnation)"));
        assert!(contents.contains("Mean best val acc: 0.8125"));

        Ok(())
    }
}
