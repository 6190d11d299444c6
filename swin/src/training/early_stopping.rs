/// What the training loop should do after an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    Continue,
    /// The epoch produced the best model so far.
    SaveCheckpoint,
    /// Patience ran out. Terminal for the run.
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricHistory {
    best_score: f64,
    best_epoch: Option<usize>,
    epochs_without_improvement: u64,
}

impl Default for MetricHistory {
    fn default() -> Self {
        Self {
            best_score: f64::NEG_INFINITY,
            best_epoch: None,
            epochs_without_improvement: 0,
        }
    }
}

impl MetricHistory {
    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn epochs_without_improvement(&self) -> u64 {
        self.epochs_without_improvement
    }

    // Returns if the score beat the best one by more than min_delta.
    // Non-finite scores never do, so best_score only ever holds a real value.
    fn update(&mut self, epoch: usize, score: f64, min_delta: f64) -> bool {
        if score.is_finite() && score > self.best_score + min_delta {
            self.best_score = score;
            self.best_epoch = Some(epoch);
            self.epochs_without_improvement = 0;
            true
        } else {
            self.epochs_without_improvement += 1;
            false
        }
    }
}

/// Stops training once the validation score (higher is better) has not
/// improved for `patience` consecutive epochs.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    history: MetricHistory,
    patience: u64,
    min_delta: f64,
    verbose: bool,
}

impl EarlyStopping {
    pub fn new(patience: u64) -> Self {
        Self {
            history: MetricHistory::default(),
            patience,
            min_delta: 0.0,
            verbose: false,
        }
    }

    pub fn with_min_delta(mut self, min_delta: f64) -> Self {
        self.min_delta = min_delta;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn history(&self) -> &MetricHistory {
        &self.history
    }

    pub fn patience(&self) -> u64 {
        self.patience
    }

    pub fn evaluate(&mut self, epoch: usize, score: f64) -> StopDecision {
        let previous = self.history.best_score;

        if self.history.update(epoch, score, self.min_delta) {
            if self.verbose {
                log::info!(
                    "Validation accuracy increased ({:.6} --> {:.6}). Saving model ...",
                    previous,
                    score
                );
            }
            return StopDecision::SaveCheckpoint;
        }

        if self.verbose {
            log::info!(
                "EarlyStopping counter: {} out of {}",
                self.history.epochs_without_improvement,
                self.patience
            );
        }

        if self.should_stop() {
            StopDecision::Stop
        } else {
            StopDecision::Continue
        }
    }

    pub fn should_stop(&self) -> bool {
        self.history.epochs_without_improvement >= self.patience
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decisions(stopper: &mut EarlyStopping, scores: &[f64]) -> Vec<StopDecision> {
        scores
            .iter()
            .enumerate()
            .map(|(epoch, &score)| stopper.evaluate(epoch, score))
            .collect()
    }

    #[test]
    fn test_strictly_increasing_scores_always_save() {
        let mut stopper = EarlyStopping::new(2);
        let scores: Vec<f64> = (0..50).map(|i| 0.1 + i as f64 * 0.01).collect();

        let result = decisions(&mut stopper, &scores);

        assert!(result.iter().all(|&d| d == StopDecision::SaveCheckpoint));
        assert_eq!(stopper.history().best_epoch(), Some(49));
        assert_eq!(stopper.history().epochs_without_improvement(), 0);
    }

    #[test]
    fn test_stops_exactly_when_patience_is_reached() {
        let mut stopper = EarlyStopping::new(15);
        let scores = vec![0.70; 16];

        let result = decisions(&mut stopper, &scores);

        assert_eq!(result[0], StopDecision::SaveCheckpoint);
        for (epoch, decision) in result.iter().enumerate().take(15).skip(1) {
            assert_eq!(*decision, StopDecision::Continue, "epoch {}", epoch);
        }
        assert_eq!(result[15], StopDecision::Stop);
        assert!(stopper.should_stop());
    }

    #[test]
    fn test_equal_score_is_not_an_improvement() {
        let mut stopper = EarlyStopping::new(3);

        let result = decisions(&mut stopper, &[0.5, 0.6, 0.55, 0.6]);

        assert_eq!(
            result,
            vec![
                StopDecision::SaveCheckpoint,
                StopDecision::SaveCheckpoint,
                StopDecision::Continue,
                StopDecision::Continue,
            ]
        );
        assert_eq!(stopper.history().best_score(), 0.6);
        assert_eq!(stopper.history().best_epoch(), Some(1));
        assert_eq!(stopper.history().epochs_without_improvement(), 2);
    }

    #[test]
    fn test_repeated_maximum_leaves_best_untouched() {
        let mut stopper = EarlyStopping::new(100);
        stopper.evaluate(0, 0.4);
        stopper.evaluate(1, 0.9);

        for epoch in 2..10 {
            assert_eq!(stopper.evaluate(epoch, 0.9), StopDecision::Continue);
            assert_eq!(stopper.history().best_score(), 0.9);
            assert_eq!(stopper.history().best_epoch(), Some(1));
        }
    }

    #[test]
    fn test_nan_never_improves() {
        let mut stopper = EarlyStopping::new(3);

        assert_eq!(stopper.evaluate(0, f64::NAN), StopDecision::Continue);
        assert_eq!(stopper.history().best_score(), f64::NEG_INFINITY);
        assert_eq!(stopper.history().best_epoch(), None);
        assert_eq!(stopper.history().epochs_without_improvement(), 1);

        assert_eq!(stopper.evaluate(1, 0.3), StopDecision::SaveCheckpoint);
        assert_eq!(stopper.evaluate(2, f64::NAN), StopDecision::Continue);
        assert_eq!(stopper.evaluate(3, f64::INFINITY), StopDecision::Continue);
        assert_eq!(stopper.evaluate(4, f64::NAN), StopDecision::Stop);
        assert_eq!(stopper.history().best_score(), 0.3);
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut stopper = EarlyStopping::new(3);

        let result = decisions(&mut stopper, &[0.5, 0.4, 0.4, 0.6, 0.5, 0.5, 0.5]);

        assert_eq!(result[3], StopDecision::SaveCheckpoint);
        assert_eq!(result[5], StopDecision::Continue);
        assert_eq!(result[6], StopDecision::Stop);
    }

    #[test]
    fn test_min_delta_requires_margin() {
        let mut stopper = EarlyStopping::new(5).with_min_delta(0.05);

        assert_eq!(stopper.evaluate(0, 0.50), StopDecision::SaveCheckpoint);
        assert_eq!(stopper.evaluate(1, 0.52), StopDecision::Continue);
        assert_eq!(stopper.evaluate(2, 0.60), StopDecision::SaveCheckpoint);
        assert_eq!(stopper.history().best_score(), 0.60);
    }
}
