use crate::Result;

use super::{EarlyStopping, Learner, LrSchedule, MetricSink, StopDecision};

/// Scalars recorded every epoch, in recording order.
pub const SCALAR_TAGS: [&str; 5] = [
    "train_loss",
    "train_acc",
    "val_loss",
    "val_acc",
    "learning_rate",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(Termination),
    Completed(Termination),
}

impl LoopState {
    /// `None` while the loop is still running.
    pub fn termination(&self) -> Option<Termination> {
        match self {
            Self::Running => None,
            Self::Stopped(reason) | Self::Completed(reason) => Some(*reason),
        }
    }
}

/// Why a fold's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Early stopping fired: validation accuracy stagnated.
    Stagnation,
    EpochBudgetExhausted,
}

impl Termination {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Stagnation => "stagnation",
            Self::EpochBudgetExhausted => "epoch budget exhausted",
        }
    }
}

/// How a fold's run ended and the best validation accuracy it reached.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldOutcome {
    pub fold: usize,
    pub termination: Termination,
    pub epochs_run: usize,
    pub best_score: f64,
    pub best_epoch: Option<usize>,
}

/// Runs the epochs of a single fold.
pub struct TrainingLoop {
    fold: usize,
    epochs: usize,
    epoch: usize,
    state: LoopState,
    early_stopping: EarlyStopping,
}

impl TrainingLoop {
    pub fn new(fold: usize, epochs: usize, early_stopping: EarlyStopping) -> Self {
        Self {
            fold,
            epochs,
            epoch: 0,
            state: LoopState::Running,
            early_stopping,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn run<L, S, M>(
        &mut self,
        learner: &mut L,
        schedule: &mut S,
        sink: &mut M,
    ) -> Result<FoldOutcome>
    where
        L: Learner,
        S: LrSchedule,
        M: MetricSink,
    {
        if self.epochs == 0 {
            self.state = LoopState::Completed(Termination::EpochBudgetExhausted);
        }

        let termination = loop {
            if let Some(termination) = self.state.termination() {
                break termination;
            }
            self.state = self.run_epoch(learner, schedule, sink)?;
        };

        sink.close()?;

        log::info!(
            "Fold {}: {:?} after {} epochs ({})",
            self.fold,
            self.state,
            self.epoch,
            termination.reason()
        );

        Ok(self.outcome(termination))
    }

    fn run_epoch<L, S, M>(
        &mut self,
        learner: &mut L,
        schedule: &mut S,
        sink: &mut M,
    ) -> Result<LoopState>
    where
        L: Learner,
        S: LrSchedule,
        M: MetricSink,
    {
        let epoch = self.epoch;

        let train = learner.train_epoch(epoch)?;
        let val = learner.evaluate(epoch)?;
        let learning_rate = learner.learning_rate();

        let decision = self.early_stopping.evaluate(epoch, val.accuracy as f64);
        if decision == StopDecision::SaveCheckpoint {
            learner.save_checkpoint(epoch)?;
        }

        self.epoch += 1;

        // The stopping epoch ends the fold without logging its scalars
        if decision == StopDecision::Stop {
            return Ok(LoopState::Stopped(Termination::Stagnation));
        }

        log::info!(
            "[fold {} epoch {}] train loss: {:.4}, acc: {:.4} | val loss: {:.4}, acc: {:.4} | lr: {:.3e}",
            self.fold,
            epoch,
            train.loss,
            train.accuracy,
            val.loss,
            val.accuracy,
            learning_rate
        );

        let values = [
            train.loss as f64,
            train.accuracy as f64,
            val.loss as f64,
            val.accuracy as f64,
            learning_rate,
        ];
        for (tag, value) in SCALAR_TAGS.iter().zip(values) {
            sink.record(tag, value, epoch)?;
        }

        if self.epoch >= self.epochs {
            return Ok(LoopState::Completed(Termination::EpochBudgetExhausted));
        }

        schedule.step();
        learner.set_learning_rate(schedule.learning_rate());

        Ok(LoopState::Running)
    }

    fn outcome(&self, termination: Termination) -> FoldOutcome {
        let history = self.early_stopping.history();
        FoldOutcome {
            fold: self.fold,
            termination,
            epochs_run: self.epoch,
            best_score: history.best_score(),
            best_epoch: history.best_epoch(),
        }
    }
}
