use std::f64::consts::PI;

pub trait LrSchedule {
    /// Learning rate for the current step.
    fn learning_rate(&self) -> f64;

    /// Advances the schedule by one epoch.
    fn step(&mut self);
}

/// Cosine annealing from `base_lr` down to `min_lr` over `t_max` steps,
/// after which the rate stays at `min_lr`.
#[derive(Debug, Clone)]
pub struct CosineAnnealing {
    base_lr: f64,
    min_lr: f64,
    t_max: usize,
    t: usize,
}

impl CosineAnnealing {
    pub fn new(base_lr: f64, t_max: usize) -> Self {
        Self {
            base_lr,
            min_lr: 0.0,
            t_max,
            t: 0,
        }
    }

    pub fn with_min_lr(mut self, min_lr: f64) -> Self {
        self.min_lr = min_lr;
        self
    }
}

impl LrSchedule for CosineAnnealing {
    fn learning_rate(&self) -> f64 {
        if self.t_max == 0 {
            return self.base_lr;
        }
        let progress = self.t as f64 / self.t_max as f64;
        self.min_lr + (self.base_lr - self.min_lr) * (1.0 + (PI * progress).cos()) / 2.0
    }

    fn step(&mut self) {
        self.t = (self.t + 1).min(self.t_max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_starts_at_base_rate() {
        let schedule = CosineAnnealing::new(8e-5, 150);
        assert!((schedule.learning_rate() - 8e-5).abs() < EPSILON);
    }

    #[test]
    fn test_halfway_is_midpoint() {
        let mut schedule = CosineAnnealing::new(1.0, 10).with_min_lr(0.2);
        for _ in 0..5 {
            schedule.step();
        }
        assert!((schedule.learning_rate() - 0.6).abs() < EPSILON);
    }

    #[test]
    fn test_monotonically_decreasing_until_t_max() {
        let mut schedule = CosineAnnealing::new(8e-5, 150);
        let mut previous = schedule.learning_rate();

        for _ in 0..150 {
            schedule.step();
            let lr = schedule.learning_rate();
            assert!(lr < previous);
            previous = lr;
        }
        assert!(previous.abs() < EPSILON);
    }

    #[test]
    fn test_stays_at_minimum_after_t_max() {
        let mut schedule = CosineAnnealing::new(1.0, 4).with_min_lr(0.1);
        for _ in 0..20 {
            schedule.step();
        }
        assert!((schedule.learning_rate() - 0.1).abs() < EPSILON);
    }
}
