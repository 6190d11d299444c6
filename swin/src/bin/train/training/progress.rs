use indicatif::{ProgressBar, ProgressStyle};
use swin::training::EpochStats;

const TEMPLATE: &str =
    "{prefix} {spinner:.cyan} {pos}/{len} [{wide_bar:.cyan/blue}] {eta_precise} | {msg}";

pub struct TrainingProgressBar {
    bar: ProgressBar,
}

impl TrainingProgressBar {
    pub fn new(num_batches: usize, prefix: String) -> Self {
        let bar = ProgressBar::new(num_batches as u64);
        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_prefix(prefix);
        Self { bar }
    }

    pub fn update(&self, stats: EpochStats) {
        self.bar.set_message(format!(
            "loss: {:.4}, acc: {:.4}",
            stats.loss, stats.accuracy
        ));
        self.bar.inc(1);
    }

    pub fn finish(&self, stats: EpochStats) {
        self.bar.set_message(format!(
            "loss: {:.4}, acc: {:.4}",
            stats.loss, stats.accuracy
        ));
        self.bar.finish();
    }
}
