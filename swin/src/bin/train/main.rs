mod args;
mod checkpoint;
mod config;
mod dataset;
mod scalars;
mod summary;
mod training;
mod utils;

use args::Args;
use clap::Parser;
use config::FoldConfig;
use dataset::Dataset;
use log::LevelFilter;
use scalars::ScalarWriter;
use simplelog::{Config, SimpleLogger};
use std::error::Error;
use std::path::Path;
use summary::CrossValidationSummary;
use swin::training::{CosineAnnealing, EarlyStopping, FoldOutcome, TrainingLoop};
use training::Trainer;

fn main() -> Result<(), Box<dyn Error>> {
    let args = init()?;

    let mut summary = CrossValidationSummary::new(&args.desc);

    for fold in 1..=args.folds {
        log::info!("========== Fold {}/{} ==========", fold, args.folds);
        let config = FoldConfig::new(&args, fold);
        let outcome = run_fold(&config)?;
        summary.record(outcome);
    }

    log::info!("\n{}", summary);
    let path = Path::new(&args.log_dir).join(format!("{}_cv_summary.txt", args.desc));
    summary.write(&path)?;

    log::info!("Done!");
    Ok(())
}

fn run_fold(config: &FoldConfig) -> swin::Result<FoldOutcome> {
    let dataset = Dataset::load(config)?;
    let mut trainer = Trainer::new(config, dataset)?;

    let mut schedule = CosineAnnealing::new(config.learning_rate, config.schedule_length());
    let mut scalars = ScalarWriter::create(&config.log_dir)?;
    log::info!("Logging scalars to {}", scalars.path().display());

    let early_stopping = EarlyStopping::new(config.patience)
        .with_min_delta(config.min_delta)
        .verbose(config.verbose);

    TrainingLoop::new(config.fold, config.epochs, early_stopping).run(
        &mut trainer,
        &mut schedule,
        &mut scalars,
    )
}

fn init() -> Result<Args, Box<dyn Error>> {
    let args = Args::parse();

    let level = if args.verbose_log {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::init(level, Config::default())?;

    Ok(args)
}
