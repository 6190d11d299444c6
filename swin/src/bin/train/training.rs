mod evaluation;
mod progress;
mod trainer;

pub use trainer::Trainer;
