//! Pretrained weight loading and trainable/frozen parameter selection.
//!
//! Pretrained checkpoints come from a different task, so their classification
//! head never matches ours. [`without_head`] drops it before the remaining
//! tensors are copied into the freshly built network, leaving the head at
//! its random initialisation.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor, Var};
use candle_nn::VarMap;

use crate::network::HEAD;
use crate::{Error, Result};

/// What a non-strict load actually touched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Model parameters the checkpoint had no tensor for.
    pub missing: Vec<String>,
    /// Checkpoint tensors with no matching model parameter.
    pub unexpected: Vec<String>,
}

/// Returns the mapping without any entry belonging to the classification head.
pub fn without_head(weights: HashMap<String, Tensor>) -> HashMap<String, Tensor> {
    weights
        .into_iter()
        .filter(|(name, _)| !name.contains(HEAD))
        .collect()
}

/// Loads a safetensors checkpoint into `varmap`, skipping the head.
pub fn load_pretrained(varmap: &VarMap, path: &Path, device: &Device) -> Result<LoadReport> {
    if !path.exists() {
        return Err(Error::WeightsNotFound(path.to_path_buf()));
    }

    let weights = without_head(candle_core::safetensors::load(path, device)?);
    let report = merge(varmap, &weights)?;

    log::info!(
        "Loaded {} pretrained tensors from {}",
        report.loaded,
        path.display()
    );
    if !report.missing.is_empty() {
        log::debug!("Missing keys: {:?}", report.missing);
    }
    if !report.unexpected.is_empty() {
        log::debug!("Unexpected keys: {:?}", report.unexpected);
    }

    Ok(report)
}

/// Copies every tensor whose name matches a model parameter into it.
/// Names present on only one side are reported, a shape mismatch is an error.
pub fn merge(varmap: &VarMap, weights: &HashMap<String, Tensor>) -> Result<LoadReport> {
    let vars = varmap.data().lock().map_err(|_| Error::LockPoisoned)?;

    let mut report = LoadReport::default();

    for (name, var) in vars.iter() {
        match weights.get(name) {
            Some(tensor) => {
                let tensor = tensor.to_dtype(var.dtype())?.to_device(var.device())?;
                var.set(&tensor)?;
                report.loaded += 1;
            }
            None => report.missing.push(name.clone()),
        }
    }

    report.unexpected = weights
        .keys()
        .filter(|name| !vars.contains_key(*name))
        .cloned()
        .collect();

    report.missing.sort();
    report.unexpected.sort();

    Ok(report)
}

/// The network's parameters split once into the ones the optimizer updates
/// and the ones it leaves alone.
pub struct ParameterPartition {
    trainable: Vec<(String, Var)>,
    frozen: Vec<String>,
}

impl ParameterPartition {
    /// With `freeze_backbone` only the head stays trainable.
    pub fn new(varmap: &VarMap, freeze_backbone: bool) -> Result<Self> {
        let vars = varmap.data().lock().map_err(|_| Error::LockPoisoned)?;

        let mut trainable = Vec::new();
        let mut frozen = Vec::new();

        for (name, var) in vars.iter() {
            if !freeze_backbone || name.contains(HEAD) {
                trainable.push((name.clone(), var.clone()));
            } else {
                frozen.push(name.clone());
            }
        }

        trainable.sort_by(|a, b| a.0.cmp(&b.0));
        frozen.sort();

        Ok(Self { trainable, frozen })
    }

    pub fn trainable_vars(&self) -> Vec<Var> {
        self.trainable.iter().map(|(_, var)| var.clone()).collect()
    }

    pub fn trainable_names(&self) -> impl Iterator<Item = &str> {
        self.trainable.iter().map(|(name, _)| name.as_str())
    }

    pub fn frozen_names(&self) -> &[String] {
        &self.frozen
    }
}
