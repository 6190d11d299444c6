mod loader;
pub mod transforms;

pub use loader::{Batch, DataLoader};
pub use transforms::Transform;

use ahash::AHashMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use swin::{Error, Result};

use crate::config::FoldConfig;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Debug, Clone)]
pub struct ImageSample {
    pub path: PathBuf,
    pub label: u32,
}

/// Images stored as `<root>/<class name>/<image>`. Labels follow the sorted
/// class names.
#[derive(Debug)]
pub struct ImageFolder {
    root: PathBuf,
    classes: Vec<String>,
    samples: Vec<ImageSample>,
}

impl ImageFolder {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::Dataset(format!(
                "dataset directory {} does not exist",
                root.display()
            )));
        }

        let mut classes: Vec<String> = fs::read_dir(root)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        classes.sort();

        let per_class = classes
            .par_iter()
            .enumerate()
            .map(|(label, class)| list_images(&root.join(class), label as u32))
            .collect::<Result<Vec<_>>>()?;
        let samples: Vec<ImageSample> = per_class.into_iter().flatten().collect();

        if samples.is_empty() {
            return Err(Error::Dataset(format!(
                "no images found under {}",
                root.display()
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
            classes,
            samples,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn samples(&self) -> &[ImageSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Relabels the samples so class names map to the same labels as in
    /// `reference`. A class unknown to `reference` is an error.
    pub fn align_labels(&mut self, reference: &ImageFolder) -> Result<()> {
        let index: AHashMap<&str, u32> = reference
            .classes
            .iter()
            .enumerate()
            .map(|(label, name)| (name.as_str(), label as u32))
            .collect();

        let mapping = self
            .classes
            .iter()
            .map(|name| {
                index.get(name.as_str()).copied().ok_or_else(|| {
                    Error::Dataset(format!(
                        "class '{}' in {} does not exist in {}",
                        name,
                        self.root.display(),
                        reference.root.display()
                    ))
                })
            })
            .collect::<Result<Vec<u32>>>()?;

        for sample in &mut self.samples {
            sample.label = mapping[sample.label as usize];
        }
        self.classes = reference.classes.clone();

        Ok(())
    }
}

fn list_images(dir: &Path, label: u32) -> Result<Vec<ImageSample>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| ImageSample { path, label })
        .collect())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Train and validation images of one fold.
pub struct Dataset {
    train: ImageFolder,
    val: ImageFolder,
    train_transform: Transform,
    val_transform: Transform,
    seed: u64,
}

impl Dataset {
    pub fn load(config: &FoldConfig) -> Result<Self> {
        log::info!("Loading fold {} data...", config.fold);

        let train = ImageFolder::open(&config.train_dir)?;
        let mut val = ImageFolder::open(&config.val_dir)?;
        val.align_labels(&train)?;

        if train.classes().len() > config.num_classes {
            return Err(Error::Config(format!(
                "{} contains {} classes but the network only has {} outputs",
                train.root().display(),
                train.classes().len(),
                config.num_classes
            )));
        }

        log::info!("Train data: {} ({} images)", train.root().display(), train.len());
        log::info!("Val data: {} ({} images)", val.root().display(), val.len());
        log::debug!("Classes: {:?}", train.classes());

        Ok(Self {
            train,
            val,
            train_transform: Transform::train(config.img_size),
            val_transform: Transform::val(config.img_size),
            seed: config.seed,
        })
    }

    pub fn num_train(&self) -> usize {
        self.train.len()
    }

    pub fn num_val(&self) -> usize {
        self.val.len()
    }

    /// Shuffled training batches. The shuffle and augmentations only depend
    /// on the seed and the epoch.
    pub fn train_loader(&self, batch_size: usize, workers: usize, epoch: usize) -> DataLoader {
        let epoch_seed = self.seed.wrapping_add(epoch as u64);

        let mut samples = self.train.samples().to_vec();
        samples.shuffle(&mut StdRng::seed_from_u64(epoch_seed));

        DataLoader::new(
            &samples,
            self.train_transform,
            batch_size,
            workers,
            epoch_seed,
        )
    }

    pub fn val_loader(&self, batch_size: usize, workers: usize) -> DataLoader {
        DataLoader::new(
            self.val.samples(),
            self.val_transform,
            batch_size,
            workers,
            self.seed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Args;
    use clap::Parser;
    use image::{Rgb, RgbImage};

    fn write_class(root: &Path, class: &str, count: usize) {
        let dir = root.join(class);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..count {
            RgbImage::from_pixel(12, 12, Rgb([10, 20, 30]))
                .save(dir.join(format!("{}.png", i)))
                .unwrap();
        }
        fs::write(dir.join("notes.txt"), "not an image").unwrap();
    }

    #[test]
    fn test_image_folder_labels_sorted_classes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_class(dir.path(), "scab", 2);
        write_class(dir.path(), "healthy", 3);

        let folder = ImageFolder::open(dir.path())?;

        assert_eq!(folder.classes(), &["healthy".to_string(), "scab".to_string()]);
        assert_eq!(folder.len(), 5);
        assert_eq!(folder.samples().iter().filter(|s| s.label == 0).count(), 3);
        assert_eq!(folder.samples().iter().filter(|s| s.label == 1).count(), 2);

        Ok(())
    }

    #[test]
    fn test_missing_directory_is_dataset_error() {
        let result = ImageFolder::open(Path::new("does/not/exist"));
        assert!(matches!(result, Err(Error::Dataset(_))));
    }

    #[test]
    fn test_empty_folder_is_dataset_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("empty_class"))?;

        assert!(matches!(ImageFolder::open(dir.path()), Err(Error::Dataset(_))));

        Ok(())
    }

    #[test]
    fn test_align_labels_follows_reference() -> Result<()> {
        let train_dir = tempfile::tempdir()?;
        write_class(train_dir.path(), "a", 1);
        write_class(train_dir.path(), "b", 1);
        write_class(train_dir.path(), "c", 1);

        // Validation split lacks class "a"
        let val_dir = tempfile::tempdir()?;
        write_class(val_dir.path(), "b", 1);
        write_class(val_dir.path(), "c", 2);

        let train = ImageFolder::open(train_dir.path())?;
        let mut val = ImageFolder::open(val_dir.path())?;
        val.align_labels(&train)?;

        let mut labels: Vec<u32> = val.samples().iter().map(|s| s.label).collect();
        labels.sort();
        assert_eq!(labels, vec![1, 2, 2]);

        let other_dir = tempfile::tempdir()?;
        write_class(other_dir.path(), "z", 1);
        let mut other = ImageFolder::open(other_dir.path())?;
        assert!(other.align_labels(&train).is_err());

        Ok(())
    }

    #[test]
    fn test_dataset_rejects_too_many_classes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for split in ["train", "val"] {
            for class in ["a", "b", "c"] {
                write_class(&dir.path().join(split), class, 1);
            }
        }

        let data_path = dir.path().to_string_lossy().to_string();
        let args = Args::parse_from(["train", "--data-path", &data_path, "--num_classes", "2"]);
        let config = FoldConfig::new(&args, 1);

        assert!(matches!(Dataset::load(&config), Err(Error::Config(_))));

        let args = Args::parse_from(["train", "--data-path", &data_path, "--num_classes", "3"]);
        let dataset = Dataset::load(&FoldConfig::new(&args, 1))?;
        assert_eq!(dataset.num_train(), 3);
        assert_eq!(dataset.num_val(), 3);

        Ok(())
    }

    #[test]
    fn test_train_loader_depends_only_on_seed_and_epoch() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for class in ["a", "b", "c", "d"] {
            write_class(&dir.path().join("train"), class, 4);
            write_class(&dir.path().join("val"), class, 1);
        }

        let data_path = dir.path().to_string_lossy().to_string();
        let args = Args::parse_from([
            "train",
            "--data-path",
            &data_path,
            "--num_classes",
            "4",
            "--img-size",
            "8",
        ]);
        let dataset = Dataset::load(&FoldConfig::new(&args, 1))?;

        let run = |workers: usize, epoch: usize| -> Result<Vec<(Vec<f32>, Vec<u32>)>> {
            dataset
                .train_loader(3, workers, epoch)
                .map(|batch| batch.map(|b| (b.images, b.labels)))
                .collect()
        };

        let first = run(4, 2)?;
        assert_eq!(first.len(), 6);
        assert_eq!(run(4, 2)?, first);
        assert_eq!(run(2, 2)?, first);
        assert_ne!(run(4, 3)?, first);

        Ok(())
    }
}
