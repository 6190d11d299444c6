use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use swin::training::MetricSink;

pub const FILE_NAME: &str = "scalars.csv";

/// Per-epoch scalar time series of one fold as `epoch,tag,value` rows.
pub struct ScalarWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl ScalarWriter {
    pub fn create(dir: &Path) -> swin::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(FILE_NAME);

        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "epoch,tag,value")?;

        Ok(Self { writer, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricSink for ScalarWriter {
    fn record(&mut self, tag: &str, value: f64, epoch: usize) -> swin::Result<()> {
        writeln!(self.writer, "{},{},{}", epoch, tag, value)?;
        Ok(())
    }

    fn close(&mut self) -> swin::Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
