use candle_nn::VarMap;
use std::fs;
use std::path::{Path, PathBuf};

pub fn path(dir: &Path, desc: &str, fold: usize) -> PathBuf {
    dir.join(format!("{}_fold{}_best.safetensors", desc, fold))
}

pub fn save(varmap: &VarMap, path: &Path) -> swin::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    varmap.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{linear, VarBuilder};

    #[test]
    fn test_save_creates_missing_directories() -> swin::Result<()> {
        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        linear(2, 2, vs.pp("head"))?;

        let dir = tempfile::tempdir()?;
        let target = path(&dir.path().join("weights"), "RESwin", 2);
        save(&varmap, &target)?;

        assert!(target.exists());
        assert_eq!(
            target.file_name().and_then(|n| n.to_str()),
            Some("RESwin_fold2_best.safetensors")
        );

        let mut restored = VarMap::new();
        let vs = VarBuilder::from_varmap(&restored, DType::F32, &Device::Cpu);
        linear(2, 2, vs.pp("head"))?;
        restored.load(&target)?;

        Ok(())
    }
}
