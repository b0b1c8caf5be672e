//! 程序运行函数.

use ndarray::{Array3, ArrayView3, Axis};
use seg_berry::config::PipelineConfig;
use seg_berry::dataset::TrialDir;
use seg_berry::persist::read_class_maps;
use seg_berry::reconstruct::{predict_all, BatchReport, SlicePredictor};
use seg_berry::{SegError, SegResult, Slice};
use std::fs;
use std::path::Path;

/// 以预先算好的类别下标 `(切片数, 高, 宽)` 充当预测器.
#[derive(Debug)]
pub struct NpyPredictor {
    maps: Array3<i64>,
}

impl NpyPredictor {
    /// 读取 `dir/<trial>.npy`.
    pub fn open(dir: &Path, trial: &TrialDir) -> SegResult<Self> {
        let path = dir.join(format!("{}.npy", trial.name));
        let maps = read_class_maps(&path)?;
        log::debug!("{}: class maps {:?}", trial.name, maps.dim());
        Ok(Self { maps })
    }
}

impl SlicePredictor for NpyPredictor {
    fn predict(&mut self, index: usize, _input: ArrayView3<'_, f32>) -> SegResult<Slice<i64>> {
        let len = self.maps.len_of(Axis(0));
        if index >= len {
            return Err(SegError::ShapeMismatch {
                expected: vec![index + 1],
                got: vec![len],
            });
        }
        Ok(Slice::from(self.maps.index_axis(Axis(0), index)))
    }
}

/// 实际运行.
pub fn run(cfg: &PipelineConfig, class_maps: &Path) -> SegResult<BatchReport> {
    fs::create_dir_all(&cfg.save_dir)?;
    predict_all(
        &cfg.predict_dir,
        &cfg.save_dir,
        cfg.nii_dir.as_deref(),
        &cfg.vocab,
        &cfg.batch,
        |trial| NpyPredictor::open(class_maps, trial),
    )
}
