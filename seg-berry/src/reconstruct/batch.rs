use super::{Reconstructor, SlicePredictor};
use crate::consts::CLINICAL_MARGIN;
use crate::dataset::loader::{
    discover_trials, trial_loader, training_size, TrialDir, TrialFilter,
};
use crate::dataset::prepare::{prepare_trial, PrepareOptions};
use crate::label::ClassVocabulary;
use crate::persist::{prediction_exists, prediction_path, reference_header, save_prediction};
use crate::{SegError, SegResult};
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 批量预测选项.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOptions {
    /// 加载时是否重定向.
    pub reorient: bool,

    /// 是否也预测临床边界以下的切片.
    pub predict_lower: bool,

    /// 临床边界.
    pub margin: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            reorient: true,
            predict_lower: false,
            margin: CLINICAL_MARGIN,
        }
    }
}

/// 批量预测的结果统计.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// 新写出的预测文件.
    pub written: Vec<PathBuf>,

    /// 因预测文件已存在而跳过的 trial.
    pub skipped: Vec<String>,

    /// 处理失败的 trial 及原因.
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    /// 可用 (写出或已存在) 的 trial 个数.
    #[inline]
    pub fn usable(&self) -> usize {
        self.written.len() + self.skipped.len()
    }
}

/// 为 `to_segment_dir` 下的每个 trial 预测并写出 `<trial>_pred_seg.nii` 到 `save_dir`.
///
/// * 若 `save_dir` 中已有该 trial 的预测结果, 跳过该 trial;
/// * 参考 header 取自 `nii_data_dir` 中文件名同时包含 trial 名与 `"volume"` 的文件;
///   `nii_data_dir` 为 `None` 时沿用原始扫描自身的 header;
/// * `make_predictor` 为每个 trial 创建预测器.
///
/// 规范尺寸按 trial 各自计算, 与同批次的其他 trial 无关.
///
/// 单个 trial 失败时记录并继续; 配置错误立即返回. 没有任何可用 trial 时返回
/// [`SegError::EmptyInput`].
pub fn predict_all<P, F>(
    to_segment_dir: &Path,
    save_dir: &Path,
    nii_data_dir: Option<&Path>,
    vocab: &ClassVocabulary,
    opts: &BatchOptions,
    mut make_predictor: F,
) -> SegResult<BatchReport>
where
    P: SlicePredictor,
    F: FnMut(&TrialDir) -> SegResult<P>,
{
    let trials = discover_trials(to_segment_dir, TrialFilter::Original)?;
    let prepare = PrepareOptions {
        reorient: opts.reorient,
        ..PrepareOptions::predicting()
    };
    let reconstructor = Reconstructor::new(vocab.clone())
        .predict_lower(opts.predict_lower)
        .margin(opts.margin);

    let mut report = BatchReport::default();
    let (todo, done): (Vec<_>, Vec<_>) = trials
        .into_iter()
        .partition(|t| !prediction_exists(save_dir, &t.name));
    for t in done {
        log::info!("{}: prediction exists, skipped", t.name);
        report.skipped.push(t.name);
    }

    for (trial, scan) in trial_loader(todo, true) {
        let result = scan.and_then(|scan| {
            let size = training_size([&trial.path])?;
            let header = match nii_data_dir {
                Some(dir) => reference_header(dir, &trial.name)?,
                None => scan.header.clone(),
            };
            let prepared = prepare_trial(scan, (size, size), vocab, &prepare)?;
            let mut predictor = make_predictor(&trial)?;
            let volume =
                reconstructor.reconstruct(&prepared.raw, &prepared.geometry, &mut predictor)?;
            let path = prediction_path(save_dir, &trial.name);
            save_prediction(&path, &volume, &header)?;
            Ok(path)
        });
        match result {
            Ok(path) => {
                log::info!("{}: saved to {}", trial.name, path.display());
                report.written.push(path);
            }
            Err(e) if e.is_trial_local() => {
                log::warn!("{}: failed, {e}", trial.name);
                report.failed.push((trial.name, e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    log::info!(
        "written {}, skipped {}, failed {}",
        report.written.len(),
        report.skipped.len(),
        report.failed.len()
    );
    if report.usable() == 0 {
        return Err(SegError::empty(to_segment_dir, "no trial could be predicted"));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::loader::tests::write_nii_f32;
    use crate::dataset::loader::read_volume;
    use crate::Slice;
    use ndarray::{Array2, Array3, ArrayView3};
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn predictor(
        _: &TrialDir,
    ) -> SegResult<impl FnMut(usize, ArrayView3<'_, f32>) -> SegResult<Slice<i64>>> {
        Ok(|_: usize, input: ArrayView3<'_, f32>| -> SegResult<Slice<i64>> {
            // 原始值大于 0 的像素预测为类别 1 (标签 7).
            let (h, w, _) = input.dim();
            Ok(Slice::new(Array2::from_shape_fn((h, w), |(i, j)| {
                i64::from(input[(i, j, 0)] > 0.0)
            })))
        })
    }

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let root = TempDir::new().unwrap();
        let data = root.path().join("data");
        let save = root.path().join("save");
        fs::create_dir(&data).unwrap();
        fs::create_dir(&save).unwrap();
        for name in ["trial1", "trial2"] {
            let dir = data.join(name);
            fs::create_dir(&dir).unwrap();
            let raw = Array3::from_shape_fn((6, 4, 3), |(a, _, _)| a as f32);
            write_nii_f32(&dir.join(format!("{name}_vol.nii")), &raw);
        }
        (root, data, save)
    }

    #[test]
    fn test_predict_all() {
        let (_root, data, save) = setup();
        // trial3_broken 中没有原始扫描.
        fs::create_dir(data.join("trial3_broken")).unwrap();
        fs::write(save.join("trial1_pred_seg.nii"), b"").unwrap();

        let opts = BatchOptions {
            predict_lower: true,
            ..Default::default()
        };
        let vocab = ClassVocabulary::default();
        let report = predict_all(&data, &save, None, &vocab, &opts, predictor).unwrap();
        assert_eq!(report.skipped, ["trial1"]);
        assert_eq!(report.written, [save.join("trial2_pred_seg.nii")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "trial3_broken");

        let (_, out) = read_volume(save.join("trial2_pred_seg.nii")).unwrap();
        assert_eq!(out.shape(), (6, 4, 3));
        // 重定向后第 0 个切片恒为空, 其余按原始值预测.
        for ((a, _, c), &v) in out.view().indexed_iter() {
            let expected = if c == 0 || a == 0 { 0.0 } else { 7.0 };
            assert_eq!(v, expected, "at ({a}, _, {c})");
        }
    }

    #[test]
    fn test_predict_all_reference_missing() {
        let (root, data, save) = setup();
        let nii = root.path().join("nii");
        fs::create_dir(&nii).unwrap();
        write_nii_f32(&nii.join("trial1_volume.nii"), &Array3::zeros((6, 4, 3)));

        let opts = BatchOptions::default();
        let vocab = ClassVocabulary::default();
        let report = predict_all(&data, &save, Some(nii.as_path()), &vocab, &opts, predictor)
            .unwrap();
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "trial2");

        // 全部已存在时仍视为可用.
        let again = predict_all(&data, &save, Some(nii.as_path()), &vocab, &opts, predictor)
            .unwrap();
        assert_eq!(again.skipped, ["trial1"]);
    }

    #[test]
    fn test_predict_all_nothing_usable() {
        let (_root, data, save) = setup();
        let nii = TempDir::new().unwrap();
        let vocab = ClassVocabulary::default();
        let opts = BatchOptions::default();
        assert!(matches!(
            predict_all(&data, &save, Some(nii.path()), &vocab, &opts, predictor),
            Err(SegError::EmptyInput { .. })
        ));
    }

    #[test]
    fn test_predict_all_corrupt_scan() {
        let (_root, data, save) = setup();
        fs::write(data.join("trial2").join("trial2_vol.nii"), b"not a nifti file at all").unwrap();

        let vocab = ClassVocabulary::default();
        let opts = BatchOptions::default();
        let report = predict_all(&data, &save, None, &vocab, &opts, predictor).unwrap();
        assert_eq!(report.written, [save.join("trial1_pred_seg.nii")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "trial2");
    }

    #[test]
    fn test_predict_all_size_per_trial() {
        let root = TempDir::new().unwrap();
        let data = root.path().join("data");
        let save = root.path().join("save");
        for name in ["big", "small"] {
            fs::create_dir_all(data.join(name)).unwrap();
        }
        fs::create_dir(&save).unwrap();
        // 第二大维度 600, 单独计算时规范尺寸为 1024. 其预测已存在, 不会被加载.
        write_nii_f32(&data.join("big").join("big_vol.nii"), &Array3::zeros((2, 600, 600)));
        fs::write(save.join("big_pred_seg.nii"), b"").unwrap();
        write_nii_f32(&data.join("small").join("small_vol.nii"), &Array3::zeros((3, 4, 5)));

        let heights = Rc::new(RefCell::new(Vec::new()));
        let make = |_: &TrialDir| {
            let heights = Rc::clone(&heights);
            Ok::<_, SegError>(move |_: usize, input: ArrayView3<'_, f32>| -> SegResult<Slice<i64>> {
                let (h, w, _) = input.dim();
                heights.borrow_mut().push(h);
                Ok(Slice::zeros((h, w)))
            })
        };
        let vocab = ClassVocabulary::default();
        let opts = BatchOptions::default();
        let report = predict_all(&data, &save, None, &vocab, &opts, make).unwrap();
        assert_eq!(report.skipped, ["big"]);
        assert_eq!(report.written.len(), 1);
        // 重定向后为 5 个 (4, 3) 的切片, 全部预测.
        assert_eq!(*heights.borrow(), [512; 5]);
    }
}
