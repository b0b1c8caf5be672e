//! 逐 trial 的规范化与编码, 以及整个数据集的加载.

use super::loader::{discover_trials, trial_loader, training_size, TrialDir, TrialFilter, TrialScan};
use crate::consts::{CLINICAL_MARGIN, FILL_THRESHOLD};
use crate::label::{correct_anomaly, fill_holes, fix_mislabel, one_hot_encode, ClassVocabulary};
use crate::normalize::{fit, reorient};
use crate::{Idx2d, OneHotSlice, OriginalGeometry, SegError, SegResult, Slice};
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 逐 trial 预处理选项.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrepareOptions {
    /// 加载后是否交换首尾两轴.
    pub reorient: bool,

    /// 是否跳过原始数据全为 0 的切片.
    pub no_empty: bool,

    /// 为 `false` 时只保留最后 `margin` 个切片.
    pub include_lower: bool,

    /// 推理模式: 不需要标注文件, 也不产生标签.
    pub predicting: bool,

    /// 临床边界 (切片数).
    pub margin: usize,

    /// 编码前对标签切片做空洞填充的搜索距离. `None` 表示不填充.
    pub fill_threshold: Option<usize>,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            reorient: true,
            no_empty: false,
            include_lower: true,
            predicting: false,
            margin: CLINICAL_MARGIN,
            fill_threshold: None,
        }
    }
}

impl PrepareOptions {
    /// 推理时使用的选项: 不加载标签, 且保留所有切片.
    pub fn predicting() -> Self {
        Self {
            predicting: true,
            ..Default::default()
        }
    }

    /// 开启默认距离 ([`FILL_THRESHOLD`]) 的空洞填充.
    pub fn with_fill(mut self) -> Self {
        self.fill_threshold = Some(FILL_THRESHOLD);
        self
    }
}

/// 一个 trial 规范化 (以及编码) 后的结果.
#[derive(Clone, Debug)]
pub struct PreparedTrial {
    /// trial 名.
    pub name: String,

    /// 规范化后的原始切片.
    pub raw: Vec<Slice<f32>>,

    /// 与 `raw` 一一对应的 one-hot 标签. 推理模式下为空.
    pub labels: Vec<OneHotSlice>,

    /// 规范化之前的几何信息.
    pub geometry: OriginalGeometry,

    /// 被保留的切片在加载 (以及重定向) 后的体中的下标.
    pub kept: Vec<usize>,
}

impl PreparedTrial {
    /// 保留的切片个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// 是否没有保留任何切片?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// 规范化一个 trial 的所有切片到 `target`, 并 (非推理模式下) 编码其标签.
///
/// 处理顺序: 异常值修正, 重定向, 截取最后 `margin` 个切片, 跳过空切片,
/// pad/crop, 误标修正, 空洞填充, one-hot 编码.
/// 任一标签切片编码失败, 整个 trial 失败.
pub fn prepare_trial(
    scan: TrialScan,
    target: Idx2d,
    vocab: &ClassVocabulary,
    opts: &PrepareOptions,
) -> SegResult<PreparedTrial> {
    let TrialScan {
        name, raw, labels, ..
    } = scan;
    let geometry = OriginalGeometry::new(raw.shape(), opts.reorient);

    let labels = if opts.predicting {
        None
    } else {
        let Some(labels) = labels else {
            return Err(SegError::empty(
                name.as_str(),
                "label volume is required when not predicting",
            ));
        };
        Some(correct_anomaly(labels))
    };

    let (raw, labels) = if opts.reorient {
        (reorient(&raw), labels.as_ref().map(reorient))
    } else {
        (raw, labels)
    };

    let start = if opts.include_lower {
        0
    } else {
        raw.len().saturating_sub(opts.margin)
    };

    let mut out_raw = Vec::with_capacity(raw.len() - start);
    let mut out_labels = Vec::new();
    let mut kept = Vec::with_capacity(raw.len() - start);
    for i in start..raw.len() {
        let raw_slice = raw.to_slice(i);
        if opts.no_empty && raw_slice.is_blank() {
            continue;
        }
        out_raw.push(fit(&raw_slice, target)?);
        if let Some(labels) = &labels {
            let mut label_slice = fix_mislabel(&fit(&labels.to_slice(i), target)?);
            if let Some(threshold) = opts.fill_threshold {
                label_slice = fill_holes(&label_slice, threshold);
            }
            out_labels.push(one_hot_encode(&label_slice, vocab)?);
        }
        kept.push(i);
    }
    log::debug!(
        "{name}: kept {} of {} slices, geometry {:?}",
        kept.len(),
        raw.len(),
        geometry
    );

    Ok(PreparedTrial {
        name,
        raw: out_raw,
        labels: out_labels,
        geometry,
        kept,
    })
}

/// 整个数据集加载后的结果: 按 trial 顺序拼接的切片, 以及每个 trial 的几何信息.
#[derive(Clone, Debug, Default)]
pub struct LoadedDataset {
    /// 规范尺寸 (正方形边长).
    pub size: usize,

    /// 所有原始切片.
    pub raw: Vec<Slice<f32>>,

    /// 所有 one-hot 标签. 推理模式下为空.
    pub labels: Vec<OneHotSlice>,

    /// `(trial 名, 几何信息, 该 trial 贡献的切片个数)`, 按加载顺序.
    pub trials: Vec<(String, OriginalGeometry, usize)>,
}

impl LoadedDataset {
    /// 切片总数.
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// 是否没有任何切片?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    fn push(&mut self, trial: PreparedTrial) {
        self.trials.push((trial.name, trial.geometry, trial.raw.len()));
        self.raw.extend(trial.raw);
        self.labels.extend(trial.labels);
    }
}

/// 加载 `root` 下的所有 trial (按 `load_augmented` 选取原始或增强数据).
///
/// 规范尺寸由所有被选中的 trial 统一计算. 见 [`load_trials`].
pub fn load_all<P: AsRef<Path>>(
    root: P,
    vocab: &ClassVocabulary,
    opts: &PrepareOptions,
    load_augmented: bool,
) -> SegResult<LoadedDataset> {
    let root = root.as_ref();
    let trials = discover_trials(root, TrialFilter::from_augmented(load_augmented))?;
    let size = training_size(trials.iter().map(|t| &t.path))?;
    load_trials(root, trials, size, vocab, opts)
}

/// 以规范尺寸 `size` 依次加载并规范化 `trials`, 切片按 trial 顺序拼接.
///
/// 单个 trial 的错误会被记录并跳过该 trial; 若最终没有任何可用 trial, 返回
/// [`SegError::EmptyInput`] (`root` 仅用于报告).
pub fn load_trials(
    root: &Path,
    trials: Vec<TrialDir>,
    size: usize,
    vocab: &ClassVocabulary,
    opts: &PrepareOptions,
) -> SegResult<LoadedDataset> {
    log::info!(
        "loading {} trials from {} at size {size}",
        trials.len(),
        root.display()
    );

    let mut ans = LoadedDataset {
        size,
        ..Default::default()
    };
    for (trial, scan) in trial_loader(trials, opts.predicting) {
        match scan.and_then(|scan| prepare_trial(scan, (size, size), vocab, opts)) {
            Ok(prepared) => ans.push(prepared),
            Err(e) if e.is_trial_local() => log::warn!("skipping {}: {e}", trial.name),
            Err(e) => return Err(e),
        }
    }
    if ans.trials.is_empty() {
        return Err(SegError::empty(root, "no usable trial"));
    }
    log::info!(
        "loaded {} slices from {} trials",
        ans.len(),
        ans.trials.len()
    );
    Ok(ans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::loader::tests::{write_nii_f32, write_nii_u8};
    use crate::Volume;
    use ndarray::Array3;
    use std::fs;
    use tempfile::TempDir;

    fn scan(raw: Array3<f32>, labels: Array3<u8>) -> TrialScan {
        TrialScan {
            name: "trial0".into(),
            header: Box::default(),
            raw: Volume::new(raw),
            labels: Some(Volume::new(labels)),
        }
    }

    #[test]
    fn test_prepare_anomaly_and_mislabel() {
        let mut labels = Array3::<u8>::zeros((3, 4, 5));
        labels[(1, 3, 4)] = 6;
        labels[(1, 0, 0)] = 1;
        let raw = Array3::<f32>::ones((3, 4, 5));
        let opts = PrepareOptions {
            reorient: false,
            ..Default::default()
        };
        let vocab = ClassVocabulary::default();
        let t = prepare_trial(scan(raw, labels), (6, 6), &vocab, &opts).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.kept, [0, 1, 2]);
        assert_eq!(t.geometry, OriginalGeometry::new((3, 4, 5), false));

        // (4, 5) pad 到 (6, 6): 上 1, 左 0.
        let hot = t.labels[1].view();
        assert_eq!(hot[(4, 4, 1)], 1);
        assert_eq!(hot[(1, 0, 1)], 1);
        assert_eq!(hot[(0, 0, 0)], 1);
        assert!(t.labels.iter().all(|h| h.is_valid()));
        assert_eq!(t.raw[0].shape(), (6, 6));
    }

    #[test]
    fn test_prepare_reorient_and_tail() {
        let raw = Array3::from_shape_fn((4, 3, 10), |(a, _, c)| (a + c) as f32);
        let labels = Array3::<u8>::zeros((4, 3, 10));
        let opts = PrepareOptions {
            include_lower: false,
            margin: 6,
            ..Default::default()
        };
        let vocab = ClassVocabulary::default();
        let t = prepare_trial(scan(raw, labels), (4, 4), &vocab, &opts).unwrap();
        assert_eq!(t.geometry.loaded_len(), 10);
        assert_eq!(t.kept, [4, 5, 6, 7, 8, 9]);
        assert_eq!(t.labels.len(), 6);
        // 重定向后切片形状为 (3, 4), pad 到 (4, 4): 上 0.
        assert_eq!(t.raw[0][(0, 1)], 5.0);
    }

    #[test]
    fn test_prepare_no_empty_and_unknown() {
        let mut raw = Array3::<f32>::zeros((3, 2, 2));
        raw[(1, 0, 0)] = 1.0;
        let mut labels = Array3::<u8>::zeros((3, 2, 2));
        let opts = PrepareOptions {
            reorient: false,
            no_empty: true,
            ..Default::default()
        };
        let vocab = ClassVocabulary::default();
        let t = prepare_trial(scan(raw.clone(), labels.clone()), (2, 2), &vocab, &opts).unwrap();
        assert_eq!(t.kept, [1]);

        labels[(1, 1, 1)] = 99;
        assert!(matches!(
            prepare_trial(scan(raw, labels), (2, 2), &vocab, &opts),
            Err(SegError::UnknownLabel { value: 99, .. })
        ));
    }

    #[test]
    fn test_prepare_fill_holes() {
        let mut labels = Array3::<u8>::from_elem((1, 5, 5), 7);
        labels[(0, 2, 2)] = 0;
        let raw = Array3::<f32>::ones((1, 5, 5));
        let vocab = ClassVocabulary::default();
        let opts = PrepareOptions {
            reorient: false,
            ..Default::default()
        };
        let plain =
            prepare_trial(scan(raw.clone(), labels.clone()), (5, 5), &vocab, &opts).unwrap();
        assert_eq!(plain.labels[0].view()[(2, 2, 0)], 1);

        let filled = prepare_trial(scan(raw, labels), (5, 5), &vocab, &opts.with_fill()).unwrap();
        assert_eq!(filled.labels[0].view()[(2, 2, 1)], 1);
    }

    #[test]
    fn test_prepare_predicting() {
        let mut s = scan(Array3::zeros((2, 3, 3)), Array3::zeros((2, 3, 3)));
        s.labels = None;
        let vocab = ClassVocabulary::default();
        let t = prepare_trial(s.clone(), (4, 4), &vocab, &PrepareOptions::predicting()).unwrap();
        assert_eq!(t.raw.len(), 3);
        assert!(t.labels.is_empty());
        assert!(prepare_trial(s, (4, 4), &vocab, &PrepareOptions::default()).is_err());
    }

    #[test]
    fn test_load_all_skips_bad_trial() {
        let root = TempDir::new().unwrap();
        let good = root.path().join("trial1");
        let bad = root.path().join("trial2");
        fs::create_dir(&good).unwrap();
        fs::create_dir(&bad).unwrap();
        write_nii_f32(&good.join("t1_vol.nii"), &Array3::ones((5, 4, 3)));
        write_nii_u8(&good.join("t1_seg.nii"), &Array3::from_elem((5, 4, 3), 7));
        write_nii_f32(&bad.join("t2_vol.nii"), &Array3::ones((5, 4, 3)));
        write_nii_u8(&bad.join("t2_seg.nii"), &Array3::from_elem((5, 4, 3), 200));

        let vocab = ClassVocabulary::default();
        let ds = load_all(root.path(), &vocab, &PrepareOptions::default(), false).unwrap();
        assert_eq!(ds.size, 512);
        assert_eq!(ds.trials.len(), 1);
        assert_eq!(ds.trials[0].0, "trial1");
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.labels.len(), 3);
        assert_eq!(ds.raw[0].shape(), (512, 512));

        // 没有增强数据目录.
        assert!(matches!(
            load_all(root.path(), &vocab, &PrepareOptions::default(), true),
            Err(SegError::EmptyInput { .. })
        ));
    }
}
