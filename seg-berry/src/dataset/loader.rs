//! trial 目录发现与 nii 体数据加载器.
//!
//! 每个 trial 是一个目录, 其中恰有一个原始扫描文件 (文件名含 `"vol"`), 以及
//! (非推理模式下) 一个标注文件 (文件名含 `"seg"`). 隐藏文件一律忽略.
//!
//! 体数据保留文件原生轴序, 第 0 轴即切片轴.

use crate::consts::names::*;
use crate::consts::canonical_size;
use crate::{Label, SegError, SegResult, Volume};
use ndarray::{Array3, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::fs;
use std::path::{Path, PathBuf};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
pub type BoxedHeader = Box<NiftiHeader>;

/// 文件名是否是隐藏文件?
#[inline]
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// 目录名是否表示增强数据 trial?
#[inline]
pub fn is_augmented_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    AUGMENTED_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// 发现 trial 时选取哪些目录.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TrialFilter {
    /// 仅非增强 trial.
    Original,

    /// 仅增强 trial (名称以 `_ed` 或 `_rot` 结尾).
    Augmented,

    /// 全部 trial.
    All,
}

impl TrialFilter {
    /// 由 "是否加载增强数据" 开关得到过滤规则.
    #[inline]
    pub fn from_augmented(load_augmented: bool) -> Self {
        if load_augmented {
            Self::Augmented
        } else {
            Self::Original
        }
    }

    #[inline]
    fn accepts(self, augmented: bool) -> bool {
        match self {
            Self::Original => !augmented,
            Self::Augmented => augmented,
            Self::All => true,
        }
    }
}

/// 一个 trial 目录.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrialDir {
    /// 目录名, 同时也是 trial 名.
    pub name: String,

    /// 目录路径.
    pub path: PathBuf,

    /// 是否为增强数据.
    pub augmented: bool,
}

/// 列出目录下所有非隐藏的普通文件, 按文件名排序.
pub fn visible_files<P: AsRef<Path>>(dir: P) -> SegResult<Vec<PathBuf>> {
    let mut ans = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !is_hidden(&name) && entry.file_type()?.is_file() {
            ans.push(entry.path());
        }
    }
    ans.sort();
    Ok(ans)
}

/// 发现 `root` 下所有 trial 目录: 非隐藏, 且小写名称包含 `"trial"`. 结果按名称排序.
///
/// 没有任何符合 `filter` 的 trial 时返回 [`SegError::EmptyInput`].
pub fn discover_trials<P: AsRef<Path>>(root: P, filter: TrialFilter) -> SegResult<Vec<TrialDir>> {
    let root = root.as_ref();
    let mut ans = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name)
            || !entry.file_type()?.is_dir()
            || !name.to_lowercase().contains(TRIAL_MARKER)
        {
            continue;
        }
        let augmented = is_augmented_name(&name);
        if filter.accepts(augmented) {
            ans.push(TrialDir {
                name,
                path: entry.path(),
                augmented,
            });
        }
    }
    if ans.is_empty() {
        return Err(SegError::empty(root, format!("no {filter:?} trial directory")));
    }
    ans.sort_by(|a, b| a.name.cmp(&b.name));
    log::debug!("trials found: {:?}", ans.iter().map(|t| &t.name).collect::<Vec<_>>());
    Ok(ans)
}

/// 形状中第二大的维度. 最大的维度被假定为切片数而排除.
///
/// 维度少于两个时返回 0.
pub fn second_largest(dims: &[usize]) -> usize {
    let mut dims = dims.to_vec();
    dims.sort_unstable_by(|a, b| b.cmp(a));
    dims.get(1).copied().unwrap_or(0)
}

/// 只读取 header, 获取 nii 文件的数据形状 (文件原生轴序).
pub fn read_shape<P: AsRef<Path>>(path: P) -> SegResult<Vec<usize>> {
    let header = NiftiHeader::from_file(path.as_ref())?;
    let ndim = (header.dim[0] as usize).clamp(0, 7);
    Ok(header.dim[1..=ndim].iter().map(|&d| d as usize).collect())
}

/// 遍历所有 `scan_paths` 下的每个非隐藏文件, 求各文件形状第二大维度的最大值.
///
/// 每次调用都重新计算. 任一文件读取失败则整体失败.
pub fn find_training_dim<P, I>(scan_paths: I) -> SegResult<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = P>,
{
    let mut max_dim = 0;
    for scan_path in scan_paths {
        for file in visible_files(scan_path.as_ref())? {
            let shape = read_shape(&file)?;
            let cur = second_largest(&shape);
            log::debug!("{}: shape {shape:?}", file.display());
            max_dim = max_dim.max(cur);
        }
    }
    log::debug!("the max dim is {max_dim}");
    Ok(max_dim)
}

/// 规范训练尺寸: 512 或 1024. 见 [`canonical_size`].
#[inline]
pub fn training_size<P: AsRef<Path>, I: IntoIterator<Item = P>>(scan_paths: I) -> SegResult<usize> {
    find_training_dim(scan_paths).map(canonical_size)
}

/// 读取 nii 文件为 `f32` 体数据 (文件原生轴序), 同时返回 header.
pub fn read_volume<P: AsRef<Path>>(path: P) -> SegResult<(BoxedHeader, Volume<f32>)> {
    let obj = ReaderOptions::new().read_file(path.as_ref())?;
    let header = Box::new(obj.header().clone());
    let data = obj
        .into_volume()
        .into_ndarray::<f32>()?
        .into_dimensionality::<Ix3>()?;
    let data = if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().into_owned()
    };
    Ok((header, Volume::new(data)))
}

/// 读取 nii 标注文件. 体素值先四舍五入为整数; 超出标签类型范围的值返回
/// [`SegError::UnknownLabel`].
pub fn read_label_volume<P: AsRef<Path>>(path: P) -> SegResult<Volume<Label>> {
    let (_, raw) = read_volume(path)?;
    let raw = raw.into_raw();
    let mut out = Array3::<Label>::zeros(raw.dim());
    for (o, &v) in out.iter_mut().zip(raw.iter()) {
        let r = v.round();
        if !(r >= Label::MIN as f32 && r <= Label::MAX as f32) {
            return Err(SegError::UnknownLabel {
                value: r as i64,
                pos: None,
            });
        }
        *o = r as Label;
    }
    Ok(Volume::new(out))
}

/// 一个 trial 的原始扫描与 (可选的) 标注.
#[derive(Debug, Clone)]
pub struct TrialScan {
    /// trial 名.
    pub name: String,

    /// 原始扫描的 header, 用作输出文件的参考 header.
    pub header: BoxedHeader,

    /// 原始扫描.
    pub raw: Volume<f32>,

    /// 标注. 推理模式下为 `None`.
    pub labels: Option<Volume<Label>>,
}

/// 在 `files` 中找唯一一个文件名包含 `marker` 的文件.
fn unique_with_marker<'a>(dir: &Path, files: &'a [PathBuf], marker: &str) -> SegResult<&'a Path> {
    let mut it = files.iter().filter(|p| {
        p.file_name()
            .is_some_and(|n| n.to_string_lossy().contains(marker))
    });
    match (it.next(), it.next()) {
        (Some(p), None) => Ok(p.as_path()),
        (None, _) => Err(SegError::empty(dir, format!("no file containing `{marker}`"))),
        (Some(_), Some(_)) => Err(SegError::empty(
            dir,
            format!("more than one file containing `{marker}`"),
        )),
    }
}

impl TrialScan {
    /// 打开 trial 目录. `predicting` 为 `true` 时不需要也不加载标注.
    ///
    /// 扫描与标注形状不一致时返回 [`SegError::ShapeMismatch`].
    pub fn open(trial: &TrialDir, predicting: bool) -> SegResult<Self> {
        let files = visible_files(&trial.path)?;
        let raw_path = unique_with_marker(&trial.path, &files, RAW_MARKER)?;
        let (header, raw) = read_volume(raw_path)?;

        let labels = if predicting {
            None
        } else {
            let seg_path = unique_with_marker(&trial.path, &files, SEG_MARKER)?;
            let labels = read_label_volume(seg_path)?;
            if labels.shape() != raw.shape() {
                let (a, b, c) = raw.shape();
                let (x, y, z) = labels.shape();
                return Err(SegError::ShapeMismatch {
                    expected: vec![a, b, c],
                    got: vec![x, y, z],
                });
            }
            Some(labels)
        };
        log::debug!("opened {} with shape {:?}", trial.name, raw.shape());

        Ok(Self {
            name: trial.name.clone(),
            header,
            raw,
            labels,
        })
    }
}

/// 从 trial 列表创建加载器. 加载器按给定顺序逐个打开 trial.
pub fn trial_loader<I: IntoIterator<Item = TrialDir>>(trials: I, predicting: bool) -> TrialLoader {
    let mut data: Vec<TrialDir> = trials.into_iter().collect();
    data.reverse();
    TrialLoader {
        data_rev: data,
        predicting,
    }
}

/// trial 数据加载器. 每次迭代打开一个 trial, 失败时返回 `Err` 而不终止迭代.
#[derive(Debug)]
pub struct TrialLoader {
    data_rev: Vec<TrialDir>,
    predicting: bool,
}

impl Iterator for TrialLoader {
    type Item = (TrialDir, SegResult<TrialScan>);

    fn next(&mut self) -> Option<Self::Item> {
        let trial = self.data_rev.pop()?;
        let data = TrialScan::open(&trial, self.predicting);
        Some((trial, data))
    }
}

impl ExactSizeIterator for TrialLoader {
    #[inline]
    fn len(&self) -> usize {
        self.data_rev.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use nifti::writer::WriterOptions;
    use std::fs;
    use tempfile::TempDir;

    /// 写一个小的 `f32` nii 文件, `data` 为文件原生轴序.
    pub(crate) fn write_nii_f32(path: &Path, data: &Array3<f32>) {
        WriterOptions::new(path).write_nifti(data).unwrap();
    }

    pub(crate) fn write_nii_u8(path: &Path, data: &Array3<u8>) {
        WriterOptions::new(path).write_nifti(data).unwrap();
    }

    #[test]
    fn test_second_largest() {
        assert_eq!(second_largest(&[900, 480, 380]), 480);
        assert_eq!(second_largest(&[380, 480, 900]), 480);
        assert_eq!(second_largest(&[512, 512, 40]), 512);
        assert_eq!(second_largest(&[7]), 0);
    }

    #[test]
    fn test_discover_trials() {
        let root = TempDir::new().unwrap();
        for d in ["trial1", "Trial2_rot", "trial3_ed", ".trial4", "other"] {
            fs::create_dir(root.path().join(d)).unwrap();
        }
        fs::write(root.path().join("trial5"), b"not a dir").unwrap();

        let names = |f| -> Vec<String> {
            discover_trials(root.path(), f)
                .unwrap()
                .into_iter()
                .map(|t| t.name)
                .collect()
        };
        assert_eq!(names(TrialFilter::Original), ["trial1"]);
        assert_eq!(names(TrialFilter::Augmented), ["Trial2_rot", "trial3_ed"]);
        assert_eq!(names(TrialFilter::All).len(), 3);
    }

    #[test]
    fn test_discover_nothing() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("trial1_ed")).unwrap();
        assert!(matches!(
            discover_trials(root.path(), TrialFilter::Original),
            Err(SegError::EmptyInput { .. })
        ));
    }

    #[test]
    fn test_open_trial_and_training_dim() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("trial1");
        fs::create_dir(&dir).unwrap();
        let raw = Array3::from_shape_fn((6, 5, 4), |(a, b, c)| (a + b + c) as f32);
        let seg = Array3::from_shape_fn((6, 5, 4), |(a, _, _)| if a == 2 { 7u8 } else { 0 });
        write_nii_f32(&dir.join("trial1_vol.nii"), &raw);
        write_nii_u8(&dir.join("trial1_seg.nii"), &seg);
        fs::write(dir.join(".hidden"), b"ignored").unwrap();

        let trial = TrialDir {
            name: "trial1".into(),
            path: dir.clone(),
            augmented: false,
        };
        let scan = TrialScan::open(&trial, false).unwrap();
        assert_eq!(scan.raw.shape(), (6, 5, 4));
        assert_eq!(scan.raw[(1, 2, 3)], 6.0);
        let labels = scan.labels.unwrap();
        assert_eq!(labels[(2, 0, 0)], 7);
        assert_eq!(labels[(3, 0, 0)], 0);

        let predicting = TrialScan::open(&trial, true).unwrap();
        assert!(predicting.labels.is_none());

        assert_eq!(find_training_dim([&dir]).unwrap(), 5);
        assert_eq!(training_size([&dir]).unwrap(), 512);

        let mut loader = trial_loader([trial], true);
        assert_eq!(loader.len(), 1);
        assert!(loader.next().unwrap().1.is_ok());
        assert!(loader.next().is_none());
    }

    #[test]
    fn test_open_trial_missing_seg() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("trial9");
        fs::create_dir(&dir).unwrap();
        write_nii_f32(&dir.join("a_vol.nii"), &Array3::<f32>::zeros((2, 2, 2)));
        let trial = TrialDir {
            name: "trial9".into(),
            path: dir,
            augmented: false,
        };
        assert!(matches!(
            TrialScan::open(&trial, false),
            Err(SegError::EmptyInput { .. })
        ));
        assert!(TrialScan::open(&trial, true).is_ok());
    }
}
