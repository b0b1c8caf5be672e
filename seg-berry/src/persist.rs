//! 持久化: 预测体写出 (沿用参考 header), 数据集与编码结果的 npy/npz 导出.

use crate::consts::names::*;
use crate::dataset::loader::{read_volume, visible_files, BoxedHeader};
use crate::dataset::Partition;
use crate::label::ClassVocabulary;
use crate::{Label, SegError, SegResult, Volume};
use ndarray::{Array3, Array4};
use ndarray_npy::{read_npy, write_npy, NpzWriter};
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;
use std::fs::File;
use std::path::{Path, PathBuf};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use crate::label::par_encode_volume as encode;
    } else {
        use crate::label::encode_volume as encode;
    }
}

/// trial 预测结果的文件名: `<trial>_pred_seg.nii`.
#[inline]
pub fn prediction_file_name(trial: &str) -> String {
    format!("{trial}{PRED_SEG_SUFFIX}{NII_EXT}")
}

/// trial 预测结果在 `save_dir` 中的路径.
#[inline]
pub fn prediction_path<P: AsRef<Path>>(save_dir: P, trial: &str) -> PathBuf {
    save_dir.as_ref().join(prediction_file_name(trial))
}

/// `save_dir` 中是否已有该 trial 的预测结果?
#[inline]
pub fn prediction_exists<P: AsRef<Path>>(save_dir: P, trial: &str) -> bool {
    prediction_path(save_dir, trial).is_file()
}

/// 以 `reference` 为参考 header 把标签体写为 nii 文件.
pub fn save_prediction<P: AsRef<Path>>(
    path: P,
    volume: &Volume<Label>,
    reference: &NiftiHeader,
) -> SegResult<()> {
    WriterOptions::new(path.as_ref())
        .reference_header(reference)
        .write_nifti(&volume.view())?;
    log::debug!("saved {}", path.as_ref().display());
    Ok(())
}

/// 只读取 nii 文件的 header.
#[inline]
pub fn read_header<P: AsRef<Path>>(path: P) -> SegResult<BoxedHeader> {
    Ok(Box::new(NiftiHeader::from_file(path.as_ref())?))
}

/// 在 `dir` 中 (按文件名排序) 找到第一个文件名同时包含 `trial` 与 `marker` 的文件.
///
/// 找不到时返回 [`SegError::EmptyInput`].
pub fn find_reference_nifti<P: AsRef<Path>>(
    dir: P,
    trial: &str,
    marker: &str,
) -> SegResult<PathBuf> {
    let dir = dir.as_ref();
    visible_files(dir)?
        .into_iter()
        .find(|p| {
            p.file_name().is_some_and(|n| {
                let n = n.to_string_lossy();
                n.contains(trial) && n.contains(marker)
            })
        })
        .ok_or_else(|| SegError::empty(dir, format!("no file containing `{trial}` and `{marker}`")))
}

/// 在 `dir` 中找 trial 的参考 header ([`REFERENCE_MARKER`]) 并读取.
pub fn reference_header<P: AsRef<Path>>(dir: P, trial: &str) -> SegResult<BoxedHeader> {
    read_header(find_reference_nifti(dir, trial, REFERENCE_MARKER)?)
}

/// 两个 nii 文件的数据是否完全相同 (形状一致且逐体素相等)?
pub fn volumes_equal<P: AsRef<Path>, Q: AsRef<Path>>(a: P, b: Q) -> SegResult<bool> {
    let (_, a) = read_volume(a)?;
    let (_, b) = read_volume(b)?;
    Ok(a == b)
}

/// 把划分结果写为 `dir` 下的六个 npy 文件: `x_train.npy`, `y_train.npy`, `x_val.npy`, ...
///
/// `x_*` 为 `(n, 高, 宽, 1)` 的 `f32` 原始数据, `y_*` 为 `(n, 高, 宽, 类别数)` 的 `u8` one-hot 标签.
pub fn write_partition<P: AsRef<Path>>(dir: P, partition: &Partition) -> SegResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut ans = Vec::with_capacity(6);
    for (name, subset) in partition.named() {
        let x = dir.join(format!("x_{name}.npy"));
        let y = dir.join(format!("y_{name}.npy"));
        write_npy(&x, &subset.raw)?;
        write_npy(&y, &subset.labels)?;
        log::info!("{name}: {} samples -> {}", subset.len(), dir.display());
        ans.push(x);
        ans.push(y);
    }
    Ok(ans)
}

/// one-hot 编码整个标注体, 结果形状 `(切片数, 高, 宽, 类别数)`.
pub fn encode_label_volume(
    volume: &Volume<Label>,
    vocab: &ClassVocabulary,
) -> SegResult<Array4<u8>> {
    let (n, h, w) = volume.shape();
    let mut buf = Vec::with_capacity(n * h * w * vocab.len());
    for hot in encode(volume, vocab)? {
        buf.extend(hot.into_raw().iter().copied());
    }
    Ok(Array4::from_shape_vec((n, h, w, vocab.len()), buf)?)
}

/// one-hot 编码整个标注体, 并以压缩 npz 格式 (唯一数组 `arr_0`) 写出.
pub fn save_one_hot_encoded<P: AsRef<Path>>(
    path: P,
    volume: &Volume<Label>,
    vocab: &ClassVocabulary,
) -> SegResult<()> {
    let encoded = encode_label_volume(volume, vocab)?;
    let mut npz = NpzWriter::new_compressed(File::create(path.as_ref())?);
    npz.add_array("arr_0", &encoded)?;
    npz.finish()?;
    Ok(())
}

/// 读取外部模型给出的逐切片类别下标 `(切片数, 高, 宽)`.
#[inline]
pub fn read_class_maps<P: AsRef<Path>>(path: P) -> SegResult<Array3<i64>> {
    Ok(read_npy(path.as_ref())?)
}
