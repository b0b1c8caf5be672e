//! 预测体重建: 把逐切片的预测结果还原为与原始扫描几何一致的标签体.
//!
//! 1. 切片下标不超过临床下界 [`lower_bound`] 的切片直接置空 (全为背景);
//! 2. 其余切片交给 [`SlicePredictor`] 预测类别下标, 再解码为标签值;
//! 3. 逐切片 crop (或 pad) 回原始形状;
//! 4. 若加载时重定向过, 再交换一次首尾两轴.
//!
//! 标签值本身就是整数, 因此 "持久化前取整" 由类型保证.

mod batch;

pub use batch::{predict_all, BatchOptions, BatchReport};

use crate::consts::CLINICAL_MARGIN;
use crate::label::{decode_label_values, ClassVocabulary};
use crate::normalize::{reorient, restore};
use crate::{Label, OriginalGeometry, SegError, SegResult, Slice, Volume};
use ndarray::{ArrayView3, Axis};

/// 外部模型的接入点: 输入 `(高, 宽, 1)` 的原始切片, 输出 `(高, 宽)` 的类别下标.
pub trait SlicePredictor {
    /// 预测第 `index` 个切片.
    fn predict(&mut self, index: usize, input: ArrayView3<'_, f32>) -> SegResult<Slice<i64>>;
}

impl<F> SlicePredictor for F
where
    F: FnMut(usize, ArrayView3<'_, f32>) -> SegResult<Slice<i64>>,
{
    #[inline]
    fn predict(&mut self, index: usize, input: ArrayView3<'_, f32>) -> SegResult<Slice<i64>> {
        self(index, input)
    }
}

/// 临床下界: `predict_lower` 时为 0, 否则为 `n - margin`. 可能为负.
///
/// 下标 `i <= lower_bound` 的切片置空. 注意即便 `predict_lower`, 第 0 个切片也总是空的.
#[inline]
pub fn lower_bound(n: usize, predict_lower: bool, margin: usize) -> i64 {
    if predict_lower {
        0
    } else {
        n as i64 - margin as i64
    }
}

/// 预测体重建器.
#[derive(Clone, Debug)]
pub struct Reconstructor {
    vocab: ClassVocabulary,
    predict_lower: bool,
    margin: usize,
}

impl Default for Reconstructor {
    fn default() -> Self {
        Self::new(ClassVocabulary::default())
    }
}

impl Reconstructor {
    /// 以给定词表初始化. 不预测下部, 临床边界为 [`CLINICAL_MARGIN`].
    pub fn new(vocab: ClassVocabulary) -> Self {
        Self {
            vocab,
            predict_lower: false,
            margin: CLINICAL_MARGIN,
        }
    }

    /// 是否也预测临床边界以下的切片.
    pub fn predict_lower(mut self, yes: bool) -> Self {
        self.predict_lower = yes;
        self
    }

    /// 设置临床边界.
    pub fn margin(mut self, margin: usize) -> Self {
        self.margin = margin;
        self
    }

    /// 类别词表.
    #[inline]
    pub fn vocab(&self) -> &ClassVocabulary {
        &self.vocab
    }

    /// 逐切片预测并解码, 得到规范尺寸下的标签切片.
    ///
    /// 预测结果形状与输入切片不一致时返回 [`SegError::ShapeMismatch`].
    pub fn predict_volume<P: SlicePredictor + ?Sized>(
        &self,
        slices: &[Slice<f32>],
        predictor: &mut P,
    ) -> SegResult<Vec<Slice<Label>>> {
        let lb = lower_bound(slices.len(), self.predict_lower, self.margin);
        let mut ans = Vec::with_capacity(slices.len());
        for (i, s) in slices.iter().enumerate() {
            if i as i64 <= lb {
                ans.push(Slice::zeros(s.shape()));
                continue;
            }
            let indices = predictor.predict(i, s.view().insert_axis(Axis(2)))?;
            if indices.shape() != s.shape() {
                let ((h, w), (ph, pw)) = (s.shape(), indices.shape());
                return Err(SegError::ShapeMismatch {
                    expected: vec![h, w],
                    got: vec![ph, pw],
                });
            }
            ans.push(decode_label_values(&indices, &self.vocab)?);
        }
        let blank = (lb + 1).clamp(0, ans.len() as i64) as usize;
        log::debug!(
            "predicted {} of {} slices (lower bound {lb})",
            ans.len() - blank,
            ans.len()
        );
        Ok(ans)
    }

    /// 把规范尺寸下的标签切片还原为原始几何: 先逐切片 crop/pad, 再按需重定向.
    ///
    /// 切片个数与 `geometry` 不符时返回 [`SegError::ShapeMismatch`].
    pub fn restore_geometry(
        &self,
        slices: &[Slice<Label>],
        geometry: &OriginalGeometry,
    ) -> SegResult<Volume<Label>> {
        if slices.len() != geometry.loaded_len() {
            return Err(SegError::ShapeMismatch {
                expected: vec![geometry.loaded_len()],
                got: vec![slices.len()],
            });
        }
        let target = geometry.loaded_slice_shape();
        let restored = slices
            .iter()
            .map(|s| restore(s, target))
            .collect::<SegResult<Vec<_>>>()?;
        let volume = Volume::from_slices(restored)?;
        let volume = if geometry.reoriented {
            reorient(&volume)
        } else {
            volume
        };

        let (a, b, c) = geometry.dims;
        if volume.shape() != geometry.dims {
            let (x, y, z) = volume.shape();
            return Err(SegError::ShapeMismatch {
                expected: vec![a, b, c],
                got: vec![x, y, z],
            });
        }
        Ok(volume)
    }

    /// 预测并重建整个扫描.
    pub fn reconstruct<P: SlicePredictor + ?Sized>(
        &self,
        slices: &[Slice<f32>],
        geometry: &OriginalGeometry,
        predictor: &mut P,
    ) -> SegResult<Volume<Label>> {
        let predicted = self.predict_volume(slices, predictor)?;
        self.restore_geometry(&predicted, geometry)
    }
}
