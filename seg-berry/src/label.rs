//! 标签编码: 异常值修正, one-hot 编码与解码.

use crate::consts::{is_background, labels::*};
use crate::{Idx2d, Label, OneHotSlice, SegError, SegResult, Slice, Volume};
use itertools::Itertools;
use ndarray::{Array3, ArrayView3, Axis};
use num::ToPrimitive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 有序、无重复的类别词表. 值的顺序即 one-hot 通道顺序.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<Label>", into = "Vec<Label>")
)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassVocabulary {
    labels: Vec<Label>,

    /// 值 -> 通道下标 的查找表.
    lookup: [Option<u8>; 256],
}

impl ClassVocabulary {
    /// 由有序标签值构造词表.
    ///
    /// 空词表或存在重复值时返回 [`SegError::Configuration`].
    pub fn new<I: IntoIterator<Item = Label>>(labels: I) -> SegResult<Self> {
        let labels: Vec<Label> = labels.into_iter().collect();
        if labels.is_empty() {
            return Err(SegError::config("class vocabulary is empty"));
        }
        let mut lookup = [None; 256];
        for (i, &v) in labels.iter().enumerate() {
            let slot = &mut lookup[v as usize];
            if slot.is_some() {
                return Err(SegError::config(format!(
                    "class vocabulary contains duplicated label {v}"
                )));
            }
            // 标签值只有 256 种, 下标一定放得进 u8.
            *slot = Some(i as u8);
        }
        Ok(Self { labels, lookup })
    }

    /// 由标注体中出现的所有值 (升序) 构造词表.
    pub fn from_volume(volume: &Volume<Label>) -> SegResult<Self> {
        Self::new(volume.view().iter().copied().sorted_unstable().dedup())
    }

    /// 类别个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// 词表是否为空? 合法构造的词表总是非空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// 按通道顺序排列的标签值.
    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// 标签值 `value` 对应的通道下标. 不在词表中时返回 `None`.
    #[inline]
    pub fn index_of(&self, value: Label) -> Option<usize> {
        self.lookup[value as usize].map(usize::from)
    }

    /// 通道下标 `index` 对应的标签值. 越界时返回 [`SegError::IndexRange`].
    #[inline]
    pub fn value_at(&self, index: i64) -> SegResult<Label> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.labels.get(i).copied())
            .ok_or(SegError::IndexRange {
                index,
                len: self.len(),
            })
    }
}

impl Default for ClassVocabulary {
    /// 默认词表 [`DEFAULT_CLASS_LABELS`].
    fn default() -> Self {
        let mut lookup = [None; 256];
        for (i, &v) in DEFAULT_CLASS_LABELS.iter().enumerate() {
            lookup[v as usize] = Some(i as u8);
        }
        Self {
            labels: DEFAULT_CLASS_LABELS.to_vec(),
            lookup,
        }
    }
}

impl TryFrom<Vec<Label>> for ClassVocabulary {
    type Error = SegError;

    #[inline]
    fn try_from(value: Vec<Label>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClassVocabulary> for Vec<Label> {
    #[inline]
    fn from(value: ClassVocabulary) -> Self {
        value.labels
    }
}

/// 将切片中值为 `src` 的像素全部替换为 `dst`, 返回新切片.
pub fn cast_label<T: Clone + PartialEq>(slice: &Slice<T>, src: &T, dst: &T) -> Slice<T> {
    slice.map(|p| if p == src { dst.clone() } else { p.clone() })
}

/// 修正标注体中的已知异常值: [`ANOMALY_SOURCE`] 全部替换为 [`ANOMALY_TARGET`].
///
/// 每个扫描加载后只调用一次, 且在任何其他标签处理之前.
pub fn correct_anomaly(mut volume: Volume<Label>) -> Volume<Label> {
    let cnt = volume.replace(ANOMALY_SOURCE, ANOMALY_TARGET);
    if cnt > 0 {
        log::debug!("corrected {cnt} anomalous voxels ({ANOMALY_SOURCE} -> {ANOMALY_TARGET})");
    }
    volume
}

/// 按词表 one-hot 编码标签切片, 结果形状为 (高, 宽, 类别数).
///
/// 任一像素值不在词表中时返回 [`SegError::UnknownLabel`], 不做任何替换或截断.
pub fn one_hot_encode(slice: &Slice<Label>, vocab: &ClassVocabulary) -> SegResult<OneHotSlice> {
    let (h, w) = slice.shape();
    let mut hot = Array3::<u8>::zeros((h, w, vocab.len()));
    for ((r, c), &value) in slice.indexed_iter() {
        let Some(ch) = vocab.index_of(value) else {
            return Err(SegError::UnknownLabel {
                value: value.into(),
                pos: Some((r, c)),
            });
        };
        hot[(r, c, ch)] = 1;
    }
    Ok(OneHotSlice::from_raw(hot))
}

/// 依次编码标注体的每个切片. 任一切片失败则整体失败.
pub fn encode_volume(
    volume: &Volume<Label>,
    vocab: &ClassVocabulary,
) -> SegResult<Vec<OneHotSlice>> {
    volume
        .slice_iter()
        .map(|s| one_hot_encode(&Slice::from(s), vocab))
        .collect()
}

/// 借助 `rayon`, 并行地编码标注体的每个切片. 结果顺序与切片顺序一致.
#[cfg(feature = "rayon")]
pub fn par_encode_volume(
    volume: &Volume<Label>,
    vocab: &ClassVocabulary,
) -> SegResult<Vec<OneHotSlice>> {
    use rayon::iter::{IntoParallelIterator, ParallelIterator};

    volume
        .view()
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(|s| one_hot_encode(&Slice::from(s), vocab))
        .collect()
}

/// 将预测的类别下标映射回词表中的标签值.
///
/// 下标不在 `[0, 类别数)` 内时返回 [`SegError::IndexRange`].
pub fn decode_label_values(
    indices: &Slice<i64>,
    vocab: &ClassVocabulary,
) -> SegResult<Slice<Label>> {
    let mut out = Slice::<Label>::zeros(indices.shape());
    for (pos, &idx) in indices.indexed_iter() {
        out[pos] = vocab.value_at(idx)?;
    }
    Ok(out)
}

/// 诊断谓词: 沿通道轴求和后, 每个位置是否都恰为 1?
///
/// 求和在 `f64` 中进行, 整数通道不会溢出或回绕. 无法转换为 `f64` 的值视为不合法.
pub fn check_one_hot<A: ToPrimitive>(encoded: ArrayView3<'_, A>) -> bool {
    encoded.lanes(Axis(2)).into_iter().all(|lane| {
        lane.iter()
            .map(ToPrimitive::to_f64)
            .sum::<Option<f64>>()
            .is_some_and(|s| s == 1.0)
    })
}

/// 沿通道轴取最大值所在的下标, 并列时取最靠前的通道.
///
/// 输入形状为 (高, 宽, 类别数), 一般是模型输出的逐类别得分或 one-hot 编码.
pub fn argmax<A: PartialOrd>(scores: ArrayView3<'_, A>) -> Slice<i64> {
    let (h, w, _) = scores.dim();
    let mut out = Slice::<i64>::zeros((h, w));
    // lanes 按 (高, 宽) 行优先排列.
    for (i, lane) in scores.lanes(Axis(2)).into_iter().enumerate() {
        let mut best = 0usize;
        for (ch, v) in lane.iter().enumerate().skip(1) {
            if *v > lane[best] {
                best = ch;
            }
        }
        out[(i / w, i % w)] = best as i64;
    }
    out
}

/// 空洞填充: 对每个背景像素, 向上下左右四个方向各搜索至多 `threshold` 个像素 (含自身),
/// 若四个方向都遇到了非背景像素且它们的值相同, 则将该像素填充为该值.
///
/// 按行优先顺序就地推进, 已填充的像素会参与后续像素的判断.
/// 搜索范围截断在图像边界内, 第 0 行与第 0 列也会被搜索到.
pub fn fill_holes(slice: &Slice<Label>, threshold: usize) -> Slice<Label> {
    let mut out = slice.clone();
    let (rows, cols) = out.shape();
    if threshold == 0 {
        return out;
    }
    for u in 0..rows {
        for v in 0..cols {
            if !is_background(out[(u, v)]) {
                continue;
            }
            let (top, bottom) = (u.saturating_sub(threshold - 1), rows.min(u + threshold));
            let (first, last) = (v.saturating_sub(threshold - 1), cols.min(v + threshold));
            let up = first_label(&out, (top..=u).rev().map(|r| (r, v)));
            let down = first_label(&out, (u..bottom).map(|r| (r, v)));
            let left = first_label(&out, (first..=v).rev().map(|c| (u, c)));
            let right = first_label(&out, (v..last).map(|c| (u, c)));
            if let (Some(a), Some(b), Some(c), Some(d)) = (up, down, left, right) {
                if a == b && a == c && a == d {
                    out[(u, v)] = a;
                }
            }
        }
    }
    out
}

/// 沿 `it` 给出的位置找到的第一个非背景像素值.
#[inline]
fn first_label<I: Iterator<Item = Idx2d>>(slice: &Slice<Label>, it: I) -> Option<Label> {
    it.map(|p| slice[p]).find(|p| !is_background(*p))
}

/// 对标签切片做编码前的固定修正: 误标类别 [`MISLABEL_SOURCE`] 替换为 [`MISLABEL_TARGET`].
#[inline]
pub fn fix_mislabel(slice: &Slice<Label>) -> Slice<Label> {
    cast_label(slice, &MISLABEL_SOURCE, &MISLABEL_TARGET)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2, Array3};

    fn vocab() -> ClassVocabulary {
        ClassVocabulary::default()
    }

    fn sample_slice() -> Slice<Label> {
        let labels = DEFAULT_CLASS_LABELS;
        Slice::new(Array2::from_shape_fn((6, 7), |(i, j)| {
            labels[(i * 7 + j) % labels.len()]
        }))
    }

    #[test]
    fn test_vocabulary_construct() {
        let v = ClassVocabulary::new([0, 7, 8]).unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(v.index_of(8), Some(2));
        assert_eq!(v.index_of(9), None);
        assert_eq!(v.value_at(1).unwrap(), 7);
        assert!(ClassVocabulary::new([0, 7, 0]).is_err());
        assert!(ClassVocabulary::new([]).is_err());
        assert_eq!(ClassVocabulary::new(DEFAULT_CLASS_LABELS).unwrap(), vocab());
    }

    #[test]
    fn test_vocabulary_from_volume() {
        let vol = Volume::new(array![[[9u8, 0], [7, 9]], [[0, 45, ], [45, 7]]]);
        let v = ClassVocabulary::from_volume(&vol).unwrap();
        assert_eq!(v.labels(), &[0, 7, 9, 45]);
    }

    #[test]
    fn test_cast_label() {
        let s = Slice::new(array![[1u8, 0], [1, 8]]);
        let c = cast_label(&s, &1, &7);
        assert_eq!(c, Slice::new(array![[7u8, 0], [7, 8]]));
        // 原切片不变.
        assert_eq!(s[(0, 0)], 1);
        assert_eq!(fix_mislabel(&s), c);
    }

    #[test]
    fn test_anomaly_scenario() {
        let mut data = Array3::<u8>::zeros((1, 8, 8));
        data[(0, 3, 4)] = 6;
        let vol = correct_anomaly(Volume::new(data));
        assert_eq!(vol[(0, 3, 4)], 7);

        let hot = one_hot_encode(&vol.to_slice(0), &vocab()).unwrap();
        let raw = hot.view();
        assert_eq!(raw[(3, 4, 1)], 1);
        for ch in (0..9).filter(|&c| c != 1) {
            assert_eq!(raw[(3, 4, ch)], 0);
        }
    }

    #[test]
    fn test_encode_is_one_hot() {
        let hot = one_hot_encode(&sample_slice(), &vocab()).unwrap();
        assert_eq!(hot.shape(), (6, 7));
        assert_eq!(hot.channels(), 9);
        assert!(hot.is_valid());
        assert!(check_one_hot(hot.view()));
    }

    #[test]
    fn test_encode_unknown_label_fails() {
        let mut s = sample_slice();
        s[(2, 3)] = 6;
        match one_hot_encode(&s, &vocab()) {
            Err(SegError::UnknownLabel { value, pos }) => {
                assert_eq!(value, 6);
                assert_eq!(pos, Some((2, 3)));
            }
            other => panic!("expected UnknownLabel, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let s = sample_slice();
        let hot = one_hot_encode(&s, &vocab()).unwrap();
        let decoded = decode_label_values(&hot.class_indices(), &vocab()).unwrap();
        assert_eq!(decoded, s);
    }

    #[test]
    fn test_decode_index_range() {
        let idx = Slice::new(array![[0i64, 8], [9, 1]]);
        assert!(matches!(
            decode_label_values(&idx, &vocab()),
            Err(SegError::IndexRange { index: 9, len: 9 })
        ));
        let idx = Slice::new(array![[-1i64]]);
        assert!(matches!(
            decode_label_values(&idx, &vocab()),
            Err(SegError::IndexRange { index: -1, .. })
        ));
        let ok = decode_label_values(&Slice::new(array![[0i64, 8]]), &vocab()).unwrap();
        assert_eq!(ok, Slice::new(array![[0u8, 68]]));
    }

    #[test]
    fn test_check_one_hot_rejects() {
        let mut data = Array3::<u8>::zeros((2, 2, 3));
        data[(0, 0, 0)] = 1;
        data[(0, 1, 2)] = 1;
        data[(1, 0, 1)] = 1;
        assert!(!check_one_hot(data.view()));
        data[(1, 1, 1)] = 1;
        assert!(check_one_hot(data.view()));
        data[(1, 1, 2)] = 1;
        assert!(!check_one_hot(data.view()));

        let scores = array![[[0.0f32, 1.0]]];
        assert!(check_one_hot(scores.view()));

        // 通道和 257 不应在 u8 中回绕为 1.
        let wide = array![[[200u8, 57]]];
        assert!(!check_one_hot(wide.view()));
        let full = array![[[255u8, 255, 255]]];
        assert!(!check_one_hot(full.view()));
    }

    #[test]
    fn test_argmax() {
        let scores = array![[[0.1f32, 0.7, 0.2], [0.5, 0.5, 0.0]]];
        assert_eq!(argmax(scores.view()), Slice::new(array![[1i64, 0]]));
    }

    #[test]
    fn test_encode_volume() {
        let vol = Volume::new(Array3::from_shape_fn((3, 4, 5), |(z, _, _)| {
            DEFAULT_CLASS_LABELS[z]
        }));
        let encoded = encode_volume(&vol, &vocab()).unwrap();
        assert_eq!(encoded.len(), 3);
        assert_eq!(encoded[2].view()[(0, 0, 2)], 1);

        #[cfg(feature = "rayon")]
        assert_eq!(par_encode_volume(&vol, &vocab()).unwrap(), encoded);
    }

    #[test]
    fn test_fill_holes() {
        let s = Slice::new(array![
            [0u8, 8, 0, 0],
            [8, 0, 8, 0],
            [0, 8, 0, 0],
            [0, 0, 0, 9],
        ]);
        let f = fill_holes(&s, 30);
        assert_eq!(f[(1, 1)], 8);
        // 四周不一致或不完整的位置保持背景.
        assert_eq!(f[(0, 0)], 0);
        assert_eq!(f[(3, 0)], 0);
        assert_eq!(fill_holes(&s, 0), s);
    }
}
