//! 训练集 / 验证集 / 测试集的随机划分.

use crate::{OneHotSlice, SegError, SegResult, Slice};
use ndarray::{concatenate, Array4, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 划分参数 (百分比).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SplitSpec {
    /// 训练集占比.
    pub train: u32,

    /// 验证集占比.
    pub val: u32,

    /// 测试集占比.
    pub test: u32,

    /// 参与划分的数据占全部数据的比例.
    pub keep: u32,

    /// 训练集个数上限, 0 表示不限.
    pub total_keep: usize,
}

impl Default for SplitSpec {
    fn default() -> Self {
        Self {
            train: 60,
            val: 10,
            test: 30,
            keep: 100,
            total_keep: 0,
        }
    }
}

impl SplitSpec {
    /// 检查百分比: 三者之和必须为 100, 且 `keep` 不超过 100.
    pub fn validate(&self) -> SegResult<()> {
        let sum = self.train + self.val + self.test;
        if sum != 100 {
            return Err(SegError::config(format!(
                "split percentages {}/{}/{} sum to {sum}, not 100",
                self.train, self.val, self.test
            )));
        }
        if self.keep > 100 {
            return Err(SegError::config(format!(
                "keep percentage {} exceeds 100",
                self.keep
            )));
        }
        Ok(())
    }

    /// 参与划分的数据个数: `floor(keep / 100 * n)`.
    #[inline]
    pub fn pool_size(&self, n: usize) -> usize {
        n * self.keep as usize / 100
    }

    /// 按最大余数法计算三个子集的大小 (截断训练集之前), 总和恰为 `pool`.
    ///
    /// 每个子集先取 `floor(pool * pct / 100)`, 剩余的名额逐个分给小数部分最大的子集;
    /// 小数部分相同时优先百分比较大者, 再相同时优先靠前者.
    pub fn subset_sizes(&self, pool: usize) -> [usize; 3] {
        let pcts = [self.train, self.val, self.test].map(|p| p as usize);
        let mut sizes = pcts.map(|p| pool * p / 100);
        let rems = pcts.map(|p| pool * p % 100);
        let leftover = pool - sizes.iter().sum::<usize>();

        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| {
            rems[b]
                .cmp(&rems[a])
                .then(pcts[b].cmp(&pcts[a]))
                .then(a.cmp(&b))
        });
        for &i in order.iter().take(leftover) {
            sizes[i] += 1;
        }
        sizes
    }
}

/// 一个子集: 原始数据 `(n, 高, 宽, 1)` 与 one-hot 标签 `(n, 高, 宽, 类别数)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Subset {
    /// 原始数据.
    pub raw: Array4<f32>,

    /// one-hot 标签.
    pub labels: Array4<u8>,

    /// 每个样本在源数据中的下标.
    pub indices: Vec<usize>,
}

impl Subset {
    /// 样本个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// 将全部样本按原顺序堆叠为一个子集.
    ///
    /// 长度不一致时返回 [`SegError::Configuration`], 没有样本时返回 [`SegError::EmptyInput`].
    pub fn stack(raw: &[Slice<f32>], labels: &[OneHotSlice]) -> SegResult<Self> {
        if raw.len() != labels.len() {
            return Err(SegError::config(format!(
                "{} raw slices but {} label slices",
                raw.len(),
                labels.len()
            )));
        }
        if raw.is_empty() {
            return Err(SegError::empty("", "nothing to stack"));
        }
        Self::gather(raw, labels, (0..raw.len()).collect())
    }

    /// 从源数据中按 `indices` 取出样本.
    fn gather(raw: &[Slice<f32>], labels: &[OneHotSlice], indices: Vec<usize>) -> SegResult<Self> {
        let (h, w) = raw[0].shape();
        let c = labels[0].channels();
        let mut raw_buf = Vec::with_capacity(indices.len() * h * w);
        let mut label_buf = Vec::with_capacity(indices.len() * h * w * c);
        for &i in indices.iter() {
            let (r, l) = (&raw[i], &labels[i]);
            let (rh, rw) = r.shape();
            let (lh, lw) = l.shape();
            if (rh, rw, lh, lw, l.channels()) != (h, w, h, w, c) {
                return Err(SegError::ShapeMismatch {
                    expected: vec![h, w, h, w, c],
                    got: vec![rh, rw, lh, lw, l.channels()],
                });
            }
            raw_buf.extend(r.iter().copied());
            label_buf.extend(l.view().iter().copied());
        }
        let n = indices.len();
        Ok(Self {
            raw: Array4::from_shape_vec((n, h, w, 1), raw_buf)?,
            labels: Array4::from_shape_vec((n, h, w, c), label_buf)?,
            indices,
        })
    }
}

/// 划分结果.
#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    /// 训练集.
    pub train: Subset,

    /// 验证集.
    pub val: Subset,

    /// 测试集.
    pub test: Subset,
}

impl Partition {
    /// 按 `(名称, 子集)` 顺序遍历三个子集.
    pub fn named(&self) -> [(&'static str, &Subset); 3] {
        [("train", &self.train), ("val", &self.val), ("test", &self.test)]
    }
}

/// 将 `raw` 与 `labels` 随机划分为互不重叠的三个子集.
///
/// 先从 `0..pool` 中取一个均匀随机排列, 再按 [`SplitSpec::subset_sizes`] 依次切出
/// 训练集, 验证集, 测试集. `total_keep` 只截断训练集.
///
/// 长度不一致或百分比非法时返回 [`SegError::Configuration`];
/// 没有任何数据时返回 [`SegError::EmptyInput`].
pub fn split<R: Rng + ?Sized>(
    raw: &[Slice<f32>],
    labels: &[OneHotSlice],
    spec: &SplitSpec,
    rng: &mut R,
) -> SegResult<Partition> {
    if raw.len() != labels.len() {
        return Err(SegError::config(format!(
            "{} raw slices but {} label slices",
            raw.len(),
            labels.len()
        )));
    }
    spec.validate()?;
    if raw.is_empty() {
        return Err(SegError::empty("", "nothing to split"));
    }

    let pool = spec.pool_size(raw.len());
    let mut perm: Vec<usize> = (0..pool).collect();
    perm.shuffle(rng);

    let [n_train, n_val, n_test] = spec.subset_sizes(pool);
    let mut rest = perm.into_iter();
    let mut train: Vec<usize> = rest.by_ref().take(n_train).collect();
    let val: Vec<usize> = rest.by_ref().take(n_val).collect();
    let test: Vec<usize> = rest.take(n_test).collect();
    if spec.total_keep > 0 {
        train.truncate(spec.total_keep);
    }
    log::info!(
        "split {pool} of {} slices: train {}, val {}, test {}",
        raw.len(),
        train.len(),
        val.len(),
        test.len()
    );

    Ok(Partition {
        train: Subset::gather(raw, labels, train)?,
        val: Subset::gather(raw, labels, val)?,
        test: Subset::gather(raw, labels, test)?,
    })
}

/// 合并基础子集与增强子集: 先拼接, 再重新打乱合并后的顺序.
///
/// 合并后 `indices` 为样本在 "基础在前, 增强在后" 的拼接顺序中的下标.
pub fn merge_augmented<R: Rng + ?Sized>(
    base: &Subset,
    augmented: &Subset,
    rng: &mut R,
) -> SegResult<Subset> {
    let raw = concatenate(Axis(0), &[base.raw.view(), augmented.raw.view()])?;
    let labels = concatenate(Axis(0), &[base.labels.view(), augmented.labels.view()])?;

    let mut order: Vec<usize> = (0..raw.len_of(Axis(0))).collect();
    order.shuffle(rng);
    Ok(Subset {
        raw: raw.select(Axis(0), &order),
        labels: labels.select(Axis(0), &order),
        indices: order,
    })
}
