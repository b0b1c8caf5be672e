use super::Slice;
use crate::{Idx2d, Idx3d, SegError, SegResult};
use ndarray::{Array3, ArrayView2, ArrayView3, ArrayViewMut2, Axis};
use num::Zero;
use std::ops::{Index, IndexMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 3D 体数据: 沿第 0 轴 (切片轴) 排列的一组同形状切片.
///
/// 所有切片形状相同由底层 `Array3` 保证.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Volume<T> {
    data: Array3<T>,
}

impl<T> Index<Idx3d> for Volume<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl<T> IndexMut<Idx3d> for Volume<T> {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl<T> From<Array3<T>> for Volume<T> {
    #[inline]
    fn from(data: Array3<T>) -> Self {
        Self { data }
    }
}

impl<T> Volume<T> {
    /// 直接初始化.
    #[inline]
    pub fn new(data: Array3<T>) -> Self {
        Self { data }
    }

    /// 体数据形状 (切片数, 高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 切片形状 (高, 宽).
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 切片个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.shape().0
    }

    /// 是否不含任何切片?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 获取第 `index` 个切片视图.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, index: usize) -> ArrayView2<'_, T> {
        self.data.index_axis(Axis(0), index)
    }

    /// 获取第 `index` 个可变切片视图.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn slice_at_mut(&mut self, index: usize) -> ArrayViewMut2<'_, T> {
        self.data.index_axis_mut(Axis(0), index)
    }

    /// 获取能按升序迭代切片视图的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView2<'_, T>> {
        self.data.axis_iter(Axis(0))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn view(&self) -> ArrayView3<'_, T> {
        self.data.view()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array3<T> {
        self.data
    }

    /// 逐体素映射, 得到新的体数据.
    #[inline]
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Volume<U> {
        Volume {
            data: self.data.map(f),
        }
    }
}

impl<T: Clone> Volume<T> {
    /// 由一组切片拼接成体. 切片形状必须一致, 否则返回 [`SegError::ShapeMismatch`].
    ///
    /// 空输入得到形状为 `(0, 0, 0)` 的体.
    pub fn from_slices<I: IntoIterator<Item = Slice<T>>>(slices: I) -> SegResult<Self> {
        let slices: Vec<Slice<T>> = slices.into_iter().collect();
        let Some(first) = slices.first() else {
            return Ok(Self {
                data: Array3::from_shape_vec((0, 0, 0), Vec::new())?,
            });
        };
        let (h, w) = first.shape();
        let mut buf = Vec::with_capacity(slices.len() * h * w);
        for s in slices.iter() {
            if s.shape() != (h, w) {
                let (sh, sw) = s.shape();
                return Err(SegError::ShapeMismatch {
                    expected: vec![h, w],
                    got: vec![sh, sw],
                });
            }
            buf.extend(s.iter().cloned());
        }
        Ok(Self {
            data: Array3::from_shape_vec((slices.len(), h, w), buf)?,
        })
    }

    /// 克隆第 `index` 个切片.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn to_slice(&self, index: usize) -> Slice<T> {
        Slice::from(self.slice_at(index))
    }

    /// 拆分为拥有所有权的切片序列.
    pub fn to_slices(&self) -> Vec<Slice<T>> {
        self.slice_iter().map(Slice::from).collect()
    }

    /// 交换第 0 轴与第 2 轴, 结果为标准 (行优先) 内存布局.
    pub fn swapped_first_last(&self) -> Self {
        let mut view = self.data.view();
        view.swap_axes(0, 2);
        Self {
            data: view.as_standard_layout().into_owned(),
        }
    }

    /// 保留从第 `start` 个切片开始的所有切片.
    ///
    /// `start` 超过切片个数时结果为空体.
    pub fn tail_from(&self, start: usize) -> Self {
        let start = start.min(self.len());
        Self {
            data: self.data.slice_axis(Axis(0), (start..).into()).to_owned(),
        }
    }
}

impl<T: Clone + Zero> Volume<T> {
    /// 全零体.
    #[inline]
    pub fn zeros(shape: Idx3d) -> Self {
        Self {
            data: Array3::zeros(shape),
        }
    }
}

impl<T: PartialEq> Volume<T> {
    /// 将体中值为 `old` 的体素全部替换为 `new`.
    ///
    /// 返回总共成功替换的个数.
    pub fn replace(&mut self, old: T, new: T) -> usize
    where
        T: Clone,
    {
        let mut cnt = 0usize;
        self.data
            .iter_mut()
            .filter(|v| **v == old)
            .for_each(|v| {
                cnt += 1;
                *v = new.clone();
            });
        cnt
    }
}
