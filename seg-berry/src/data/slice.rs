//! 二维切片对象.

use crate::Idx2d;
use ndarray::iter::{Iter, IterMut};
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Ix2};
use num::Zero;
use std::ops::{Index, IndexMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 拥有所有权的二维切片 (高 × 宽).
///
/// 扫描切片一般为 `Slice<f32>`, 标签切片为 `Slice<Label>`, 预测的类别索引为 `Slice<i64>`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Slice<T> {
    data: Array2<T>,
}

impl<T> Index<Idx2d> for Slice<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<T> IndexMut<Idx2d> for Slice<T> {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl<T> From<Array2<T>> for Slice<T> {
    #[inline]
    fn from(data: Array2<T>) -> Self {
        Self { data }
    }
}

impl<T: Clone> From<ArrayView2<'_, T>> for Slice<T> {
    #[inline]
    fn from(view: ArrayView2<'_, T>) -> Self {
        Self {
            data: view.to_owned(),
        }
    }
}

impl<T> Slice<T> {
    /// 直接初始化.
    #[inline]
    pub fn new(data: Array2<T>) -> Self {
        Self { data }
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        let &[h, w] = self.data.shape() else {
            unreachable!()
        };
        (h, w)
    }

    /// 获得图像的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 获得图像的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 图像的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (h, w) = self.shape();
        h * w
    }

    /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&T> {
        self.data.get(pos)
    }

    /// 获取可以迭代图像像素的迭代器 (行优先).
    #[inline]
    pub fn iter(&self) -> Iter<'_, T, Ix2> {
        self.data.iter()
    }

    /// 获取可以迭代并修改图像像素的迭代器.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, T, Ix2> {
        self.data.iter_mut()
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, 像素值)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &T)> {
        self.data.indexed_iter()
    }

    /// 获得底层数据的一份不可变 shallow copy.
    #[inline]
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// 获得底层数据的一份可变 shallow copy.
    #[inline]
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        self.data.view_mut()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<T> {
        self.data
    }

    /// 逐像素映射, 得到新的切片.
    #[inline]
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Slice<U> {
        Slice {
            data: self.data.map(f),
        }
    }
}

impl<T: Clone + Zero> Slice<T> {
    /// 全零切片.
    #[inline]
    pub fn zeros(shape: Idx2d) -> Self {
        Self {
            data: Array2::zeros(shape),
        }
    }
}

impl<T: Zero> Slice<T> {
    /// 该图是否为全零图?
    #[inline]
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(Zero::is_zero)
    }
}

impl<T: PartialEq> Slice<T> {
    /// 统计图像中值为 `value` 的像素总个数.
    #[inline]
    pub fn count(&self, value: &T) -> usize {
        self.data.iter().filter(|&p| p == value).count()
    }
}

#[cfg(test)]
mod tests {
    use super::Slice;
    use ndarray::array;

    #[test]
    fn test_shape_and_index() {
        let mut s = Slice::new(array![[1u8, 2, 3], [4, 5, 6]]);
        assert_eq!(s.shape(), (2, 3));
        assert_eq!(s.size(), 6);
        assert_eq!(s[(1, 2)], 6);
        s[(1, 2)] = 9;
        assert_eq!(s.get((1, 2)), Some(&9));
        assert_eq!(s.get((2, 0)), None);
        assert_eq!(s.count(&9), 1);
    }

    #[test]
    fn test_blank() {
        assert!(Slice::<f32>::zeros((3, 4)).is_blank());
        assert!(!Slice::new(array![[0.0f32, 0.5]]).is_blank());
    }
}
