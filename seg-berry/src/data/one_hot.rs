use super::Slice;
use crate::Idx2d;
use ndarray::{Array3, ArrayView3, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// one-hot 编码后的标签切片, 形状为 (高, 宽, 类别数).
///
/// 由 [`crate::label::one_hot_encode`] 构造的实例总满足 one-hot 不变量:
/// 每个 (行, 列) 上恰有一个通道为 1. 通过 [`OneHotSlice::from_raw`]
/// 构造的实例不做检查, 需要时用 [`OneHotSlice::is_valid`] 验证.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct OneHotSlice {
    data: Array3<u8>,
}

impl OneHotSlice {
    /// 直接初始化, 不检查 one-hot 不变量.
    #[inline]
    pub fn from_raw(data: Array3<u8>) -> Self {
        Self { data }
    }

    /// 空间形状 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        let (h, w, _) = self.data.dim();
        (h, w)
    }

    /// 通道 (类别) 个数.
    #[inline]
    pub fn channels(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// 获得底层数据的一份不可变 shallow copy.
    #[inline]
    pub fn view(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array3<u8> {
        self.data
    }

    /// 是否满足 one-hot 不变量?
    #[inline]
    pub fn is_valid(&self) -> bool {
        crate::label::check_one_hot(self.data.view())
    }

    /// 每个位置上取值为 1 的通道下标. 若某位置不满足不变量, 取最大值所在的第一个通道.
    #[inline]
    pub fn class_indices(&self) -> Slice<i64> {
        crate::label::argmax(self.data.view())
    }
}
