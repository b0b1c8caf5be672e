use crate::{Idx2d, Idx3d};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 扫描在任何规范化之前的几何信息.
///
/// `dims` 按文件原生轴序记录 (第 0 轴为切片轴). `reoriented` 记录加载时是否交换了首尾两轴,
/// 重建时据此决定切片应裁剪回的形状以及是否需要再交换一次.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OriginalGeometry {
    /// 原始形状 (切片数, 高, 宽).
    pub dims: Idx3d,

    /// 加载时是否重定向过.
    pub reoriented: bool,
}

impl OriginalGeometry {
    /// 初始化.
    #[inline]
    pub fn new(dims: Idx3d, reoriented: bool) -> Self {
        Self { dims, reoriented }
    }

    /// 加载 (以及可能的重定向) 之后, pad/crop 之前的切片个数.
    #[inline]
    pub fn loaded_len(&self) -> usize {
        let (a, _, c) = self.dims;
        if self.reoriented {
            c
        } else {
            a
        }
    }

    /// 加载 (以及可能的重定向) 之后, pad/crop 之前的切片形状 (高, 宽).
    ///
    /// 重定向交换了第 0 轴与第 2 轴, 因此切片形状为 `(dims.1, dims.0)`;
    /// 否则为 `(dims.1, dims.2)`.
    #[inline]
    pub fn loaded_slice_shape(&self) -> Idx2d {
        let (a, b, c) = self.dims;
        if self.reoriented {
            (b, a)
        } else {
            (b, c)
        }
    }
}
