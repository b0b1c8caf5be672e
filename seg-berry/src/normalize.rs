//! 几何规范化与逆变换.
//!
//! 所有 pad/crop 都是对称的: 差值为奇数时, 较小的一半 (`floor`) 作用于上/左,
//! 较大的一半 (`ceil`) 作用于下/右. 因此对于同一对 (原尺寸, 目标尺寸),
//! [`crop`] 是 [`pad`] 的精确左逆.

use crate::{Idx2d, SegError, SegResult, Slice, Volume};
use ndarray::{s, Array2};
use num::Zero;

pub use crate::consts::canonical_size;

/// 把差值 `delta` 拆成 `(floor(delta / 2), ceil(delta / 2))`.
#[inline]
pub const fn split_amount(delta: usize) -> (usize, usize) {
    let lo = delta / 2;
    (lo, delta - lo)
}

/// 从 `from` pad 到 `to` 时四条边的 pad 量: `((上, 下), (左, 右))`.
///
/// 若某一维 `to < from`, 返回 `None`.
pub fn pad_amounts((h, w): Idx2d, (th, tw): Idx2d) -> Option<(Idx2d, Idx2d)> {
    let dh = th.checked_sub(h)?;
    let dw = tw.checked_sub(w)?;
    Some((split_amount(dh), split_amount(dw)))
}

/// 将切片用 0 对称填充为 `(target_h, target_w)`.
///
/// 目标任一维小于原尺寸时返回 [`SegError::Geometry`].
pub fn pad<T: Clone + Zero>(slice: &Slice<T>, target: Idx2d) -> SegResult<Slice<T>> {
    let from = slice.shape();
    let Some(((top, _), (left, _))) = pad_amounts(from, target) else {
        return Err(SegError::Geometry {
            op: "pad",
            from,
            to: target,
        });
    };
    let (h, w) = from;
    let mut out = Array2::<T>::zeros(target);
    out.slice_mut(s![top..top + h, left..left + w])
        .assign(&slice.view());
    Ok(Slice::new(out))
}

/// 将切片对称裁剪为 `(target_h, target_w)`.
///
/// 目标任一维大于原尺寸时返回 [`SegError::Geometry`].
pub fn crop<T: Clone>(slice: &Slice<T>, target: Idx2d) -> SegResult<Slice<T>> {
    let from = slice.shape();
    // 裁剪量与从 target pad 回 from 的量相同.
    let Some(((top, _), (left, _))) = pad_amounts(target, from) else {
        return Err(SegError::Geometry {
            op: "crop",
            from,
            to: target,
        });
    };
    let (th, tw) = target;
    Ok(Slice::from(
        slice
            .view()
            .slice_move(s![top..top + th, left..left + tw]),
    ))
}

/// 逐维地把切片调整到 `target`: 较小的维度 pad, 较大的维度 crop.
///
/// 当两维都不大于目标时等价于 [`pad`], 都不小于目标时等价于 [`crop`].
pub fn fit<T: Clone + Zero>(slice: &Slice<T>, target: Idx2d) -> SegResult<Slice<T>> {
    let (h, w) = slice.shape();
    let (th, tw) = target;
    let padded = pad(slice, (h.max(th), w.max(tw)))?;
    crop(&padded, target)
}

/// [`fit`] 的逆: 将规范化后的切片调整回原始形状 `original`.
///
/// 规范化时只做了 pad 的维度会被精确还原; 做了 crop 的维度以 0 填回被裁掉的部分.
#[inline]
pub fn restore<T: Clone + Zero>(slice: &Slice<T>, original: Idx2d) -> SegResult<Slice<T>> {
    fit(slice, original)
}

/// 交换体数据的第 0 轴与第 2 轴. 该操作是对合的: 连续两次得到原体.
#[inline]
pub fn reorient<T: Clone>(volume: &Volume<T>) -> Volume<T> {
    volume.swapped_first_last()
}
