//! 运行时错误.

use crate::Idx2d;
use std::path::PathBuf;
use thiserror::Error;

/// 预处理 / 重建过程中的运行时错误.
#[derive(Debug, Error)]
pub enum SegError {
    /// 划分比例非法, 或扫描与标签数量不一致. 在任何划分工作开始前报告.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 标签切片中出现了词表之外的值. 不会被强制替换为任何默认类别.
    #[error("label value {value} at {pos:?} is not in the class vocabulary")]
    UnknownLabel {
        /// 出现的值. 以 `i64` 保存, 以便描述加载时超出标签类型范围的值.
        value: i64,
        /// 切片内位置 (高, 宽). 整体加载时无法定位时为 `None`.
        pos: Option<Idx2d>,
    },

    /// 预测类别索引越界.
    #[error("class index {index} is out of range [0, {len})")]
    IndexRange {
        /// 越界的索引.
        index: i64,
        /// 词表长度.
        len: usize,
    },

    /// pad 的目标小于原尺寸, 或 crop 的目标大于原尺寸.
    #[error("cannot {op} slice of shape {from:?} to {to:?}")]
    Geometry {
        /// `"pad"` 或 `"crop"`.
        op: &'static str,
        /// 原形状 (高, 宽).
        from: Idx2d,
        /// 目标形状 (高, 宽).
        to: Idx2d,
    },

    /// 没有找到 trial 目录, 或 trial 目录中没有可识别的文件.
    #[error("no usable input in {}: {reason}", .path.display())]
    EmptyInput {
        /// 相关目录.
        path: PathBuf,
        /// 原因.
        reason: String,
    },

    /// 形状不一致 (如同一体中切片大小不同, 扫描与标注形状不同).
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// 期望形状.
        expected: Vec<usize>,
        /// 实际形状.
        got: Vec<usize>,
    },

    /// nii 文件读写错误.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// `ndarray` 形状错误.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    /// npy 写入错误.
    #[error(transparent)]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    /// npy 读取错误.
    #[error(transparent)]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    /// npz 写入错误.
    #[error(transparent)]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),

    /// 其他底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SegError {
    /// 构造配置错误.
    #[inline]
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 构造空输入错误.
    #[inline]
    pub(crate) fn empty(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::EmptyInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 该错误是否仅影响单个 trial (批处理时可跳过该 trial 继续)?
    pub fn is_trial_local(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}

/// 预处理 / 重建运行时结果.
pub type SegResult<T> = Result<T, SegError>;
