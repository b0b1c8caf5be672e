//! 通用常量. 这些值都是领域标定值, 不是计算得到的.

use crate::Label;

/// 类别标签值.
pub mod labels {
    use crate::Label;

    /// 默认类别词表. 顺序即 one-hot 通道顺序.
    pub const DEFAULT_CLASS_LABELS: [Label; 9] = [0, 7, 8, 9, 45, 51, 52, 53, 68];

    /// 背景的像素值.
    pub const BACKGROUND: Label = 0;

    /// 标注中已知的异常值. 加载后会整体替换为 [`ANOMALY_TARGET`].
    pub const ANOMALY_SOURCE: Label = 6;

    /// 异常值 [`ANOMALY_SOURCE`] 的修正目标.
    pub const ANOMALY_TARGET: Label = 7;

    /// 已知误标的类别. 编码前逐切片替换为 [`MISLABEL_TARGET`].
    pub const MISLABEL_SOURCE: Label = 1;

    /// 误标类别 [`MISLABEL_SOURCE`] 的修正目标.
    pub const MISLABEL_TARGET: Label = 7;
}

/// 规范训练尺寸 (小).
pub const CANONICAL_SIZE_SMALL: usize = 512;

/// 规范训练尺寸 (大). 当任一扫描的次大维度超过 [`CANONICAL_SIZE_SMALL`] 时使用.
pub const CANONICAL_SIZE_LARGE: usize = 1024;

/// 临床边界: 切片轴末端的这么多个切片被视为关注区域.
pub const CLINICAL_MARGIN: usize = 650;

/// 空洞填充时向四个方向搜索的默认距离 (像素).
pub const FILL_THRESHOLD: usize = 30;

/// 文件与目录名约定.
pub mod names {
    /// 原始扫描文件名需包含的标记.
    pub const RAW_MARKER: &str = "vol";

    /// 标注文件名需包含的标记.
    pub const SEG_MARKER: &str = "seg";

    /// 参考 header 所在 nii 文件名需包含的标记.
    pub const REFERENCE_MARKER: &str = "volume";

    /// trial 目录名 (小写后) 需包含的标记.
    pub const TRIAL_MARKER: &str = "trial";

    /// 增强数据 trial 目录名的后缀 (小写后比较).
    pub const AUGMENTED_SUFFIXES: [&str; 2] = ["_ed", "_rot"];

    /// 预测结果文件名后缀 (不含扩展名).
    pub const PRED_SEG_SUFFIX: &str = "_pred_seg";

    /// 预测结果文件扩展名.
    pub const NII_EXT: &str = ".nii";
}

/// 由规范尺寸选择规则得到的尺寸.
///
/// `max_dim` 不超过 [`CANONICAL_SIZE_SMALL`] 时为小尺寸, 否则为大尺寸.
#[inline]
pub const fn canonical_size(max_dim: usize) -> usize {
    if max_dim <= CANONICAL_SIZE_SMALL {
        CANONICAL_SIZE_SMALL
    } else {
        CANONICAL_SIZE_LARGE
    }
}

/// 像素是否是背景?
#[inline]
pub const fn is_background(p: Label) -> bool {
    p == labels::BACKGROUND
}
