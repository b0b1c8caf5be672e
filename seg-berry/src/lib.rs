#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 将按 trial 组织的 3D 断层扫描 (nii) 与体素级类别标注转换为模型可直接消费的训练集,
//! 并在推理后把逐切片的预测结果还原为与原始扫描几何一致的 3D 体数据.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 数据流
//!
//! ```text
//! dataset::loader -> normalize (pad/crop/reorient) -> label (one-hot) -> dataset::partition
//!     -> (外部模型) -> reconstruct (decode + 逆几何变换) -> persist
//! ```
//!
//! # 注意
//!
//! 1. 模型本身、训练循环、权重持久化都不属于该 crate. 推理结果通过
//!   [`reconstruct::SlicePredictor`] 接入.
//! 2. 与 `panic` 式的断言不同, 所有形状/标签不变量的破坏都以 [`SegError`] 返回.
//!
//! # 坐标约定
//!
//! [`Volume`] 的第 0 轴是切片 (section) 轴, 每个切片的形状为 `(H, W)`.
//! 从 nii 文件读取时保留文件原生轴序 `[x, y, z]`; 经过 [`normalize::reorient`]
//! (交换首尾两轴) 之后即为常见的 `(z, H, W)` 排布.
//!
//! # 开发计划
//!
//! ### 几何规范化与逆变换 ✅
//!
//! 对称 pad/crop (floor 在上/左, ceil 在下/右), 首尾轴交换. 实现位于 `normalize`.
//!
//! ### 标签编码 ✅
//!
//! 异常值修正, one-hot 编码与解码. 实现位于 `label`.
//!
//! ### 数据集划分 ✅
//!
//! 可注入随机源, 最大余数法分配各子集大小. 实现位于 `dataset::partition`.
//!
//! ### 预测体重建 ✅
//!
//! 临床边界以下切片置空, 裁剪与重定向的逆变换. 实现位于 `reconstruct`.
//!
//! ### 批量预测 ✅
//!
//! 已有结果跳过, 单个 trial 失败不影响其他 trial. 实现位于 `reconstruct::predict_all`.
//!
//! ### 多通道原始数据
//!
//! 目前原始切片总是单通道 `(H, W, 1)`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 标签体素值.
pub type Label = u8;

/// 基础数据结构: 切片, 体, one-hot 切片, 原始几何信息.
mod data;

pub use data::{OneHotSlice, OriginalGeometry, Slice, Volume};

pub mod config;
pub mod consts;
pub mod dataset;
pub mod label;
pub mod normalize;
pub mod persist;
pub mod prelude;
pub mod reconstruct;

mod error;

pub use error::{SegError, SegResult};
