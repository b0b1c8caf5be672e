//! 流水线配置.

use crate::dataset::{home_dataset_dir_with, PrepareOptions, SplitSpec};
use crate::label::ClassVocabulary;
use crate::reconstruct::BatchOptions;
use crate::SegResult;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `$HOME/dataset/{sub}`; 取不到用户主目录时为相对路径 `dataset/{sub}`.
fn dataset_dir(sub: &str) -> PathBuf {
    home_dataset_dir_with([sub]).unwrap_or_else(|| PathBuf::from("dataset").join(sub))
}

/// 训练集准备与批量预测共用的配置.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// trial 目录所在的根目录 (训练).
    pub train_dir: PathBuf,

    /// 待预测 trial 目录所在的根目录.
    pub predict_dir: PathBuf,

    /// 参考 header 所在目录. `None` 时沿用原始扫描的 header.
    pub nii_dir: Option<PathBuf>,

    /// 输出目录.
    pub save_dir: PathBuf,

    /// 随机种子. `None` 时每次运行使用不同的随机源.
    pub seed: Option<u64>,

    /// 是否额外加载增强数据并合并进训练集.
    pub load_augmented: bool,

    /// 类别词表.
    pub vocab: ClassVocabulary,

    /// 划分参数.
    pub split: SplitSpec,

    /// 逐 trial 预处理选项.
    pub prepare: PrepareOptions,

    /// 批量预测选项.
    pub batch: BatchOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            train_dir: dataset_dir("train"),
            predict_dir: dataset_dir("predict"),
            nii_dir: None,
            save_dir: dataset_dir("output"),
            seed: None,
            load_augmented: false,
            vocab: ClassVocabulary::default(),
            split: SplitSpec::default(),
            prepare: PrepareOptions::default(),
            batch: BatchOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// 在任何工作开始之前检查配置.
    #[inline]
    pub fn validate(&self) -> SegResult<()> {
        self.split.validate()
    }

    /// 按配置的种子创建随机源.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        }
    }
}
