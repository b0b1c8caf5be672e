//! 数据集操作: trial 发现与加载, 逐 trial 规范化/编码, 训练集划分.

use std::path::{Path, PathBuf};

pub mod loader;
pub mod partition;
pub mod prepare;

pub use loader::{
    discover_trials, find_training_dim, training_size, TrialDir, TrialFilter, TrialScan,
};
pub use partition::{merge_augmented, split, Partition, SplitSpec, Subset};
pub use prepare::{
    load_all, load_trials, prepare_trial, LoadedDataset, PrepareOptions, PreparedTrial,
};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}
