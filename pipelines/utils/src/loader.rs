//! 对 `seg-berry` 配置的更一层封装. 从环境变量或用户主目录得到各个目录.

use seg_berry::config::PipelineConfig;
use seg_berry::dataset::home_dataset_dir_with;
use std::env;
use std::path::PathBuf;

/// 训练 trial 根目录环境变量.
pub const TRAIN_DIR_ENV: &str = "SEG_TRAIN_DIR";

/// 待预测 trial 根目录环境变量.
pub const PREDICT_DIR_ENV: &str = "SEG_PREDICT_DIR";

/// 参考 header 目录环境变量.
pub const NII_DIR_ENV: &str = "SEG_NII_DIR";

/// 输出目录环境变量.
pub const SAVE_DIR_ENV: &str = "SEG_SAVE_DIR";

/// 外部模型输出 (逐 trial 类别下标 npy) 目录环境变量.
pub const CLASS_MAP_DIR_ENV: &str = "SEG_CLASS_MAP_DIR";

/// 随机种子环境变量.
pub const SEED_ENV: &str = "SEG_SEED";

/// 非空的环境变量值.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// 1. 若 `var` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/{sub}`; 取不到主目录时为 `dataset/{sub}`.
pub fn dir_or_home(var: Option<String>, sub: &str) -> PathBuf {
    match var {
        Some(d) => PathBuf::from(d),
        None => home_dataset_dir_with([sub]).unwrap_or_else(|| PathBuf::from("dataset").join(sub)),
    }
}

/// 获取训练 trial 根目录: `$SEG_TRAIN_DIR` 或 `$HOME/dataset/train`.
pub fn train_dir_from_env_or_home() -> PathBuf {
    dir_or_home(non_empty_var(TRAIN_DIR_ENV), "train")
}

/// 获取待预测 trial 根目录: `$SEG_PREDICT_DIR` 或 `$HOME/dataset/predict`.
pub fn predict_dir_from_env_or_home() -> PathBuf {
    dir_or_home(non_empty_var(PREDICT_DIR_ENV), "predict")
}

/// 获取输出目录: `$SEG_SAVE_DIR` 或 `$HOME/dataset/output`.
pub fn save_dir_from_env_or_home() -> PathBuf {
    dir_or_home(non_empty_var(SAVE_DIR_ENV), "output")
}

/// 获取外部模型输出目录: `$SEG_CLASS_MAP_DIR` 或 `$HOME/dataset/class_maps`.
pub fn class_map_dir_from_env_or_home() -> PathBuf {
    dir_or_home(non_empty_var(CLASS_MAP_DIR_ENV), "class_maps")
}

/// 获取参考 header 目录 `$SEG_NII_DIR`. 未设置时为 `None`.
pub fn nii_dir_from_env() -> Option<PathBuf> {
    non_empty_var(NII_DIR_ENV).map(PathBuf::from)
}

/// 解析随机种子. 无法解析时为 `None`.
pub fn parse_seed(s: Option<&str>) -> Option<u64> {
    s.and_then(|s| s.trim().parse().ok())
}

/// 获取随机种子 `$SEG_SEED`.
pub fn seed_from_env() -> Option<u64> {
    let raw = non_empty_var(SEED_ENV);
    let seed = parse_seed(raw.as_deref());
    if raw.is_some() && seed.is_none() {
        log::warn!("ignoring unparsable ${SEED_ENV}");
    }
    seed
}

/// 在默认配置上应用环境变量.
pub fn config_from_env() -> PipelineConfig {
    PipelineConfig {
        train_dir: train_dir_from_env_or_home(),
        predict_dir: predict_dir_from_env_or_home(),
        nii_dir: nii_dir_from_env(),
        save_dir: save_dir_from_env_or_home(),
        seed: seed_from_env(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_or_home() {
        assert_eq!(dir_or_home(Some("/data/x".into()), "train"), PathBuf::from("/data/x"));
        assert!(dir_or_home(None, "train").ends_with("dataset/train"));
    }

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed(Some("42")), Some(42));
        assert_eq!(parse_seed(Some(" 7 ")), Some(7));
        assert_eq!(parse_seed(Some("-1")), None);
        assert_eq!(parse_seed(None), None);
    }
}
