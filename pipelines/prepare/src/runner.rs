//! 程序运行函数.

use seg_berry::config::PipelineConfig;
use seg_berry::dataset::{
    discover_trials, load_trials, merge_augmented, split, training_size, Subset, TrialFilter,
};
use seg_berry::persist::write_partition;
use seg_berry::SegResult;
use std::fs;
use std::path::PathBuf;

/// 实际运行. 返回写出的文件.
pub fn run(cfg: &PipelineConfig) -> SegResult<Vec<PathBuf>> {
    cfg.validate()?;
    let root = cfg.train_dir.as_path();
    let filter = if cfg.load_augmented {
        TrialFilter::All
    } else {
        TrialFilter::Original
    };
    let trials = discover_trials(root, filter)?;
    // 原始与增强数据使用同一个规范尺寸.
    let size = training_size(trials.iter().map(|t| &t.path))?;
    let (augmented, base): (Vec<_>, Vec<_>) = trials.into_iter().partition(|t| t.augmented);

    let mut rng = cfg.rng();
    let base = load_trials(root, base, size, &cfg.vocab, &cfg.prepare)?;
    let mut partition = split(&base.raw, &base.labels, &cfg.split, &mut rng)?;

    if !augmented.is_empty() {
        let aug = load_trials(root, augmented, size, &cfg.vocab, &cfg.prepare)?;
        let pool = Subset::stack(&aug.raw, &aug.labels)?;
        log::info!("merging {} augmented slices into train", pool.len());
        partition.train = merge_augmented(&partition.train, &pool, &mut rng)?;
    }

    fs::create_dir_all(&cfg.save_dir)?;
    write_partition(&cfg.save_dir, &partition)
}
