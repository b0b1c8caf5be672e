//! 预测体重建: 读取外部模型给出的逐 trial 类别下标 (`<trial>.npy`),
//! 还原为与原始扫描几何一致的 `<trial>_pred_seg.nii`. 已存在的结果会被跳过.
//!
//! 目录见 `utils::loader`, 日志级别见 `$SEG_LOG`.

mod runner;

use std::process::ExitCode;

fn main() -> ExitCode {
    utils::init_logger();
    let cfg = utils::loader::config_from_env();
    let class_maps = utils::loader::class_map_dir_from_env_or_home();
    utils::sep();
    match runner::run(&cfg, &class_maps) {
        Ok(report) => {
            utils::sep();
            println!(
                "written: {}, skipped: {}, failed: {}",
                report.written.len(),
                report.skipped.len(),
                report.failed.len()
            );
            for (name, reason) in report.failed.iter() {
                println!("  {name}: {reason}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
