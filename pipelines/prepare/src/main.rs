//! 训练集准备: 发现 trial, 规范化与编码, 划分, 写出六个 npy 文件.
//!
//! 目录与随机种子见 `utils::loader`, 日志级别见 `$SEG_LOG`.

mod runner;

use std::process::ExitCode;

fn main() -> ExitCode {
    utils::init_logger();
    let cfg = utils::loader::config_from_env();
    utils::sep();
    match runner::run(&cfg) {
        Ok(files) => {
            for f in files {
                println!("{}", f.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
