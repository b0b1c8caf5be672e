//! 流水线工具依赖的通用组件.

use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::env;

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 日志级别环境变量.
pub const LOG_ENV: &str = "SEG_LOG";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) -> std::io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 解析日志级别, 无法识别时为 `Info`.
pub fn parse_level(s: Option<&str>) -> LevelFilter {
    s.and_then(|s| s.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// 初始化日志. 级别取自 `$SEG_LOG`, 默认为 `Info`.
///
/// 重复初始化不会报错.
pub fn init_logger() {
    let level = parse_level(env::var(LOG_ENV).ok().as_deref());
    if SimpleLogger::new().with_level(level).init().is_err() {
        log::debug!("logger already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(None), LevelFilter::Info);
        assert_eq!(parse_level(Some("debug")), LevelFilter::Debug);
        assert_eq!(parse_level(Some(" WARN ")), LevelFilter::Warn);
        assert_eq!(parse_level(Some("loud")), LevelFilter::Info);
    }

    #[test]
    fn test_sep_to() {
        let mut buf = Vec::new();
        sep_to(&mut buf).unwrap();
        assert_eq!(buf.len(), SEP.len() + 1);
    }
}
