//! 日志初始化
//!
//! 日志写到 stderr，与进度条共用终端；级别由 `RUST_LOG` 控制，默认 `info`。

use tracing_subscriber::EnvFilter;

/// 安装全局 tracing subscriber
///
/// # 参数
/// - `verbose`: 未设置 `RUST_LOG` 时使用 `debug` 级别
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // 重复初始化（例如测试中）时忽略
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
