//! 可观测性

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化结构化日志；RUST_LOG 可覆盖默认的 info 级别。
/// 重复调用安全（测试中多次初始化只有第一次生效）。
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().expect("valid directive")))
        .with(fmt::layer())
        .try_init();
}
