//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MANTIS__*` 覆盖（双下划线表示嵌套，如 `MANTIS__AGENT__MAX_STEPS=50`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub flow: FlowSection,
}

/// [app] 段：应用名与工作目录
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 工作目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
}

/// [llm] 段：模型选择与请求参数
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 单次响应的最大令牌数
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_request_timeout() -> u64 {
    60
}

/// [agent] 段：步骤预算与卡住检测
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentSection {
    /// 单次 run 的最大步骤数
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// 卡住判定阈值（重复响应次数）
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,
    /// 工具观察结果截断长度（字符），未设置则不截断
    pub max_observe: Option<usize>,
}

fn default_max_steps() -> usize {
    30
}

fn default_duplicate_threshold() -> usize {
    2
}

/// [flow] 段：规划流程参数
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FlowSection {
    /// 允许充当执行器的智能体键；为空时所有智能体都可执行
    #[serde(default)]
    pub executor_keys: Vec<String>,
}

/// 从 config 目录加载配置，环境变量 MANTIS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MANTIS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, AgentError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MANTIS")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder
        .build()
        .map_err(|e| AgentError::ConfigError(e.to_string()))?;
    c.try_deserialize()
        .map_err(|e| AgentError::ConfigError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_any_source() {
        let cfg = AppConfig::default();
        // Default 派生不经过 serde 默认值，load 路径才是权威；此处只验证根结构可用
        assert!(cfg.app.name.is_none());
        assert!(cfg.flow.executor_keys.is_empty());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("create temp config");
        writeln!(
            file,
            "[agent]\nmax_steps = 7\n\n[flow]\nexecutor_keys = [\"search\"]"
        )
        .expect("write temp config");

        let cfg = load_config(Some(file.path().to_path_buf())).expect("config should load");
        assert_eq!(cfg.agent.max_steps, 7);
        assert_eq!(cfg.flow.executor_keys, vec!["search".to_string()]);
        // 未覆盖的键保持默认
        assert_eq!(cfg.agent.duplicate_threshold, 2);
    }

    #[test]
    fn test_malformed_file_surfaces_config_error() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("create temp config");
        writeln!(file, "[agent]\nmax_steps = \"七\"").expect("write temp config");

        let err = load_config(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, AgentError::ConfigError(_)));
    }
}
