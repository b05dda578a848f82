//! 错误类型
//!
//! AgentError 覆盖引擎级失败（状态违规、令牌限制、LLM、配置、流程）；
//! ToolError 为工具内部失败，调度层会将其转为文本观察结果，绝不中断循环。

use thiserror::Error;

use crate::agent::AgentState;

/// 引擎运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 在非 IDLE 状态调用 run（对调用方致命）
    #[error("Cannot run agent from state: {0:?}")]
    InvalidState(AgentState),

    /// 令牌限制：对本次 run 终止性，不再重试（底层客户端可在上抛前自行重试）
    #[error("Token limit exceeded: {0}")]
    TokenLimitExceeded(String),

    /// tool_choice = required 但模型未给出任何工具调用
    #[error("Tool call required but none provided")]
    ToolCallRequired,

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Flow error: {0}")]
    FlowError(String),
}

/// 工具执行失败（调度层转为 ToolResult.error，不向上传播）
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ToolError {
    pub message: String,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
