//! LLM 客户端抽象
//!
//! 模型推理端点是外部协作者，引擎只通过 ask_tool 契约消费它：
//! 请求 = 消息历史 + 可选 system 消息 + 工具 schema + 工具选择策略；
//! 响应 = 可选文本内容 + 有序的工具调用列表。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;
use crate::memory::Message;

/// 工具选择策略
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// 不允许调用工具
    None,
    /// 模型自行决定
    Auto,
    /// 必须调用工具
    Required,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::None => "none",
            ToolChoice::Auto => "auto",
            ToolChoice::Required => "required",
        }
    }
}

/// 模型请求的函数调用：工具名 + 字符串编码的 JSON 参数
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// 模型响应中的单次工具调用
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// 一次模型查询的决策结果
#[derive(Clone, Debug, Default)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: Some(text.into()),
            tool_calls,
        }
    }
}

/// LLM 客户端 trait：带工具 schema 的模型查询
///
/// 实现方负责自己的重试；令牌限制在放弃重试后以
/// AgentError::TokenLimitExceeded 上抛，引擎将其视为本次 run 的终止信号。
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn ask_tool(
        &self,
        messages: &[Message],
        system_msgs: Option<&[Message]>,
        tools: &[Value],
        tool_choice: ToolChoice,
    ) -> Result<ChatResponse, AgentError>;
}
