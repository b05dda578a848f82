//! 脚本化 LLM 客户端（用于测试与演示，无需 API）
//!
//! 按入队顺序弹出预设响应；队列耗尽后回落到一条固定文本回复，
//! 便于在本地确定性地驱动完整的 think/act 循环。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentError;
use crate::llm::{ChatResponse, LlmClient, ToolCall, ToolChoice};
use crate::memory::Message;

/// 脚本化客户端：依次返回预设的响应或错误
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<ChatResponse, AgentError>>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条文本响应
    pub fn push_content(self, text: impl Into<String>) -> Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Ok(ChatResponse::content(text)));
        self
    }

    /// 追加一条带工具调用的响应
    pub fn push_tool_call(
        self,
        content: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        let call = ToolCall::new(new_call_id(), name, arguments);
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Ok(ChatResponse::with_tool_calls(content, vec![call])));
        self
    }

    /// 追加一条完整响应（多工具调用等）
    pub fn push_response(self, response: ChatResponse) -> Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Ok(response));
        self
    }

    /// 追加一条错误（如令牌限制）
    pub fn push_error(self, err: AgentError) -> Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Err(err));
        self
    }
}

/// 生成工具调用 ID（真实客户端由推理端点分配）
pub fn new_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn ask_tool(
        &self,
        _messages: &[Message],
        _system_msgs: Option<&[Message]>,
        _tools: &[Value],
        _tool_choice: ToolChoice,
    ) -> Result<ChatResponse, AgentError> {
        let next = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front();
        match next {
            Some(result) => result,
            None => Ok(ChatResponse::content("(脚本已结束)")),
        }
    }
}
