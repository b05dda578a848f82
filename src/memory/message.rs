//! 消息模型
//!
//! 四种角色的封闭枚举与按角色的确定性构造函数；消息一经创建不可变，
//! 顺序即模型上下文，只能追加。

use serde::{Deserialize, Serialize};

use crate::llm::ToolCall;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
    Assistant,
    Tool,
}

/// 单条消息：文本内容、可选图像、tool 角色的调用标识、assistant 角色请求的工具调用
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// 可选的 base64 编码图像（工具结果截图等）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,
    /// role = tool 时对应的工具调用 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// role = tool 时的工具名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// role = assistant 时模型请求的工具调用列表
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            base64_image: None,
            tool_call_id: None,
            name: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// 带工具调用列表的 assistant 消息
    pub fn from_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// 工具结果消息：输出文本、调用 ID、工具名、可选图像
    pub fn tool(
        content: impl Into<String>,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        base64_image: Option<String>,
    ) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg.name = Some(name.into());
        msg.base64_image = base64_image;
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_constructors() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::system("hi").role, Role::System);
        assert_eq!(Message::assistant("hi").role, Role::Assistant);
        let tool = Message::tool("out", "call_1", "echo", None);
        assert_eq!(tool.role, Role::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool.name.as_deref(), Some("echo"));
    }

    #[test]
    fn test_from_tool_calls_attaches_requests() {
        let call = ToolCall::new("call_1", "echo", r#"{"text":"hi"}"#);
        let msg = Message::from_tool_calls("thinking", vec![call]);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].function.name, "echo");
    }
}
