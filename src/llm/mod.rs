//! 模型查询契约：LlmClient trait、工具调用与响应类型、脚本化 Mock

pub mod mock;
pub mod traits;

pub use mock::{new_call_id, ScriptedLlm};
pub use traits::{ChatResponse, FunctionCall, LlmClient, ToolCall, ToolChoice};
