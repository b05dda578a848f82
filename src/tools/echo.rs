//! Echo 工具（测试与演示用）

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::tools::{Tool, ToolResult};

/// Echo 工具：回显文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "回显传入的文本。参数: {\"text\": \"消息内容\"}"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "要回显的文本",
                }
            },
            "required": ["text"],
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let text = args.get("text").and_then(|v| v.as_str()).unwrap_or("");
        Ok(ToolResult::success(text))
    }
}
