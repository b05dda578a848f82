//! Terminate 工具
//!
//! 特殊工具：成功调用后由特殊工具钩子把智能体状态置为 FINISHED，结束循环。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::tools::{Tool, ToolResult};

const TERMINATE_DESCRIPTION: &str = "当请求已满足或助手无法继续执行任务时终止交互。\
当你完成所有任务后，调用此工具来结束工作。";

/// 终止工具：汇报完成状态并触发终止
pub struct Terminate;

impl Terminate {
    pub const NAME: &'static str = "terminate";
}

#[async_trait]
impl Tool for Terminate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        TERMINATE_DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "交互的完成状态。",
                    "enum": ["success", "failure"],
                }
            },
            "required": ["status"],
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let status = args
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("success");
        Ok(ToolResult::success(format!("交互已完成，状态: {}", status)))
    }
}
