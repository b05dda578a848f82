//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters / execute），
//! 由 ToolRegistry 按名注册与查找；调度失败闭合：未知工具名与工具内部错误
//! 都转成带 error 字段的 ToolResult，绝不向循环抛异常。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::tools::ToolResult;

/// 工具 trait：名称、描述（供模型理解）、参数 schema、异步执行（args 为 JSON 对象）
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认空对象表示无参数
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError>;

    /// 导出为模型查询的函数调用格式
    fn to_param(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters(),
            }
        })
    }
}

/// 工具注册表：按注册顺序保存工具，支持 schema 导出与按名调度
#[derive(Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// 导出全部工具 schema，随每次模型查询下发
    pub fn to_params(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.to_param())
            .collect()
    }

    /// 按名调度：未知工具与 ToolError 都转为失败结果返回
    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::failure(format!("工具 {} 无效", name));
        };
        match tool.execute(args).await {
            Ok(result) => result,
            Err(e) => ToolResult::failure(e.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;

    #[tokio::test]
    async fn test_execute_unknown_tool_fails_closed() {
        let registry = ToolRegistry::new();
        let result = registry.execute("missing", json!({})).await;
        assert!(result.error.is_some());
        assert!(result.error.unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let result = registry.execute("echo", json!({"text": "hi"})).await;
        assert_eq!(result.output, "hi");
        assert!(result.error.is_none());
    }

    #[test]
    fn test_to_params_preserves_registration_order() {
        struct Named(&'static str);
        #[async_trait]
        impl Tool for Named {
            fn name(&self) -> &str {
                self.0
            }
            fn description(&self) -> &str {
                "test"
            }
            async fn execute(&self, _args: Value) -> Result<ToolResult, ToolError> {
                Ok(ToolResult::default())
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Named("b"));
        registry.register(Named("a"));
        let names: Vec<String> = registry
            .to_params()
            .iter()
            .map(|p| p["function"]["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
