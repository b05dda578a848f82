//! 工具执行结果
//!
//! 所有字段显式存在（可能为空），消除对结果对象的属性探测：
//! output 文本输出、error 错误说明、base64_image 图像、system 侧信道备注。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// 工具执行结果；"真值" 定义为任一字段非空
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub base64_image: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, base64_image: impl Into<String>) -> Self {
        self.base64_image = Some(base64_image.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// 任一字段非空即为真
    pub fn is_truthy(&self) -> bool {
        !self.output.is_empty()
            || self.error.as_deref().is_some_and(|s| !s.is_empty())
            || self.base64_image.as_deref().is_some_and(|s| !s.is_empty())
            || self.system.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// 合并两个结果（链式副作用）：文本字段拼接；
    /// 双方都带图像时无法拼接，合并失败。
    pub fn combine(self, other: ToolResult) -> Result<ToolResult, ToolError> {
        fn concat(a: Option<String>, b: Option<String>) -> Option<String> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a + &b),
                (a, b) => a.or(b),
            }
        }

        let base64_image = match (self.base64_image, other.base64_image) {
            (Some(_), Some(_)) => {
                return Err(ToolError::new("无法合并工具结果：两侧都包含图像"));
            }
            (a, b) => a.or(b),
        };

        Ok(ToolResult {
            output: self.output + &other.output,
            error: concat(self.error, other.error),
            base64_image,
            system: concat(self.system, other.system),
        })
    }
}

impl fmt::Display for ToolResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(err) => write!(f, "错误: {}", err),
            None => write!(f, "{}", self.output),
        }
    }
}
