//! Mantis - Rust 智能体执行引擎
//!
//! 模块划分：
//! - **agent**: 生命周期状态机、思考/行动协议、工具调用与规划智能体
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **error**: 引擎错误与工具错误
//! - **flow**: 多智能体编排（计划驱动的规划流程）
//! - **llm**: LLM 客户端抽象与脚本化实现
//! - **memory**: 消息模型与追加式对话记忆
//! - **prompt**: 提示词常量
//! - **tools**: 工具箱（terminate、planning、echo）与注册表

pub mod agent;
pub mod config;
pub mod error;
pub mod flow;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod prompt;
pub mod tools;

pub use agent::{Agent, AgentState, PlanningAgent, ReAct, ToolCallAgent};
pub use error::{AgentError, ToolError};
