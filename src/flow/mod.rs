//! 流程层：把多个智能体编排为一次完整任务执行

pub mod planning;

use async_trait::async_trait;

use crate::error::AgentError;

pub use planning::PlanningFlow;

/// 执行流程：接收原始输入，产出整段执行结果文本
#[async_trait]
pub trait Flow: Send {
    async fn execute(&mut self, input: &str) -> Result<String, AgentError>;
}
