//! 思考/行动两阶段协议
//!
//! 一步 = think 决策 + act 执行；think 返回 false 时本步直接以固定结果结束。
//! 两阶段拆分是所有具体智能体种类的扩展点。

use async_trait::async_trait;

use crate::agent::Agent;
use crate::error::AgentError;

/// think 判定无需行动时的固定步骤结果
pub const NO_ACTION_NEEDED: &str = "思考完成 - 无需行动";

/// 思考/行动协议
#[async_trait]
pub trait ReAct: Agent {
    /// 处理当前状态并决定下一步行动；返回是否需要 act
    async fn think(&mut self) -> Result<bool, AgentError>;

    /// 执行决定的行动
    async fn act(&mut self) -> Result<String, AgentError>;
}

/// 单步执行：先思考，需要时行动
pub async fn react_step<A: ReAct + ?Sized>(agent: &mut A) -> Result<String, AgentError> {
    let should_act = agent.think().await?;
    if !should_act {
        return Ok(NO_ACTION_NEEDED.to_string());
    }
    agent.act().await
}
