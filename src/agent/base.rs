//! 智能体生命周期
//!
//! AgentCore 持有所有智能体共享的字段（记忆、状态、步数预算、提示词），
//! Agent trait 提供有界步骤循环 run：作用域化状态转换保证进入前的状态
//! 在所有退出路径上恢复，失败先升级为 ERROR 再上抛；step 为抽象扩展点。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::AgentError;
use crate::llm::LlmClient;
use crate::memory::{Memory, Message};

/// run 未执行任何步骤时的固定返回值
pub const NO_STEPS_EXECUTED: &str = "未执行任何步骤";

/// 卡住时注入下一步提示词的纠正指令
pub const STUCK_PROMPT: &str = "观察到重复响应。考虑新的策略，避免重复已经尝试过的无效路径。";

/// 智能体状态机；ERROR 只在失败传播期间出现，run 正常返回后绝不驻留于此
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Running,
    Finished,
    Error,
}

/// 所有智能体共享的核心字段；每个实例独占自己的记忆与状态
pub struct AgentCore {
    pub name: String,
    pub description: Option<String>,
    /// 系统级指令提示词
    pub system_prompt: Option<String>,
    /// 每次思考前追加到对话的"下一步"引导提示词
    pub next_step_prompt: Option<String>,
    pub llm: Arc<dyn LlmClient>,
    pub memory: Memory,
    pub state: AgentState,
    /// 终止前的最大步骤数
    pub max_steps: usize,
    pub current_step: usize,
    /// 卡住判定阈值：最新输出在先前 assistant 消息中的重复次数
    pub duplicate_threshold: usize,
}

impl AgentCore {
    pub fn new(name: impl Into<String>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            name: name.into(),
            description: None,
            system_prompt: None,
            next_step_prompt: None,
            llm,
            memory: Memory::new(),
            state: AgentState::Idle,
            max_steps: 10,
            current_step: 0,
            duplicate_threshold: 2,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_next_step_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.next_step_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_duplicate_threshold(mut self, threshold: usize) -> Self {
        self.duplicate_threshold = threshold;
        self
    }

    pub fn is_stuck(&self) -> bool {
        self.memory.is_stuck(self.duplicate_threshold)
    }

    /// 卡住处理：把纠正指令前置到下一步提示词（只改未来的提示，不改状态）
    pub fn handle_stuck_state(&mut self) {
        let next = match &self.next_step_prompt {
            Some(prompt) => format!("{}\n{}", STUCK_PROMPT, prompt),
            None => STUCK_PROMPT.to_string(),
        };
        self.next_step_prompt = Some(next);
        warn!(agent = %self.name, "检测到卡住状态，添加提示词: {}", STUCK_PROMPT);
    }
}

/// 智能体 trait：run 循环由默认实现提供，step 由具体智能体种类实现
#[async_trait]
pub trait Agent: Send {
    fn core(&self) -> &AgentCore;

    fn core_mut(&mut self) -> &mut AgentCore;

    /// 执行一个步骤（思考/行动协议见 react 模块）
    async fn step(&mut self) -> Result<String, AgentError>;

    /// 清理钩子：run 退出时无条件调用（沙箱等外部执行资源的释放点）
    async fn cleanup(&mut self) {}

    /// 主循环：见 run_agent
    async fn run(&mut self, request: Option<&str>) -> Result<String, AgentError> {
        run_agent(self, request).await
    }
}

/// 智能体主循环。
///
/// 非 IDLE 状态直接报错；可选请求作为 user 消息入记忆；作用域化转换进入
/// RUNNING：循环失败时先置 ERROR（仅在传播期间可见）再恢复进入前的状态并
/// 上抛；正常退出恢复进入前的状态。步数预算耗尽时计数器清零、状态回 IDLE
/// 并追加预算耗尽通知。清理钩子在所有退出路径上执行。
pub async fn run_agent<A: Agent + ?Sized>(
    agent: &mut A,
    request: Option<&str>,
) -> Result<String, AgentError> {
    if agent.core().state != AgentState::Idle {
        return Err(AgentError::InvalidState(agent.core().state));
    }

    if let Some(request) = request {
        agent.core_mut().memory.push(Message::user(request));
    }

    let previous = agent.core().state;
    agent.core_mut().state = AgentState::Running;

    let outcome = drive_steps(agent).await;

    if outcome.is_err() {
        agent.core_mut().state = AgentState::Error;
        error!(agent = %agent.core().name, "步骤循环失败，状态升级为 ERROR");
    }
    agent.core_mut().state = previous;

    agent.cleanup().await;

    let results = outcome?;
    if results.is_empty() {
        Ok(NO_STEPS_EXECUTED.to_string())
    } else {
        Ok(results.join("\n"))
    }
}

/// 有界步骤循环：每步递增计数、执行 step、做卡住检测，收集每步一行结果
async fn drive_steps<A: Agent + ?Sized>(agent: &mut A) -> Result<Vec<String>, AgentError> {
    let mut results = Vec::new();

    while agent.core().current_step < agent.core().max_steps
        && agent.core().state != AgentState::Finished
    {
        agent.core_mut().current_step += 1;
        info!(
            agent = %agent.core().name,
            "执行步骤 {}/{}",
            agent.core().current_step,
            agent.core().max_steps
        );

        let step_result = agent.step().await?;

        if agent.core().is_stuck() {
            agent.core_mut().handle_stuck_state();
        }

        results.push(format!("步骤 {}: {}", agent.core().current_step, step_result));
    }

    if agent.core().current_step >= agent.core().max_steps {
        let max_steps = agent.core().max_steps;
        agent.core_mut().current_step = 0;
        agent.core_mut().state = AgentState::Idle;
        results.push(format!("终止: 达到最大步骤数 ({})", max_steps));
    }

    Ok(results)
}
