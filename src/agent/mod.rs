//! 智能体层：生命周期核心、思考/行动协议、工具调用智能体与规划智能体

pub mod base;
pub mod planning;
pub mod react;
pub mod toolcall;

pub use base::{run_agent, Agent, AgentCore, AgentState, NO_STEPS_EXECUTED, STUCK_PROMPT};
pub use planning::{PlanningAgent, StepExecStatus, StepExecutionRecord};
pub use react::{react_step, ReAct, NO_ACTION_NEEDED};
pub use toolcall::{FinishPredicate, ToolCallAgent, NOTHING_TO_EXECUTE};
