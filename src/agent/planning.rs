//! 规划智能体
//!
//! 在工具调用智能体之上叠加计划驱动：运行前先让模型创建初始计划，
//! 每次思考前把计划现状注入对话，并在行动后把执行结果回写到计划步骤。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::agent::{react_step, run_agent, Agent, AgentCore, ReAct, ToolCallAgent};
use crate::error::AgentError;
use crate::llm::{LlmClient, ToolChoice};
use crate::memory::Message;
use crate::prompt;
use crate::tools::{PlanStore, PlanningTool, StepStatus, Terminate};

/// 步骤执行记录的完成状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepExecStatus {
    Pending,
    Completed,
}

/// 工具调用 ID 到计划步骤的关联记录
#[derive(Clone, Debug)]
pub struct StepExecutionRecord {
    pub step_index: usize,
    pub tool_name: String,
    pub status: StepExecStatus,
    pub result: Option<String>,
}

/// 先规划、后逐步执行的智能体
pub struct PlanningAgent {
    inner: ToolCallAgent,
    plan_store: PlanStore,
    /// 本次运行关联的计划 ID
    pub active_plan_id: String,
    /// 工具调用 ID -> 步骤执行记录
    step_execution_tracker: HashMap<String, StepExecutionRecord>,
    current_step_index: Option<usize>,
}

impl PlanningAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        let plan_store = PlanStore::new();
        // 组合提示词由 think 自行拼装，内层不再单独注入下一步提示
        let core = AgentCore::new("planning", llm)
            .with_description("一个创建并管理计划来解决任务的智能体")
            .with_system_prompt(prompt::PLANNING_SYSTEM_PROMPT)
            .with_max_steps(20);
        let inner = ToolCallAgent::new(core.llm.clone())
            .with_core(core)
            .with_tool(PlanningTool::new(plan_store.clone()))
            .with_tool(Terminate)
            .with_tool_choice(ToolChoice::Auto);
        Self {
            inner,
            plan_store,
            active_plan_id: format!("plan_{}", chrono::Utc::now().timestamp()),
            step_execution_tracker: HashMap::new(),
            current_step_index: None,
        }
    }

    pub fn with_plan_id(mut self, id: impl Into<String>) -> Self {
        self.active_plan_id = id.into();
        self
    }

    pub fn with_tool(mut self, tool: impl crate::tools::Tool + 'static) -> Self {
        self.inner = self.inner.with_tool(tool);
        self
    }

    /// 应用 [agent] 配置段（作用于内层工具调用智能体）
    pub fn with_agent_config(mut self, cfg: &crate::config::AgentSection) -> Self {
        self.inner = self.inner.with_agent_config(cfg);
        self
    }

    pub fn plan_store(&self) -> &PlanStore {
        &self.plan_store
    }

    pub fn tracker(&self) -> &HashMap<String, StepExecutionRecord> {
        &self.step_execution_tracker
    }

    fn plan_text(&self) -> String {
        self.plan_store
            .render_text(&self.active_plan_id)
            .unwrap_or_else(|e| format!("获取计划时出错: {}", e.message))
    }

    /// 让模型为初始请求创建计划；未产生 planning 调用时记录失败并继续
    async fn create_initial_plan(&mut self, request: &str) -> Result<(), AgentError> {
        info!(agent = %self.inner.core.name, "使用 ID {} 创建初始计划", self.active_plan_id);

        let user_msg = Message::user(format!(
            "分析请求并创建一个 ID 为 {} 的计划: {}",
            self.active_plan_id, request
        ));
        let system_msgs = vec![Message::system(prompt::PLANNING_SYSTEM_PROMPT)];
        let params = self.inner.available_tools.to_params();

        let response = self
            .inner
            .core
            .llm
            .ask_tool(
                std::slice::from_ref(&user_msg),
                Some(&system_msgs),
                &params,
                ToolChoice::Auto,
            )
            .await?;

        self.inner.core.memory.push(user_msg);
        self.inner.core.memory.push(Message::from_tool_calls(
            response.content.clone().unwrap_or_default(),
            response.tool_calls.clone(),
        ));

        let mut plan_created = false;
        for call in &response.tool_calls {
            if call.function.name != PlanningTool::NAME {
                continue;
            }
            let result = self.inner.execute_tool(call).await;
            info!(agent = %self.inner.core.name, "执行工具 {} 的结果: {}", call.function.name, result);
            self.inner.core.memory.push(Message::tool(
                result,
                call.id.clone(),
                call.function.name.clone(),
                None,
            ));
            plan_created = true;
        }

        if !plan_created {
            warn!(agent = %self.inner.core.name, "未创建计划");
            self.inner
                .core
                .memory
                .push(Message::assistant("错误: 未能从初始请求创建计划"));
        }
        Ok(())
    }

    /// 把已完成的工具调用回写到它关联的计划步骤
    fn update_plan_status(&mut self, call_id: &str) {
        let Some(record) = self.step_execution_tracker.get(call_id) else {
            return;
        };
        if record.status != StepExecStatus::Completed {
            return;
        }
        let step_index = record.step_index;
        if let Err(e) = self
            .plan_store
            .mark_step(&self.active_plan_id, step_index, StepStatus::Completed)
        {
            warn!(
                agent = %self.inner.core.name,
                "标记步骤 {} 完成失败: {}",
                step_index, e.message
            );
        } else {
            info!(
                agent = %self.inner.core.name,
                "已将步骤 {} 标记为已完成",
                step_index
            );
        }
    }
}

#[async_trait]
impl Agent for PlanningAgent {
    fn core(&self) -> &AgentCore {
        &self.inner.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.inner.core
    }

    async fn step(&mut self) -> Result<String, AgentError> {
        react_step(self).await
    }

    /// 有请求时先建立初始计划，再进入主循环
    async fn run(&mut self, request: Option<&str>) -> Result<String, AgentError> {
        if let Some(request) = request {
            self.create_initial_plan(request).await?;
            return run_agent(self, None).await;
        }
        run_agent(self, None).await
    }
}

#[async_trait]
impl ReAct for PlanningAgent {
    /// 注入计划现状后委托内层思考，并登记首个"执行类"工具调用
    async fn think(&mut self) -> Result<bool, AgentError> {
        let status_prompt = format!(
            "当前计划状态:\n{}\n\n{}",
            self.plan_text(),
            prompt::PLANNING_NEXT_STEP_PROMPT
        );
        self.inner.core.memory.push(Message::user(status_prompt));

        self.current_step_index = self
            .plan_store
            .current_step(&self.active_plan_id)
            .ok()
            .flatten()
            .map(|(i, _)| i);

        let should_act = self.inner.think().await?;

        // 只有非规划、非特殊的工具调用才算对当前步骤的执行
        if should_act {
            if let Some(step_index) = self.current_step_index {
                if let Some(call) = self.inner.tool_calls().first() {
                    let name = call.function.name.clone();
                    if name != PlanningTool::NAME && !self.inner.is_special_tool(&name) {
                        self.step_execution_tracker.insert(
                            call.id.clone(),
                            StepExecutionRecord {
                                step_index,
                                tool_name: name,
                                status: StepExecStatus::Pending,
                                result: None,
                            },
                        );
                    }
                }
            }
        }

        Ok(should_act)
    }

    /// 委托内层执行，随后把结果关联回计划步骤
    async fn act(&mut self) -> Result<String, AgentError> {
        let latest_call_id = self.inner.tool_calls().first().map(|c| c.id.clone());
        let result = self.inner.act().await?;

        if let Some(call_id) = latest_call_id {
            if let Some(record) = self.step_execution_tracker.get_mut(&call_id) {
                record.status = StepExecStatus::Completed;
                record.result = Some(result.clone());
            }
            self.update_plan_status(&call_id);
        }

        Ok(result)
    }
}
