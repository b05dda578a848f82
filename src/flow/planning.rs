//! 规划流程
//!
//! 在智能体之外持有计划：先用模型为输入建立计划（失败时落到默认计划），
//! 然后逐步驱动执行器智能体，步骤文本里的 `[TYPE]` 标签决定由谁执行，
//! 步骤完成回写到计划，全部步骤完成后收尾。

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

use crate::agent::{Agent, AgentState};
use crate::config::FlowSection;
use crate::error::AgentError;
use crate::flow::Flow;
use crate::llm::{LlmClient, ToolChoice};
use crate::memory::Message;
use crate::prompt;
use crate::tools::{PlanStore, PlanningTool, StepStatus, Tool};

/// 步骤文本前缀标签，如 "[SEARCH] 查找资料" 中的 search
fn step_type_of(text: &str) -> Option<String> {
    static STEP_TYPE_RE: OnceLock<Regex> = OnceLock::new();
    let re = STEP_TYPE_RE
        .get_or_init(|| Regex::new(r"^\s*\[([A-Z_]+)\]").expect("step type pattern is valid"));
    re.captures(text).map(|c| c[1].to_lowercase())
}

/// 计划驱动的多智能体执行流程
pub struct PlanningFlow {
    llm: Arc<dyn LlmClient>,
    plan_store: PlanStore,
    planning_tool: PlanningTool,
    /// (键, 智能体)；第一个为主执行器
    agents: Vec<(String, Box<dyn Agent>)>,
    /// 允许充当执行器的键（有序，决定回落顺序）
    executor_keys: Vec<String>,
    pub active_plan_id: String,
}

impl std::fmt::Debug for PlanningFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanningFlow")
            .field(
                "agents",
                &self.agents.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("executor_keys", &self.executor_keys)
            .field("active_plan_id", &self.active_plan_id)
            .finish_non_exhaustive()
    }
}

impl PlanningFlow {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        agents: Vec<(String, Box<dyn Agent>)>,
    ) -> Result<Self, AgentError> {
        if agents.is_empty() {
            return Err(AgentError::FlowError(
                "流程至少需要一个智能体".to_string(),
            ));
        }
        let plan_store = PlanStore::new();
        let executor_keys = agents.iter().map(|(k, _)| k.clone()).collect();
        Ok(Self {
            llm,
            planning_tool: PlanningTool::new(plan_store.clone()),
            plan_store,
            agents,
            executor_keys,
            active_plan_id: format!("plan_{}", chrono::Utc::now().timestamp()),
        })
    }

    pub fn with_executor_keys(mut self, keys: Vec<String>) -> Self {
        self.executor_keys = keys;
        self
    }

    /// 应用 [flow] 配置段；executor_keys 为空时保留"全部智能体可执行"的默认
    pub fn with_flow_config(mut self, cfg: &FlowSection) -> Self {
        if !cfg.executor_keys.is_empty() {
            self.executor_keys = cfg.executor_keys.clone();
        }
        self
    }

    pub fn with_plan_id(mut self, id: impl Into<String>) -> Self {
        self.active_plan_id = id.into();
        self
    }

    pub fn plan_store(&self) -> &PlanStore {
        &self.plan_store
    }

    pub fn agent(&self, key: &str) -> Option<&dyn Agent> {
        self.agents
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, a)| a.as_ref())
    }

    /// 执行器选择：步骤类型标签 → 第一个可用执行器键 → 主执行器
    fn executor_index(&self, step_type: Option<&str>) -> usize {
        if let Some(step_type) = step_type {
            if let Some(i) = self.agents.iter().position(|(k, _)| k == step_type) {
                return i;
            }
        }
        for key in &self.executor_keys {
            if let Some(i) = self.agents.iter().position(|(k, _)| k == key) {
                return i;
            }
        }
        0
    }

    /// 让模型为输入创建计划；模型不配合时落到默认三步计划
    async fn create_initial_plan(&mut self, input: &str) -> Result<(), AgentError> {
        info!(plan_id = %self.active_plan_id, "创建初始计划");

        let system_msg = Message::system(prompt::FLOW_PLANNING_SYSTEM_PROMPT);
        let user_msg = Message::user(format!("为以下任务创建一个合理的计划: {}", input));
        let params = vec![self.planning_tool.to_param()];

        let response = self
            .llm
            .ask_tool(
                std::slice::from_ref(&user_msg),
                Some(std::slice::from_ref(&system_msg)),
                &params,
                ToolChoice::Auto,
            )
            .await?;

        for call in &response.tool_calls {
            if call.function.name != PlanningTool::NAME {
                continue;
            }
            // 计划 ID 由流程统一指定，覆盖模型给出的值
            let mut args: serde_json::Value =
                serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| json!({}));
            args["plan_id"] = json!(self.active_plan_id);
            match self.planning_tool.execute(args).await {
                Ok(result) => {
                    info!("计划创建结果: {}", result);
                    return Ok(());
                }
                Err(e) => warn!("规划工具执行失败: {}", e.message),
            }
        }

        warn!("模型未能创建计划，使用默认计划");
        let title: String = if input.chars().count() > 50 {
            format!("计划: {}...", input.chars().take(50).collect::<String>())
        } else {
            format!("计划: {}", input)
        };
        self.plan_store
            .create(
                &self.active_plan_id,
                &title,
                vec![
                    "分析请求".to_string(),
                    "执行任务".to_string(),
                    "验证结果".to_string(),
                ],
            )
            .map_err(|e| AgentError::FlowError(e.message))?;
        Ok(())
    }

    /// 驱动一个步骤：拼上下文提示、运行执行器、回写完成状态
    async fn execute_step(&mut self, index: usize, step_text: &str) -> String {
        let plan_text = self
            .plan_store
            .render_text(&self.active_plan_id)
            .unwrap_or_else(|e| format!("获取计划时出错: {}", e.message));
        let step_prompt = format!(
            "当前计划状态:\n{}\n\n你的当前任务:\n你现在正在处理步骤 {}: \"{}\"\n\n\
             请使用适当的工具执行此步骤。完成后，提供你完成内容的摘要。",
            plan_text, index, step_text
        );

        let agent_index = self.executor_index(step_type_of(step_text).as_deref());
        let (key, executor) = &mut self.agents[agent_index];
        info!(executor = %key, step = index, "执行计划步骤");

        match executor.run(Some(step_prompt.as_str())).await {
            Ok(result) => {
                if let Err(e) =
                    self.plan_store
                        .mark_step(&self.active_plan_id, index, StepStatus::Completed)
                {
                    warn!("标记步骤 {} 完成失败: {}", index, e.message);
                }
                result
            }
            Err(e) => format!("步骤执行失败: {}", e),
        }
    }

    fn finalize(&self) -> String {
        let plan_text = self
            .plan_store
            .render_text(&self.active_plan_id)
            .unwrap_or_else(|e| format!("获取计划时出错: {}", e.message));
        format!(
            "计划完成！\n\n最终计划状态:\n{}\n所有步骤已完成。计划已成功执行。",
            plan_text
        )
    }
}

#[async_trait]
impl Flow for PlanningFlow {
    async fn execute(&mut self, input: &str) -> Result<String, AgentError> {
        if !input.is_empty() {
            self.create_initial_plan(input).await?;
            if !self.plan_store.contains(&self.active_plan_id) {
                return Ok(format!("为以下内容创建计划失败: {}", input));
            }
        }

        let mut results = Vec::new();
        loop {
            let current = self
                .plan_store
                .current_step(&self.active_plan_id)
                .map_err(|e| AgentError::FlowError(e.message))?;

            let Some((index, step_text)) = current else {
                results.push(self.finalize());
                break;
            };

            let step_result = self.execute_step(index, &step_text).await;
            results.push(step_result);

            // 执行器在本步内终结则提前结束整个流程。默认的 run 循环在返回前
            // 恢复进入时的状态，所以只有绕过该循环的执行器实现才会在这里暴露
            // FINISHED；对默认实现本检查不触发，不要改成从步骤结果里探测终止。
            let agent_index = self.executor_index(step_type_of(&step_text).as_deref());
            if self.agents[agent_index].1.core().state == AgentState::Finished {
                break;
            }
        }

        Ok(results.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentCore;
    use crate::error::AgentError;
    use crate::llm::ScriptedLlm;

    /// 单步探针：每次 run 执行一步后即完成，便于观察流程交给它的提示词
    struct ProbeAgent {
        core: AgentCore,
    }

    impl ProbeAgent {
        fn new(name: &str) -> Self {
            Self {
                core: AgentCore::new(name, Arc::new(ScriptedLlm::new())),
            }
        }
    }

    #[async_trait]
    impl Agent for ProbeAgent {
        fn core(&self) -> &AgentCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut AgentCore {
            &mut self.core
        }
        async fn step(&mut self) -> Result<String, AgentError> {
            self.core.state = AgentState::Finished;
            Ok("完成".to_string())
        }
    }

    fn scripted_plan(steps: &[&str]) -> ScriptedLlm {
        let args = json!({
            "command": "create",
            "plan_id": "ignored",
            "title": "测试计划",
            "steps": steps,
        })
        .to_string();
        ScriptedLlm::new().push_tool_call("建计划", PlanningTool::NAME, args)
    }

    #[test]
    fn test_step_type_extraction() {
        assert_eq!(step_type_of("[SEARCH] 查找资料").as_deref(), Some("search"));
        assert_eq!(step_type_of("  [DATA_PREP] 清洗").as_deref(), Some("data_prep"));
        assert_eq!(step_type_of("没有标签的步骤"), None);
        assert_eq!(step_type_of("[lower] 小写不算"), None);
    }

    #[tokio::test]
    async fn test_flow_runs_all_steps_and_finalizes() {
        let llm = scripted_plan(&["第一步", "第二步"]);
        let agents: Vec<(String, Box<dyn Agent>)> =
            vec![("default".to_string(), Box::new(ProbeAgent::new("default")))];
        let mut flow = PlanningFlow::new(Arc::new(llm), agents)
            .unwrap()
            .with_plan_id("plan_f1");

        let output = flow.execute("做点事").await.unwrap();

        assert!(output.contains("计划完成！"));
        let plan = flow.plan_store().get("plan_f1").unwrap();
        assert_eq!(plan.completed_count(), 2);
    }

    #[tokio::test]
    async fn test_typed_step_routes_to_matching_executor() {
        let llm = scripted_plan(&["[SEARCH] 查找数据", "总结结果"]);
        let agents: Vec<(String, Box<dyn Agent>)> = vec![
            ("default".to_string(), Box::new(ProbeAgent::new("default"))),
            ("search".to_string(), Box::new(ProbeAgent::new("search"))),
        ];
        let mut flow = PlanningFlow::new(Arc::new(llm), agents)
            .unwrap()
            .with_plan_id("plan_f2");

        flow.execute("查找并总结").await.unwrap();

        // 带 [SEARCH] 标签的步骤提示应落在 search 执行器的记忆里
        let search_memory = flow.agent("search").unwrap().core().memory.messages();
        assert!(search_memory
            .iter()
            .any(|m| m.content.contains("[SEARCH] 查找数据")));
        // 无标签步骤回落到第一个执行器键
        let default_memory = flow.agent("default").unwrap().core().memory.messages();
        assert!(default_memory.iter().any(|m| m.content.contains("总结结果")));
    }

    /// 记录收到的工具选择策略，并总是拒绝创建计划
    #[derive(Default)]
    struct RecordingLlm {
        seen_choice: std::sync::Mutex<Option<ToolChoice>>,
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn ask_tool(
            &self,
            _messages: &[Message],
            _system_msgs: Option<&[Message]>,
            _tools: &[serde_json::Value],
            tool_choice: ToolChoice,
        ) -> Result<crate::llm::ChatResponse, AgentError> {
            *self.seen_choice.lock().unwrap() = Some(tool_choice);
            Ok(crate::llm::ChatResponse::content("不需要计划"))
        }
    }

    #[tokio::test]
    async fn test_plan_creation_lets_model_decide_tool_use() {
        let llm = Arc::new(RecordingLlm::default());
        let agents: Vec<(String, Box<dyn Agent>)> =
            vec![("default".to_string(), Box::new(ProbeAgent::new("default")))];
        let mut flow = PlanningFlow::new(llm.clone(), agents)
            .unwrap()
            .with_plan_id("plan_f5");

        flow.execute("随便做点什么").await.unwrap();

        // 建计划的查询允许模型自行决定是否调用工具，拒绝时走默认计划
        assert_eq!(*llm.seen_choice.lock().unwrap(), Some(ToolChoice::Auto));
        assert!(flow.plan_store().contains("plan_f5"));
    }

    #[tokio::test]
    async fn test_flow_config_narrows_executor_fallback() {
        let llm = scripted_plan(&["无标签步骤"]);
        let agents: Vec<(String, Box<dyn Agent>)> = vec![
            ("default".to_string(), Box::new(ProbeAgent::new("default"))),
            ("search".to_string(), Box::new(ProbeAgent::new("search"))),
        ];
        let cfg = FlowSection {
            executor_keys: vec!["search".to_string()],
        };
        let mut flow = PlanningFlow::new(Arc::new(llm), agents)
            .unwrap()
            .with_plan_id("plan_f6")
            .with_flow_config(&cfg);

        flow.execute("做点事").await.unwrap();

        // 回落顺序只剩 search，无标签步骤不再落到第一个智能体
        let search_memory = flow.agent("search").unwrap().core().memory.messages();
        assert!(search_memory.iter().any(|m| m.content.contains("无标签步骤")));
        assert!(flow.agent("default").unwrap().core().memory.is_empty());
    }

    #[tokio::test]
    async fn test_default_plan_when_model_declines() {
        let llm = ScriptedLlm::new().push_content("我拒绝");
        let agents: Vec<(String, Box<dyn Agent>)> =
            vec![("default".to_string(), Box::new(ProbeAgent::new("default")))];
        let mut flow = PlanningFlow::new(Arc::new(llm), agents)
            .unwrap()
            .with_plan_id("plan_f3");

        let output = flow.execute("一个很长的任务描述").await.unwrap();

        let plan = flow.plan_store().get("plan_f3").unwrap();
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.steps[0], "分析请求");
        assert!(output.contains("计划完成！"));
    }

    #[tokio::test]
    async fn test_empty_agent_list_rejected() {
        let err = PlanningFlow::new(Arc::new(ScriptedLlm::new()), Vec::new()).unwrap_err();
        assert!(matches!(err, AgentError::FlowError(_)));
    }
}
