//! 工具调用智能体
//!
//! think：带工具 schema 查询模型并按工具选择策略解释决策；
//! act：按请求顺序逐个调度工具调用并把结果写回记忆；
//! execute_tool 失败闭合——未知工具、坏参数、工具内部错误都只产出文本观察。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::agent::{react_step, Agent, AgentCore, AgentState, ReAct};
use crate::config::AgentSection;
use crate::error::AgentError;
use crate::llm::{LlmClient, ToolCall, ToolChoice};
use crate::memory::Message;
use crate::prompt;
use crate::tools::{Terminate, Tool, ToolRegistry, ToolResult};

/// act 无内容可执行时的固定返回值
pub const NOTHING_TO_EXECUTE: &str = "没有内容或命令可执行";

/// 特殊工具完成判定：对 (工具名, 结果) 判断是否应终结智能体
pub type FinishPredicate = Box<dyn Fn(&str, &ToolResult) -> bool + Send + Sync>;

/// 处理工具/函数调用的基础智能体
pub struct ToolCallAgent {
    pub core: AgentCore,
    pub available_tools: ToolRegistry,
    pub tool_choice: ToolChoice,
    /// 特殊工具名集合（大小写不敏感匹配）
    pub special_tool_names: Vec<String>,
    /// 观察结果截断长度（字符数）
    pub max_observe: Option<usize>,
    /// 本轮 think 产生的待执行工具调用
    pub(crate) tool_calls: Vec<ToolCall>,
    /// 工具结果图像向后续 tool 消息传递的暂存字段
    current_base64_image: Option<String>,
    finish_predicate: FinishPredicate,
}

impl ToolCallAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        let mut available_tools = ToolRegistry::new();
        available_tools.register(Terminate);
        Self {
            core: AgentCore::new("toolcall", llm)
                .with_description("一个可以执行工具调用的智能体")
                .with_system_prompt(prompt::SYSTEM_PROMPT)
                .with_next_step_prompt(prompt::NEXT_STEP_PROMPT)
                .with_max_steps(30),
            available_tools,
            tool_choice: ToolChoice::Auto,
            special_tool_names: vec![Terminate::NAME.to_string()],
            max_observe: None,
            tool_calls: Vec::new(),
            current_base64_image: None,
            finish_predicate: Box::new(|_, _| true),
        }
    }

    pub fn with_core(mut self, core: AgentCore) -> Self {
        self.core = core;
        self
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.available_tools.register(tool);
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.available_tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    pub fn with_max_observe(mut self, max_observe: usize) -> Self {
        self.max_observe = Some(max_observe);
        self
    }

    /// 应用 [agent] 配置段：步数预算、卡住阈值、观察截断
    pub fn with_agent_config(mut self, cfg: &AgentSection) -> Self {
        self.core.max_steps = cfg.max_steps;
        self.core.duplicate_threshold = cfg.duplicate_threshold;
        self.max_observe = cfg.max_observe;
        self
    }

    /// 覆盖特殊工具完成判定（默认：成功调度即终结）
    pub fn with_finish_predicate(mut self, predicate: FinishPredicate) -> Self {
        self.finish_predicate = predicate;
        self
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn is_special_tool(&self, name: &str) -> bool {
        self.special_tool_names
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name))
    }

    /// 执行单个工具调用；永不上抛：所有失败以 "错误: ..." 文本返回
    pub async fn execute_tool(&mut self, call: &ToolCall) -> String {
        let name = call.function.name.as_str();
        if name.is_empty() {
            return "错误: 无效的命令格式".to_string();
        }
        if !self.available_tools.contains(name) {
            return format!("错误: 未知工具 '{}'", name);
        }

        let raw_args = call.function.arguments.trim();
        let raw_args = if raw_args.is_empty() { "{}" } else { raw_args };
        let args: Value = match serde_json::from_str(raw_args) {
            Ok(value) => value,
            Err(_) => {
                error!(
                    agent = %self.core.name,
                    tool = name,
                    args = %call.function.arguments,
                    "工具参数不是有效的 JSON"
                );
                return format!("错误: 解析 {} 的参数时出错: 无效的JSON格式", name);
            }
        };

        info!(agent = %self.core.name, "激活工具: '{}'", name);
        let result = self.available_tools.execute(name, args).await;

        self.handle_special_tool(name, &result);

        if let Some(image) = &result.base64_image {
            self.current_base64_image = Some(image.clone());
        }

        if result.is_truthy() {
            format!("观察到命令 `{}` 执行的输出:\n{}", name, result)
        } else {
            format!("命令 `{}` 完成，无输出", name)
        }
    }

    /// 特殊工具钩子：调度后按完成判定决定是否终结智能体
    fn handle_special_tool(&mut self, name: &str, result: &ToolResult) {
        if !self.is_special_tool(name) {
            return;
        }
        if (self.finish_predicate)(name, result) {
            info!(agent = %self.core.name, "特殊工具 '{}' 已完成任务", name);
            self.core.state = AgentState::Finished;
        }
    }
}

#[async_trait]
impl Agent for ToolCallAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn step(&mut self) -> Result<String, AgentError> {
        react_step(self).await
    }
}

#[async_trait]
impl ReAct for ToolCallAgent {
    async fn think(&mut self) -> Result<bool, AgentError> {
        if let Some(prompt) = self.core.next_step_prompt.clone() {
            if !prompt.is_empty() {
                self.core.memory.push(Message::user(prompt));
            }
        }

        let system_msgs = self
            .core
            .system_prompt
            .as_ref()
            .map(|p| vec![Message::system(p.clone())]);
        let params = self.available_tools.to_params();

        let response = match self
            .core
            .llm
            .ask_tool(
                self.core.memory.messages(),
                system_msgs.as_deref(),
                &params,
                self.tool_choice,
            )
            .await
        {
            Ok(response) => response,
            // 令牌限制对本次 run 终止性：记录、FINISHED、不再行动
            Err(AgentError::TokenLimitExceeded(message)) => {
                error!(agent = %self.core.name, "令牌限制错误: {}", message);
                self.core.memory.push(Message::assistant(format!(
                    "达到最大令牌限制，无法继续执行: {}",
                    message
                )));
                self.core.state = AgentState::Finished;
                return Ok(false);
            }
            // 配置错误等值类型错误与其余意外失败直接上抛
            Err(e) => return Err(e),
        };

        self.tool_calls = response.tool_calls;
        let content = response.content.unwrap_or_default();

        info!(agent = %self.core.name, "想法: {}", content);
        info!(
            agent = %self.core.name,
            "选择了 {} 个工具使用",
            self.tool_calls.len()
        );
        if !self.tool_calls.is_empty() {
            let names: Vec<&str> = self
                .tool_calls
                .iter()
                .map(|c| c.function.name.as_str())
                .collect();
            info!(agent = %self.core.name, "准备使用的工具: {:?}", names);
        }

        if self.tool_choice == ToolChoice::None {
            if !self.tool_calls.is_empty() {
                warn!(
                    agent = %self.core.name,
                    "工具不可用时模型仍尝试调用工具，忽略"
                );
                self.tool_calls.clear();
            }
            if !content.is_empty() {
                self.core.memory.push(Message::assistant(content));
                return Ok(true);
            }
            return Ok(false);
        }

        let assistant_msg = if self.tool_calls.is_empty() {
            Message::assistant(content.clone())
        } else {
            Message::from_tool_calls(content.clone(), self.tool_calls.clone())
        };
        self.core.memory.push(assistant_msg);

        if self.tool_choice == ToolChoice::Required && self.tool_calls.is_empty() {
            return Ok(true); // act() 负责报出 ToolCallRequired
        }
        if self.tool_choice == ToolChoice::Auto && self.tool_calls.is_empty() {
            return Ok(!content.is_empty());
        }
        Ok(!self.tool_calls.is_empty())
    }

    async fn act(&mut self) -> Result<String, AgentError> {
        if self.tool_calls.is_empty() {
            if self.tool_choice == ToolChoice::Required {
                return Err(AgentError::ToolCallRequired);
            }
            let last = self
                .core
                .memory
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            return Ok(if last.is_empty() {
                NOTHING_TO_EXECUTE.to_string()
            } else {
                last
            });
        }

        let calls = self.tool_calls.clone();
        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            // 清除上一个调用遗留的图像
            self.current_base64_image = None;

            let mut result = self.execute_tool(call).await;

            if let Some(limit) = self.max_observe {
                if result.chars().count() > limit {
                    result = result.chars().take(limit).collect();
                }
            }

            info!(
                agent = %self.core.name,
                tool = %call.function.name,
                "工具完成了它的任务！结果: {}",
                result
            );

            let tool_msg = Message::tool(
                result.clone(),
                call.id.clone(),
                call.function.name.clone(),
                self.current_base64_image.take(),
            );
            self.core.memory.push(tool_msg);
            results.push(result);
        }

        Ok(results.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::llm::ScriptedLlm;
    use crate::memory::Role;
    use crate::tools::EchoTool;

    fn agent_with(llm: ScriptedLlm) -> ToolCallAgent {
        ToolCallAgent::new(Arc::new(llm)).with_tool(EchoTool)
    }

    #[test]
    fn test_agent_config_section_is_applied() {
        let cfg = AgentSection {
            max_steps: 5,
            duplicate_threshold: 3,
            max_observe: Some(64),
        };
        let agent = agent_with(ScriptedLlm::new()).with_agent_config(&cfg);
        assert_eq!(agent.core.max_steps, 5);
        assert_eq!(agent.core.duplicate_threshold, 3);
        assert_eq!(agent.max_observe, Some(64));
    }

    #[tokio::test]
    async fn test_required_without_calls_raises_in_act() {
        let llm = ScriptedLlm::new().push_content("没有工具可用");
        let mut agent = agent_with(llm).with_tool_choice(ToolChoice::Required);

        let should_act = agent.think().await.unwrap();
        assert!(should_act); // think 放行，由 act 报错
        let err = agent.act().await.unwrap_err();
        assert!(matches!(err, AgentError::ToolCallRequired));
    }

    #[tokio::test]
    async fn test_token_limit_is_terminal_for_run() {
        let llm = ScriptedLlm::new()
            .push_error(AgentError::TokenLimitExceeded("输入超限".to_string()));
        let mut agent = agent_with(llm);

        let output = agent.run(Some("任务")).await.unwrap();

        // 本步以 "无需行动" 收尾，run 正常返回
        assert!(output.contains("步骤 1"));
        assert!(output.contains(crate::agent::NO_ACTION_NEEDED));
        let recorded = agent
            .core
            .memory
            .messages()
            .iter()
            .any(|m| m.role == Role::Assistant && m.content.contains("达到最大令牌限制"));
        assert!(recorded);
    }

    #[tokio::test]
    async fn test_none_policy_ignores_tool_calls() {
        let llm = ScriptedLlm::new().push_tool_call("想调用工具", "echo", r#"{"text":"hi"}"#);
        let mut agent = agent_with(llm).with_tool_choice(ToolChoice::None);

        let should_act = agent.think().await.unwrap();
        assert!(should_act); // 有文本内容
        assert!(agent.tool_calls().is_empty());
    }

    #[tokio::test]
    async fn test_auto_with_content_only() {
        let llm = ScriptedLlm::new().push_content("直接回答");
        let mut agent = agent_with(llm);
        assert!(agent.think().await.unwrap());
        let output = agent.act().await.unwrap();
        assert_eq!(output, "直接回答");
    }

    #[tokio::test]
    async fn test_execute_tool_unknown_name() {
        let mut agent = agent_with(ScriptedLlm::new());
        let call = ToolCall::new("c1", "no_such_tool", "{}");
        let result = agent.execute_tool(&call).await;
        assert!(result.contains("错误: 未知工具"));
    }

    #[tokio::test]
    async fn test_execute_tool_malformed_json() {
        let mut agent = agent_with(ScriptedLlm::new());
        let call = ToolCall::new("c1", "echo", "{not json");
        let result = agent.execute_tool(&call).await;
        assert!(result.contains("无效的JSON格式"));
    }

    #[tokio::test]
    async fn test_execute_tool_internal_error_becomes_observation() {
        struct FailingTool;
        #[async_trait]
        impl Tool for FailingTool {
            fn name(&self) -> &str {
                "failing"
            }
            fn description(&self) -> &str {
                "always fails"
            }
            async fn execute(&self, _args: Value) -> Result<ToolResult, ToolError> {
                Err(ToolError::new("内部炸了"))
            }
        }

        let mut agent = agent_with(ScriptedLlm::new()).with_tool(FailingTool);
        let call = ToolCall::new("c1", "failing", "{}");
        let result = agent.execute_tool(&call).await;
        assert!(result.contains("错误: 内部炸了"));
        // 工具失败不改变状态
        assert_eq!(agent.core.state, AgentState::Idle);
    }

    #[tokio::test]
    async fn test_terminate_finishes_before_max_steps() {
        let llm = ScriptedLlm::new()
            .push_tool_call("先回显", "echo", r#"{"text":"第一步"}"#)
            .push_tool_call("收工", "terminate", r#"{"status":"success"}"#);
        let mut agent = agent_with(llm);
        agent.core.max_steps = 10;

        let output = agent.run(Some("做点事")).await.unwrap();

        assert!(output.contains("步骤 1"));
        assert!(output.contains("步骤 2"));
        assert!(!output.contains("步骤 3"));
        assert!(!output.contains("达到最大步骤数"));
        // run 返回后作用域化转换已恢复进入时的 IDLE
        assert_eq!(agent.core.state, AgentState::Idle);
    }

    #[tokio::test]
    async fn test_max_observe_truncates_recorded_output() {
        let llm = ScriptedLlm::new().push_tool_call(
            "回显长文本",
            "echo",
            r#"{"text":"0123456789012345678901234567890123456789"}"#,
        );
        let mut agent = agent_with(llm).with_max_observe(10);

        agent.think().await.unwrap();
        let output = agent.act().await.unwrap();
        assert_eq!(output.chars().count(), 10);

        let tool_msg = agent.core.memory.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.content.chars().count(), 10);
    }

    #[tokio::test]
    async fn test_finish_predicate_can_veto_termination() {
        let llm = ScriptedLlm::new().push_tool_call("尝试终止", "terminate", r#"{"status":"failure"}"#);
        let mut agent = agent_with(llm)
            .with_finish_predicate(Box::new(|_, result| !result.output.contains("failure")));

        agent.think().await.unwrap();
        agent.act().await.unwrap();
        assert_ne!(agent.core.state, AgentState::Finished);
    }
}
