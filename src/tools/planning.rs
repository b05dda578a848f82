//! 计划存储与规划工具
//!
//! PlanStore 记录一个长任务的有序步骤与逐步状态，是可克隆的共享句柄，
//! 变更全部经由自身的互斥锁串行化；PlanningTool 把它暴露为模型可调用的
//! `planning` 工具（create / update / list / get / set_active / mark_step / delete）。

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::tools::{Tool, ToolResult};

/// 计划步骤状态；只有 {not_started, in_progress} 视为"活动"（可成为当前步骤）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::NotStarted => "not_started",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ToolError> {
        match s {
            "not_started" => Ok(StepStatus::NotStarted),
            "in_progress" => Ok(StepStatus::InProgress),
            "completed" => Ok(StepStatus::Completed),
            "blocked" => Ok(StepStatus::Blocked),
            other => Err(ToolError::new(format!("无效的步骤状态: {}", other))),
        }
    }

    /// 渲染时的状态标记
    pub fn glyph(&self) -> &'static str {
        match self {
            StepStatus::NotStarted => "[ ]",
            StepStatus::InProgress => "[→]",
            StepStatus::Completed => "[✓]",
            StepStatus::Blocked => "[!]",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, StepStatus::NotStarted | StepStatus::InProgress)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一个任务的计划：标题 + 有序步骤 + 平行的状态序列
#[derive(Clone, Debug)]
pub struct Plan {
    pub id: String,
    pub title: String,
    pub steps: Vec<String>,
    pub step_statuses: Vec<StepStatus>,
}

impl Plan {
    /// 文本渲染（提示词消费的稳定格式）
    pub fn render(&self) -> String {
        let mut text = format!("计划: {}\n\n步骤:\n", self.title);
        for (step, status) in self.steps.iter().zip(&self.step_statuses) {
            text.push_str(&format!("{} {}\n", status.glyph(), step));
        }
        text
    }

    pub fn completed_count(&self) -> usize {
        self.step_statuses
            .iter()
            .filter(|s| **s == StepStatus::Completed)
            .count()
    }
}

#[derive(Default)]
struct PlanStoreInner {
    plans: HashMap<String, Plan>,
    active_id: Option<String>,
}

/// 计划存储句柄：克隆共享同一份数据；一次只有一个变更在锁内执行
#[derive(Clone, Default)]
pub struct PlanStore {
    inner: Arc<Mutex<PlanStoreInner>>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PlanStoreInner> {
        self.inner.lock().expect("plan store lock poisoned")
    }

    /// 注册新计划：所有步骤初始化为 not_started，并设为活动计划
    pub fn create(&self, id: &str, title: &str, steps: Vec<String>) -> Result<Plan, ToolError> {
        if id.is_empty() {
            return Err(ToolError::new("命令需要参数 `plan_id`: create"));
        }
        if steps.is_empty() {
            return Err(ToolError::new("命令需要非空的步骤列表: create"));
        }
        let mut inner = self.lock();
        if inner.plans.contains_key(id) {
            return Err(ToolError::new(format!(
                "ID 为 {} 的计划已存在，请使用 update 修改",
                id
            )));
        }
        let statuses = vec![StepStatus::NotStarted; steps.len()];
        let plan = Plan {
            id: id.to_string(),
            title: title.to_string(),
            steps,
            step_statuses: statuses,
        };
        inner.plans.insert(id.to_string(), plan.clone());
        inner.active_id = Some(id.to_string());
        Ok(plan)
    }

    /// 更新标题或步骤列表；与原步骤逐位相同的步骤保留其状态
    pub fn update(
        &self,
        id: &str,
        title: Option<&str>,
        steps: Option<Vec<String>>,
    ) -> Result<Plan, ToolError> {
        let mut inner = self.lock();
        let plan = inner
            .plans
            .get_mut(id)
            .ok_or_else(|| ToolError::new(format!("未找到 ID 为 {} 的计划", id)))?;
        if let Some(title) = title {
            plan.title = title.to_string();
        }
        if let Some(steps) = steps {
            let mut statuses = Vec::with_capacity(steps.len());
            for (i, step) in steps.iter().enumerate() {
                if plan.steps.get(i) == Some(step) {
                    statuses.push(plan.step_statuses[i]);
                } else {
                    statuses.push(StepStatus::NotStarted);
                }
            }
            plan.steps = steps;
            plan.step_statuses = statuses;
        }
        Ok(plan.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().plans.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Plan> {
        self.lock().plans.get(id).cloned()
    }

    /// 所有计划的快照（无序）
    pub fn list(&self) -> Vec<Plan> {
        self.lock().plans.values().cloned().collect()
    }

    pub fn active_id(&self) -> Option<String> {
        self.lock().active_id.clone()
    }

    pub fn set_active(&self, id: &str) -> Result<(), ToolError> {
        let mut inner = self.lock();
        if !inner.plans.contains_key(id) {
            return Err(ToolError::new(format!("未找到 ID 为 {} 的计划", id)));
        }
        inner.active_id = Some(id.to_string());
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<(), ToolError> {
        let mut inner = self.lock();
        if inner.plans.remove(id).is_none() {
            return Err(ToolError::new(format!("未找到 ID 为 {} 的计划", id)));
        }
        if inner.active_id.as_deref() == Some(id) {
            inner.active_id = None;
        }
        Ok(())
    }

    /// 按索引设置单个步骤的状态
    pub fn mark_step(&self, id: &str, step_index: usize, status: StepStatus) -> Result<(), ToolError> {
        let mut inner = self.lock();
        let plan = inner
            .plans
            .get_mut(id)
            .ok_or_else(|| ToolError::new(format!("未找到 ID 为 {} 的计划", id)))?;
        if step_index >= plan.steps.len() {
            return Err(ToolError::new(format!(
                "步骤索引 {} 超出范围（共 {} 步）",
                step_index,
                plan.steps.len()
            )));
        }
        plan.step_statuses[step_index] = status;
        Ok(())
    }

    /// 计划文本渲染
    pub fn render_text(&self, id: &str) -> Result<String, ToolError> {
        self.get(id)
            .map(|p| p.render())
            .ok_or_else(|| ToolError::new(format!("未找到 ID 为 {} 的计划", id)))
    }

    /// 当前步骤解析：按序扫描，第一个活动状态的步骤即"当前"；
    /// 找到则标记为 in_progress（已是则幂等）并返回索引与文本；
    /// 没有则返回 None（计划已完成）。
    pub fn current_step(&self, id: &str) -> Result<Option<(usize, String)>, ToolError> {
        let mut inner = self.lock();
        let plan = inner
            .plans
            .get_mut(id)
            .ok_or_else(|| ToolError::new(format!("未找到 ID 为 {} 的计划", id)))?;
        for (i, status) in plan.step_statuses.iter_mut().enumerate() {
            if status.is_active() {
                *status = StepStatus::InProgress;
                return Ok(Some((i, plan.steps[i].clone())));
            }
        }
        Ok(None)
    }
}

const PLANNING_DESCRIPTION: &str = "规划工具：创建和管理解决复杂任务的计划。\
提供创建计划、更新步骤、跟踪进度的能力。";

/// 模型可调用的规划工具，包装共享的 PlanStore
pub struct PlanningTool {
    store: PlanStore,
}

impl PlanningTool {
    pub const NAME: &'static str = "planning";

    pub fn new(store: PlanStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PlanStore {
        &self.store
    }

    /// 取参数中的 plan_id，缺省回落到活动计划
    fn resolve_plan_id(&self, args: &Value, command: &str) -> Result<String, ToolError> {
        if let Some(id) = args.get("plan_id").and_then(|v| v.as_str()) {
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }
        self.store
            .active_id()
            .ok_or_else(|| ToolError::new(format!("没有活动计划，命令需要参数 `plan_id`: {}", command)))
    }

    fn steps_from_args(args: &Value) -> Option<Vec<String>> {
        args.get("steps").and_then(|v| v.as_array()).map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
    }
}

#[async_trait]
impl Tool for PlanningTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        PLANNING_DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "要执行的命令。",
                    "enum": ["create", "update", "list", "get", "set_active", "mark_step", "delete"],
                },
                "plan_id": {
                    "type": "string",
                    "description": "计划的唯一标识符。create 与 set_active 必填；其余命令缺省使用活动计划。",
                },
                "title": {
                    "type": "string",
                    "description": "计划标题。create 必填，update 可选。",
                },
                "steps": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "计划步骤列表。create 必填，update 可选。",
                },
                "step_index": {
                    "type": "integer",
                    "description": "要更新的步骤索引（从 0 开始）。mark_step 必填。",
                },
                "step_status": {
                    "type": "string",
                    "enum": ["not_started", "in_progress", "completed", "blocked"],
                    "description": "mark_step 设置的步骤状态。",
                },
            },
            "required": ["command"],
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::new("缺少参数 `command`"))?;

        match command {
            "create" => {
                let plan_id = args
                    .get("plan_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let title = args
                    .get("title")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ToolError::new("命令需要参数 `title`: create"))?;
                let steps = Self::steps_from_args(&args)
                    .ok_or_else(|| ToolError::new("命令需要参数 `steps`: create"))?;
                let plan = self.store.create(plan_id, title, steps)?;
                Ok(ToolResult::success(format!(
                    "计划创建成功，ID: {}\n\n{}",
                    plan.id,
                    plan.render()
                )))
            }
            "update" => {
                let plan_id = self.resolve_plan_id(&args, command)?;
                let title = args.get("title").and_then(|v| v.as_str());
                let steps = Self::steps_from_args(&args);
                let plan = self.store.update(&plan_id, title, steps)?;
                Ok(ToolResult::success(format!("计划已更新:\n\n{}", plan.render())))
            }
            "list" => {
                let plans = self.store.list();
                if plans.is_empty() {
                    return Ok(ToolResult::success("没有可用的计划"));
                }
                let active = self.store.active_id();
                let mut lines = vec!["可用计划:".to_string()];
                for plan in plans {
                    let marker = if active.as_deref() == Some(plan.id.as_str()) {
                        "（活动）"
                    } else {
                        ""
                    };
                    lines.push(format!(
                        "• {}{}: {} - {}/{} 步骤已完成",
                        plan.id,
                        marker,
                        plan.title,
                        plan.completed_count(),
                        plan.steps.len()
                    ));
                }
                Ok(ToolResult::success(lines.join("\n")))
            }
            "get" => {
                let plan_id = self.resolve_plan_id(&args, command)?;
                let text = self.store.render_text(&plan_id)?;
                Ok(ToolResult::success(text))
            }
            "set_active" => {
                let plan_id = args
                    .get("plan_id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ToolError::new("命令需要参数 `plan_id`: set_active"))?;
                self.store.set_active(plan_id)?;
                let text = self.store.render_text(plan_id)?;
                Ok(ToolResult::success(format!(
                    "当前活动计划: {}\n\n{}",
                    plan_id, text
                )))
            }
            "mark_step" => {
                let plan_id = self.resolve_plan_id(&args, command)?;
                let step_index = args
                    .get("step_index")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| ToolError::new("命令需要参数 `step_index`: mark_step"))?
                    as usize;
                let status_str = args
                    .get("step_status")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ToolError::new("命令需要参数 `step_status`: mark_step"))?;
                let status = StepStatus::parse(status_str)?;
                self.store.mark_step(&plan_id, step_index, status)?;
                let text = self.store.render_text(&plan_id)?;
                Ok(ToolResult::success(format!(
                    "步骤 {} 已更新为 {}。\n\n{}",
                    step_index, status, text
                )))
            }
            "delete" => {
                let plan_id = args
                    .get("plan_id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ToolError::new("命令需要参数 `plan_id`: delete"))?;
                self.store.delete(plan_id)?;
                Ok(ToolResult::success(format!("计划 {} 已删除", plan_id)))
            }
            other => Err(ToolError::new(format!("无法识别的命令: {}", other))),
        }
    }
}
