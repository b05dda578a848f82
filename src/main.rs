//! Mantis - Rust 智能体执行引擎
//!
//! 演示入口：用脚本化 LLM 驱动一个工具调用智能体走完回显 + 终止的完整循环。

use std::sync::Arc;

use anyhow::Context;
use mantis::llm::ScriptedLlm;
use mantis::tools::EchoTool;
use mantis::{Agent, ToolCallAgent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mantis::observability::init();

    let cfg = mantis::config::load_config(None).context("Failed to load config")?;

    // 脚本化 LLM：先回显一次，再调用 terminate 结束
    let llm = ScriptedLlm::new()
        .push_tool_call("先试一下回显工具", "echo", r#"{"text":"你好，Mantis"}"#)
        .push_tool_call("任务完成，收工", "terminate", r#"{"status":"success"}"#);

    let mut agent = ToolCallAgent::new(Arc::new(llm))
        .with_tool(EchoTool)
        .with_agent_config(&cfg.agent);
    let result = agent
        .run(Some("演示一次完整的智能体循环"))
        .await
        .context("Agent run failed")?;

    println!("{}", result);
    Ok(())
}
