//! 工具层：Tool trait、结果模型、注册表与内置工具（terminate / planning / echo）

pub mod echo;
pub mod planning;
pub mod registry;
pub mod result;
pub mod terminate;

pub use echo::EchoTool;
pub use planning::{Plan, PlanStore, PlanningTool, StepStatus};
pub use registry::{Tool, ToolRegistry};
pub use result::ToolResult;
pub use terminate::Terminate;
