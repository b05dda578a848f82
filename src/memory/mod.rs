//! 记忆层：消息模型与只追加的对话日志

pub mod message;
pub mod store;

pub use message::{Message, Role};
pub use store::Memory;
