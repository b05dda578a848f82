//! 对话记忆
//!
//! 每个智能体实例独占一份 Memory：有序、只追加的消息日志，构成模型上下文；
//! 不提供重排或删除操作。卡住检测在此实现（重复的 assistant 输出说明未取得进展）。

use crate::memory::{Message, Role};

/// 只追加的消息日志
#[derive(Clone, Debug, Default)]
pub struct Memory {
    messages: Vec<Message>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn extend(&mut self, msgs: impl IntoIterator<Item = Message>) {
        self.messages.extend(msgs);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 卡住检测：最新一条消息的内容在此前的 assistant 消息中出现
    /// 至少 duplicate_threshold 次。少于 2 条消息或最新内容为空时不判定。
    pub fn is_stuck(&self, duplicate_threshold: usize) -> bool {
        if self.messages.len() < 2 {
            return false;
        }
        let Some(last) = self.messages.last() else {
            return false;
        };
        if last.content.is_empty() {
            return false;
        }

        let duplicate_count = self.messages[..self.messages.len() - 1]
            .iter()
            .filter(|m| m.role == Role::Assistant && m.content == last.content)
            .count();

        duplicate_count >= duplicate_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut memory = Memory::new();
        memory.push(Message::user("a"));
        memory.push(Message::assistant("b"));
        memory.push(Message::user("c"));
        let contents: Vec<&str> = memory.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_is_stuck_requires_two_messages() {
        let mut memory = Memory::new();
        memory.push(Message::assistant("loop"));
        assert!(!memory.is_stuck(1));
    }

    #[test]
    fn test_is_stuck_counts_prior_assistant_duplicates() {
        let mut memory = Memory::new();
        memory.push(Message::assistant("loop"));
        memory.push(Message::user("continue"));
        memory.push(Message::assistant("loop"));
        memory.push(Message::assistant("loop"));
        // 最新内容 "loop" 在之前的 assistant 消息中出现 2 次
        assert!(memory.is_stuck(2));
        assert!(!memory.is_stuck(3));
    }

    #[test]
    fn test_is_stuck_ignores_user_duplicates() {
        let mut memory = Memory::new();
        memory.push(Message::user("same"));
        memory.push(Message::user("same"));
        memory.push(Message::assistant("same"));
        assert!(!memory.is_stuck(2));
    }

    #[test]
    fn test_is_stuck_empty_content_never_stuck() {
        let mut memory = Memory::new();
        memory.push(Message::assistant(""));
        memory.push(Message::assistant(""));
        memory.push(Message::assistant(""));
        assert!(!memory.is_stuck(1));
    }
}
