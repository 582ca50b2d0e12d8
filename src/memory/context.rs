//! 会话上下文：最近 N 轮对话 + 草稿记忆（最新的屏幕 / 摄像头观察）
//!
//! 显式地传入每一轮处理，而不是全局状态；循环结束后仍可检查。

use crate::memory::ConversationTurn;

#[derive(Clone, Debug)]
pub struct SessionContext {
    history: Vec<ConversationTurn>,
    max_turns: usize,
    /// (标签, 内容)，同一标签只保留最新一条
    observations: Vec<(String, String)>,
    turns_handled: u64,
}

impl SessionContext {
    pub fn new(max_turns: usize) -> Self {
        Self {
            history: Vec::new(),
            max_turns: max_turns.max(1),
            observations: Vec::new(),
            turns_handled: 0,
        }
    }

    /// 追加一轮，超出 max_turns 时丢弃最旧的
    pub fn commit(&mut self, turn: ConversationTurn) {
        self.history.push(turn);
        self.turns_handled += 1;
        if self.history.len() > self.max_turns {
            let excess = self.history.len() - self.max_turns;
            self.history.drain(..excess);
        }
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn turns_handled(&self) -> u64 {
        self.turns_handled
    }

    pub fn observe(&mut self, label: impl Into<String>, content: impl Into<String>) {
        let label = label.into();
        let content = content.into();
        match self.observations.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = content,
            None => self.observations.push((label, content)),
        }
    }

    pub fn observations(&self) -> &[(String, String)] {
        &self.observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Intent, Utterance};

    #[test]
    fn test_commit_bounds_history() {
        let mut ctx = SessionContext::new(2);
        for text in ["a", "b", "c"] {
            ctx.commit(ConversationTurn::new(
                Utterance::console(text),
                Intent::Shutdown,
                None,
                "",
                Vec::new(),
            ));
        }
        assert_eq!(ctx.history().len(), 2);
        assert_eq!(ctx.history()[0].utterance.text, "b");
        assert_eq!(ctx.turns_handled(), 3);
    }

    #[test]
    fn test_observe_keeps_latest_per_label() {
        let mut ctx = SessionContext::new(4);
        ctx.observe("Screen", "old");
        ctx.observe("Webcam", "frame");
        ctx.observe("Screen", "new");
        assert_eq!(
            ctx.observations(),
            &[
                ("Screen".to_string(), "new".to_string()),
                ("Webcam".to_string(), "frame".to_string())
            ]
        );
    }
}
