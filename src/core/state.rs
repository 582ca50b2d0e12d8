//! 编排循环的状态
//!
//! Idle → Listening → Routing → {Confirming, Executing, Generating} → Responding → Idle。
//! 每轮经过的状态记录在 TurnTrace 中，随 ConversationTurn 一起保存。

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Listening,
    Routing,
    Confirming,
    Executing,
    Generating,
    Responding,
}

/// 确认阶段的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    Approved,
    Declined,
    TimedOut,
}

impl ConfirmationOutcome {
    pub fn approved(self) -> bool {
        matches!(self, ConfirmationOutcome::Approved)
    }
}

/// 单轮的状态轨迹
#[derive(Clone, Debug, Default)]
pub struct TurnTrace {
    states: Vec<LoopState>,
}

impl TurnTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, state: LoopState) {
        tracing::debug!(?state, "loop state");
        self.states.push(state);
    }

    pub fn states(&self) -> &[LoopState] {
        &self.states
    }

    pub fn into_states(self) -> Vec<LoopState> {
        self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_records_in_order() {
        let mut trace = TurnTrace::new();
        trace.enter(LoopState::Routing);
        trace.enter(LoopState::Confirming);
        trace.enter(LoopState::Responding);
        assert_eq!(
            trace.into_states(),
            vec![LoopState::Routing, LoopState::Confirming, LoopState::Responding]
        );
    }

    #[test]
    fn test_only_approved_counts() {
        assert!(ConfirmationOutcome::Approved.approved());
        assert!(!ConfirmationOutcome::Declined.approved());
        assert!(!ConfirmationOutcome::TimedOut.approved());
    }
}
