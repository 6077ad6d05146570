//! Invocation state machine.
//!
//! `Received → Located → Parsed → Normalized → Loaded → Done`, or
//! `Failed { stage, .. }` from any non-terminal state.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Stage of an invocation; where a failure or issue originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Request,
    Locate,
    Parse,
    Normalize,
    Load,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Request => "request",
            Stage::Locate => "locate",
            Stage::Parse => "parse",
            Stage::Normalize => "normalize",
            Stage::Load => "load",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an invocation currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Located,
    Parsed,
    Normalized,
    Loaded,
    Done,
    Failed { stage: Stage, reason: String },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Received => "received",
            PipelineState::Located => "located",
            PipelineState::Parsed => "parsed",
            PipelineState::Normalized => "normalized",
            PipelineState::Loaded => "loaded",
            PipelineState::Done => "done",
            PipelineState::Failed { .. } => "failed",
        }
    }

    /// The stage that runs from this state.
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Received => Some(Stage::Locate),
            PipelineState::Located => Some(Stage::Parse),
            PipelineState::Parsed => Some(Stage::Normalize),
            PipelineState::Normalized => Some(Stage::Load),
            PipelineState::Loaded | PipelineState::Done | PipelineState::Failed { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }

    fn successor(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Received => Some(PipelineState::Located),
            PipelineState::Located => Some(PipelineState::Parsed),
            PipelineState::Parsed => Some(PipelineState::Normalized),
            PipelineState::Normalized => Some(PipelineState::Loaded),
            PipelineState::Loaded => Some(PipelineState::Done),
            PipelineState::Done | PipelineState::Failed { .. } => None,
        }
    }
}

/// Tracks one invocation's progress through its states.
#[derive(Debug)]
pub struct StateMachine {
    state: PipelineState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Received,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Move to the next state. A terminal state stays put.
    pub fn advance(&mut self) -> &PipelineState {
        match self.state.successor() {
            Some(next) => {
                debug!(from = self.state.name(), to = next.name(), "State transition");
                self.state = next;
            }
            None => warn!(state = self.state.name(), "Ignoring advance from terminal state"),
        }
        &self.state
    }

    /// Jump straight to `Done`, e.g. when there is nothing to load.
    pub fn finish(&mut self) {
        if !self.state.is_terminal() {
            info!(from = self.state.name(), "Invocation done");
            self.state = PipelineState::Done;
        }
    }

    /// Fail the stage that runs from the current state and return it.
    ///
    /// A failure after the last stage completed is attributed to `Load`.
    pub fn fail(&mut self, reason: impl Into<String>) -> Stage {
        if let PipelineState::Failed { stage, .. } = &self.state {
            return *stage;
        }
        let stage = self.state.next_stage().unwrap_or(Stage::Load);
        let reason = reason.into();
        warn!(from = self.state.name(), %stage, reason = %reason, "Invocation failed");
        self.state = PipelineState::Failed { stage, reason };
        stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_visits_every_state() {
        let mut machine = StateMachine::new();
        let mut visited = vec![machine.state().name()];
        while !machine.state().is_terminal() {
            visited.push(machine.advance().name());
        }
        assert_eq!(
            visited,
            vec!["received", "located", "parsed", "normalized", "loaded", "done"]
        );
    }

    #[test]
    fn test_next_stage_follows_state() {
        let mut machine = StateMachine::new();
        assert_eq!(machine.state().next_stage(), Some(Stage::Locate));
        machine.advance();
        assert_eq!(machine.state().next_stage(), Some(Stage::Parse));
        machine.advance();
        machine.advance();
        assert_eq!(machine.state().next_stage(), Some(Stage::Load));
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut machine = StateMachine::new();
        machine.advance();
        assert_eq!(machine.fail("bad header"), Stage::Parse);
        machine.advance();
        machine.finish();
        assert_eq!(machine.fail("later"), Stage::Parse);

        assert_eq!(
            machine.state(),
            &PipelineState::Failed {
                stage: Stage::Parse,
                reason: "bad header".into()
            }
        );
    }

    #[test]
    fn test_failure_is_attributed_to_running_stage() {
        let mut machine = StateMachine::new();
        assert_eq!(machine.fail("no listing"), Stage::Locate);

        let mut machine = StateMachine::new();
        for _ in 0..3 {
            machine.advance();
        }
        assert_eq!(machine.fail("warehouse down"), Stage::Load);
        assert_eq!(machine.state().name(), "failed");
    }

    #[test]
    fn test_stage_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Stage::Normalize).unwrap(), "\"normalize\"");
    }
}
