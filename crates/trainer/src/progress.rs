use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPhase {
    Loading,
    Splitting,
    Training,
    Evaluating,
    Saving,
}

impl std::fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrainingPhase::Loading => "loading",
            TrainingPhase::Splitting => "splitting",
            TrainingPhase::Training => "training",
            TrainingPhase::Evaluating => "evaluating",
            TrainingPhase::Saving => "saving",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub state: TrainingState,
    pub phase: TrainingPhase,
    pub percent: f64,
    pub message: String,
}

/// Polled by a caller while a run drives itself to completion on its own
/// task; state + phase are updated together under one lock since a reader
/// should never observe a phase from a different state.
pub struct TrainingProgress {
    inner: Mutex<ProgressSnapshot>,
}

impl TrainingProgress {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ProgressSnapshot {
                state: TrainingState::Queued,
                phase: TrainingPhase::Loading,
                percent: 0.0,
                message: "queued".to_string(),
            }),
        }
    }

    pub fn update(&self, state: TrainingState, phase: TrainingPhase, percent: f64, message: impl Into<String>) {
        let mut guard = self.inner.lock().unwrap();
        guard.state = state;
        guard.phase = phase;
        guard.percent = percent;
        guard.message = message.into();
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.lock().unwrap().clone()
    }
}

impl Default for TrainingProgress {
    fn default() -> Self {
        Self::new()
    }
}
