use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    #[default]
    Active,
    Idle,
    Stopped,
}

impl Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            WorkerState::Active => "active",
            WorkerState::Idle => "idle",
            WorkerState::Stopped => "stopped",
        };
        write!(f, "{}", state)
    }
}
