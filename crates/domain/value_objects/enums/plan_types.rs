use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    #[default]
    Trial,
    Free,
    Premium,
}

impl PlanType {
    pub fn from_str(value: &str) -> Self {
        match value {
            "premium" => PlanType::Premium,
            "free" => PlanType::Free,
            "trial" => PlanType::Trial,
            _ => PlanType::Free,
        }
    }

    pub fn allows_grace_period(&self) -> bool {
        matches!(self, PlanType::Premium)
    }
}

impl Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plan_type = match self {
            PlanType::Trial => "trial",
            PlanType::Free => "free",
            PlanType::Premium => "premium",
        };
        write!(f, "{}", plan_type)
    }
}
