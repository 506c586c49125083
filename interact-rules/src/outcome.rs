use serde::{Deserialize, Serialize};

use interact_store::ActionSummary;

/// Per-rule result returned to the caller when a rule fires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FiredRule {
    pub rule_id: String,
    pub actions: ActionSummary,
    /// Human-readable `entity.field operator` labels for every condition
    /// the rule carries, reflecting what was checked rather than the
    /// per-condition outcome.
    pub conditions_met: Vec<String>,
}

/// Aggregated response of one orchestrator invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionReport {
    pub success: bool,
    pub executed_rules: usize,
    pub rules: Vec<FiredRule>,
}

impl ExecutionReport {
    pub fn new(rules: Vec<FiredRule>) -> Self {
        Self {
            success: true,
            executed_rules: rules.len(),
            rules,
        }
    }
}
