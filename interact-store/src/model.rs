use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Comparison operator applied by a rule condition to a record field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    Contains,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    Exists,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::Equals => "equals",
            Operator::Contains => "contains",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::Exists => "exists",
        };
        f.write_str(name)
    }
}

/// One declarative condition: inspect `field` on a record of `entity` and
/// compare it to `value` using `operator`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub entity: String,
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    /// Audit label recorded with every execution, e.g. `Participation.attended equals`.
    pub fn describe(&self) -> String {
        format!("{}.{} {}", self.entity, self.field, self.operator)
    }
}

/// Combinator applied across a rule's conditions. Anything that is not a
/// recognized combinator deserializes to `Unknown` and never fires.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleLogic {
    #[default]
    And,
    Or,
    #[serde(other)]
    Unknown,
}

/// Action block executed when a rule fires. Absent fields mean the action
/// type is skipped entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleActions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub award_points: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub award_badge: Option<String>,
    #[serde(default)]
    pub send_notification: bool,
}

/// Declarative trigger definition evaluated by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub logic: RuleLogic,
    #[serde(default)]
    pub actions: RuleActions,
    /// Minimum gap in hours between firings for the same user.
    #[serde(default)]
    pub cooldown_hours: Option<i64>,
    /// Cap on firings per calendar month per user.
    #[serde(default)]
    pub max_triggers_per_month: Option<u32>,
    /// Incremented by the orchestrator on every successful fire.
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default = "Rule::default_active")]
    pub is_active: bool,
}

impl Rule {
    pub fn default_active() -> bool {
        true
    }
}

/// Summary of what the action executor changed for one firing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActionSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_awarded: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_awarded: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub notification_sent: bool,
}

/// Append-only audit record of one rule firing. Doubles as the throttling
/// store: cooldown and monthly-cap state is reconstructed from these rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleExecution {
    pub id: Uuid,
    pub rule_id: String,
    pub rule_name: String,
    pub user_email: String,
    #[serde(default)]
    pub trigger_entity: Option<String>,
    #[serde(default)]
    pub trigger_entity_id: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub actions: ActionSummary,
    pub conditions_met: Vec<String>,
    pub success: bool,
}

/// One row per user, created lazily on first award.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPoints {
    pub user_email: String,
    pub total_points: i64,
    /// Monotonically non-decreasing; never reduced by spending.
    pub lifetime_points: i64,
    pub points_this_month: i64,
    pub level: u32,
}

impl UserPoints {
    pub fn new(user_email: impl Into<String>) -> Self {
        Self {
            user_email: user_email.into(),
            total_points: 0,
            lifetime_points: 0,
            points_this_month: 0,
            level: 1,
        }
    }
}

/// Where a ledger entry came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PointsSource {
    RuleExecution,
    DirectAward,
}

/// Append-only transaction history row for point changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointsLedgerEntry {
    pub id: Uuid,
    pub user_email: String,
    pub amount: i64,
    pub reason: String,
    pub source: PointsSource,
    pub recorded_at: DateTime<Utc>,
}

/// Badge definition. `repeatable` controls whether the same user may earn
/// the badge more than once through rule fires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Badge {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub repeatable: bool,
}

/// Provenance tag on a badge grant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EarnedThrough {
    RuleExecution,
    Manual,
}

/// Append-only badge grant record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BadgeAward {
    pub id: Uuid,
    pub user_email: String,
    pub badge_id: String,
    pub awarded_at: DateTime<Utc>,
    pub earned_through: EarnedThrough,
}

/// Raw identity row, the input to role resolution. `role` and `user_type`
/// are free-form flags as stored by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}
