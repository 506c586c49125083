use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::model::{
    Badge, BadgeAward, PointsLedgerEntry, Rule, RuleExecution, UserPoints, UserRecord,
};
use crate::registry::EntityKind;

/// Errors surfaced by entity store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rule not found: {0}")]
    RuleNotFound(String),

    #[error("duplicate execution for rule {rule_id}, user {user_email}, trigger {trigger_entity_id}")]
    DuplicateExecution {
        rule_id: String,
        user_email: String,
        trigger_entity_id: String,
    },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Interface to the entity platform backing the engagement core.
///
/// Production deployments talk to the hosted platform through this trait;
/// [`crate::MemoryStore`] backs tests and single-process runs. Writes are
/// individually durable but carry no cross-write transaction guarantees,
/// which is why the orchestrator serializes the fire sequence per user.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// All rules with `is_active = true`.
    async fn active_rules(&self) -> Result<Vec<Rule>, StoreError>;

    /// Every rule, regardless of active flag.
    async fn rules(&self) -> Result<Vec<Rule>, StoreError>;

    async fn rule(&self, id: &str) -> Result<Option<Rule>, StoreError>;

    async fn upsert_rule(&self, rule: Rule) -> Result<Rule, StoreError>;

    async fn set_rule_active(&self, id: &str, active: bool) -> Result<Rule, StoreError>;

    async fn increment_execution_count(&self, id: &str) -> Result<(), StoreError>;

    /// Audit rows for `(rule_id, user_email)`, used to reconstruct cooldown
    /// and monthly-cap state.
    async fn executions_for(
        &self,
        rule_id: &str,
        user_email: &str,
    ) -> Result<Vec<RuleExecution>, StoreError>;

    /// Appends an execution row. Implementations must reject a duplicate
    /// `(rule_id, user_email, trigger_entity_id)` when a trigger id is
    /// present, so replayed trigger events cannot double-fire.
    async fn append_execution(&self, execution: RuleExecution) -> Result<(), StoreError>;

    async fn user_points(&self, user_email: &str) -> Result<Option<UserPoints>, StoreError>;

    async fn put_user_points(&self, points: UserPoints) -> Result<UserPoints, StoreError>;

    async fn append_ledger_entry(&self, entry: PointsLedgerEntry) -> Result<(), StoreError>;

    async fn ledger_entries_for(
        &self,
        user_email: &str,
    ) -> Result<Vec<PointsLedgerEntry>, StoreError>;

    async fn badge(&self, id: &str) -> Result<Option<Badge>, StoreError>;

    async fn has_badge_award(&self, user_email: &str, badge_id: &str)
        -> Result<bool, StoreError>;

    async fn append_badge_award(&self, award: BadgeAward) -> Result<(), StoreError>;

    async fn user(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Fetches a record from a registered collection by its `id` field.
    async fn record_by_id(&self, kind: EntityKind, id: &str)
        -> Result<Option<Value>, StoreError>;

    /// Fetches the first record from a registered collection whose
    /// `user_email` field matches.
    async fn record_for_user(
        &self,
        kind: EntityKind,
        user_email: &str,
    ) -> Result<Option<Value>, StoreError>;
}
