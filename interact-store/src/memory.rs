use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::model::{
    Badge, BadgeAward, PointsLedgerEntry, Rule, RuleExecution, UserPoints, UserRecord,
};
use crate::registry::EntityKind;
use crate::store::{EntityStore, StoreError};

#[derive(Default)]
struct Inner {
    rules: HashMap<String, Rule>,
    executions: Vec<RuleExecution>,
    points: HashMap<String, UserPoints>,
    ledger: Vec<PointsLedgerEntry>,
    badges: HashMap<String, Badge>,
    badge_awards: Vec<BadgeAward>,
    users: HashMap<String, UserRecord>,
    records: HashMap<EntityKind, Vec<Value>>,
}

/// In-memory entity store used by tests and single-process deployments.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a badge definition.
    pub fn insert_badge(&self, badge: Badge) {
        self.inner.write().badges.insert(badge.id.clone(), badge);
    }

    /// Seeds an identity row.
    pub fn insert_user(&self, user: UserRecord) {
        self.inner.write().users.insert(user.email.clone(), user);
    }

    /// Seeds a raw record into one of the registered collections.
    pub fn insert_record(&self, kind: EntityKind, record: Value) {
        self.inner.write().records.entry(kind).or_default().push(record);
    }

    /// Snapshot of badge award rows, newest last.
    pub fn badge_awards(&self) -> Vec<BadgeAward> {
        self.inner.read().badge_awards.clone()
    }

    /// Snapshot of execution rows, newest last.
    pub fn executions(&self) -> Vec<RuleExecution> {
        self.inner.read().executions.clone()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn active_rules(&self) -> Result<Vec<Rule>, StoreError> {
        let inner = self.inner.read();
        let mut rules: Vec<Rule> = inner
            .rules
            .values()
            .filter(|rule| rule.is_active)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rules)
    }

    async fn rules(&self) -> Result<Vec<Rule>, StoreError> {
        let inner = self.inner.read();
        let mut rules: Vec<Rule> = inner.rules.values().cloned().collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rules)
    }

    async fn rule(&self, id: &str) -> Result<Option<Rule>, StoreError> {
        Ok(self.inner.read().rules.get(id).cloned())
    }

    async fn upsert_rule(&self, rule: Rule) -> Result<Rule, StoreError> {
        self.inner.write().rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    async fn set_rule_active(&self, id: &str, active: bool) -> Result<Rule, StoreError> {
        let mut inner = self.inner.write();
        let rule = inner
            .rules
            .get_mut(id)
            .ok_or_else(|| StoreError::RuleNotFound(id.to_string()))?;
        rule.is_active = active;
        Ok(rule.clone())
    }

    async fn increment_execution_count(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let rule = inner
            .rules
            .get_mut(id)
            .ok_or_else(|| StoreError::RuleNotFound(id.to_string()))?;
        rule.execution_count += 1;
        Ok(())
    }

    async fn executions_for(
        &self,
        rule_id: &str,
        user_email: &str,
    ) -> Result<Vec<RuleExecution>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .executions
            .iter()
            .filter(|execution| {
                execution.rule_id == rule_id && execution.user_email == user_email
            })
            .cloned()
            .collect())
    }

    async fn append_execution(&self, execution: RuleExecution) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if let Some(trigger_id) = &execution.trigger_entity_id {
            let duplicate = inner.executions.iter().any(|existing| {
                existing.rule_id == execution.rule_id
                    && existing.user_email == execution.user_email
                    && existing.trigger_entity_id.as_deref() == Some(trigger_id.as_str())
            });
            if duplicate {
                return Err(StoreError::DuplicateExecution {
                    rule_id: execution.rule_id,
                    user_email: execution.user_email,
                    trigger_entity_id: trigger_id.clone(),
                });
            }
        }
        inner.executions.push(execution);
        Ok(())
    }

    async fn user_points(&self, user_email: &str) -> Result<Option<UserPoints>, StoreError> {
        Ok(self.inner.read().points.get(user_email).cloned())
    }

    async fn put_user_points(&self, points: UserPoints) -> Result<UserPoints, StoreError> {
        self.inner
            .write()
            .points
            .insert(points.user_email.clone(), points.clone());
        Ok(points)
    }

    async fn append_ledger_entry(&self, entry: PointsLedgerEntry) -> Result<(), StoreError> {
        self.inner.write().ledger.push(entry);
        Ok(())
    }

    async fn ledger_entries_for(
        &self,
        user_email: &str,
    ) -> Result<Vec<PointsLedgerEntry>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .ledger
            .iter()
            .filter(|entry| entry.user_email == user_email)
            .cloned()
            .collect())
    }

    async fn badge(&self, id: &str) -> Result<Option<Badge>, StoreError> {
        Ok(self.inner.read().badges.get(id).cloned())
    }

    async fn has_badge_award(
        &self,
        user_email: &str,
        badge_id: &str,
    ) -> Result<bool, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .badge_awards
            .iter()
            .any(|award| award.user_email == user_email && award.badge_id == badge_id))
    }

    async fn append_badge_award(&self, award: BadgeAward) -> Result<(), StoreError> {
        self.inner.write().badge_awards.push(award);
        Ok(())
    }

    async fn user(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.inner.read().users.get(email).cloned())
    }

    async fn record_by_id(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.records.get(&kind).and_then(|records| {
            records
                .iter()
                .find(|record| record.get("id").and_then(Value::as_str) == Some(id))
                .cloned()
        }))
    }

    async fn record_for_user(
        &self,
        kind: EntityKind,
        user_email: &str,
    ) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.records.get(&kind).and_then(|records| {
            records
                .iter()
                .find(|record| {
                    record.get("user_email").and_then(Value::as_str) == Some(user_email)
                })
                .cloned()
        }))
    }
}
