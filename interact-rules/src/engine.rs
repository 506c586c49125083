use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};
use uuid::Uuid;

use interact_store::{EntityStore, Rule, RuleExecution};

use crate::action::ActionExecutor;
use crate::error::EngineError;
use crate::evaluator::RuleEvaluator;
use crate::notify::NotificationSender;
use crate::outcome::{ExecutionReport, FiredRule};

const DEFAULT_RULE_TIMEOUT: Duration = Duration::from_secs(5);

/// External event that triggers a rule run. Only `user_email` is required;
/// user-level rules can fire without a trigger record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    #[serde(default)]
    pub trigger_entity: Option<String>,
    #[serde(default)]
    pub trigger_entity_id: Option<String>,
    #[serde(default)]
    pub user_email: String,
}

impl TriggerEvent {
    pub fn for_user(user_email: impl Into<String>) -> Self {
        Self {
            trigger_entity: None,
            trigger_entity_id: None,
            user_email: user_email.into(),
        }
    }

    pub fn with_trigger(
        mut self,
        entity: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        self.trigger_entity = Some(entity.into());
        self.trigger_entity_id = Some(id.into());
        self
    }
}

/// Per-user advisory locks serializing the evaluate-act-record sequence.
#[derive(Default, Clone)]
struct UserLocks {
    inner: Arc<parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl UserLocks {
    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock();
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Entry point of the rules engine.
///
/// Loads every active rule, evaluates each one and performs the actions of
/// the ones that fire, appending an audit row and bumping the rule's
/// trigger counter. A failure in one rule never blocks the others; only a
/// failure to list the active rules aborts the invocation.
pub struct RuleEngine {
    store: Arc<dyn EntityStore>,
    evaluator: RuleEvaluator,
    executor: ActionExecutor,
    locks: UserLocks,
    rule_timeout: Duration,
}

impl RuleEngine {
    pub fn new(store: Arc<dyn EntityStore>, notifier: Arc<dyn NotificationSender>) -> Self {
        let evaluator = RuleEvaluator::new(store.clone());
        let executor = ActionExecutor::new(store.clone(), notifier);
        Self {
            store,
            evaluator,
            executor,
            locks: UserLocks::default(),
            rule_timeout: DEFAULT_RULE_TIMEOUT,
        }
    }

    /// Caps how long a single rule may take to evaluate and fire.
    pub fn with_rule_timeout(mut self, timeout: Duration) -> Self {
        self.rule_timeout = timeout;
        self
    }

    pub async fn run(&self, event: TriggerEvent) -> Result<ExecutionReport, EngineError> {
        if event.user_email.trim().is_empty() {
            return Err(EngineError::MissingUserEmail);
        }

        let rules = self
            .store
            .active_rules()
            .await
            .map_err(EngineError::Listing)?;

        let mut fired = Vec::new();
        for rule in &rules {
            match tokio::time::timeout(self.rule_timeout, self.process_rule(rule, &event)).await {
                Ok(Ok(Some(result))) => fired.push(result),
                Ok(Ok(None)) => {}
                Ok(Err(err)) => {
                    error!(
                        rule_id = %rule.id,
                        rule_name = %rule.name,
                        error = %err,
                        "rule processing failed, continuing with remaining rules"
                    );
                }
                Err(_) => {
                    error!(
                        rule_id = %rule.id,
                        rule_name = %rule.name,
                        timeout = ?self.rule_timeout,
                        "rule processing timed out, continuing with remaining rules"
                    );
                }
            }
        }

        info!(
            user = %event.user_email,
            evaluated = rules.len(),
            executed = fired.len(),
            "rule run complete"
        );

        Ok(ExecutionReport::new(fired))
    }

    /// Processes one rule under the user's advisory lock, so concurrent
    /// triggers for the same user observe each other's execution rows
    /// before deciding to fire.
    async fn process_rule(
        &self,
        rule: &Rule,
        event: &TriggerEvent,
    ) -> Result<Option<FiredRule>, EngineError> {
        let _guard = self.locks.acquire(&event.user_email).await;
        let now = Utc::now();

        let should_fire = self
            .evaluator
            .should_fire(
                rule,
                event.trigger_entity.as_deref(),
                event.trigger_entity_id.as_deref(),
                &event.user_email,
                now,
            )
            .await?;

        if !should_fire {
            return Ok(None);
        }

        debug!(rule_id = %rule.id, user = %event.user_email, "rule fired");
        let result = self.executor.execute(rule, &event.user_email, now).await?;

        self.store
            .append_execution(RuleExecution {
                id: Uuid::new_v4(),
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                user_email: event.user_email.clone(),
                trigger_entity: event.trigger_entity.clone(),
                trigger_entity_id: event.trigger_entity_id.clone(),
                executed_at: now,
                actions: result.actions.clone(),
                conditions_met: result.conditions_met.clone(),
                success: true,
            })
            .await?;

        self.store.increment_execution_count(&rule.id).await?;

        Ok(Some(result))
    }
}
