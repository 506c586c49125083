use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use futures::future::join_all;
use tracing::debug;

use interact_store::{EntityStore, Rule, RuleLogic, StoreError};

use crate::condition::ConditionEvaluator;

/// Decides whether a rule should fire for a given trigger.
///
/// Prior executions double as the throttling store: the same rows that
/// audit past firings are used to reconstruct cooldown and monthly-cap
/// state, and to refuse replayed trigger events.
#[derive(Clone)]
pub struct RuleEvaluator {
    store: Arc<dyn EntityStore>,
    conditions: ConditionEvaluator,
}

impl RuleEvaluator {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        let conditions = ConditionEvaluator::new(store.clone());
        Self { store, conditions }
    }

    /// Throttling checks run before condition evaluation, so "in cooldown"
    /// keeps its meaning independent of condition truth.
    pub async fn should_fire(
        &self,
        rule: &Rule,
        trigger_entity: Option<&str>,
        trigger_id: Option<&str>,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let executions = self.store.executions_for(&rule.id, user_email).await?;

        // A replayed trigger event must not double-fire.
        if let Some(trigger_id) = trigger_id {
            let replay = executions
                .iter()
                .any(|execution| execution.trigger_entity_id.as_deref() == Some(trigger_id));
            if replay {
                debug!(rule_id = %rule.id, trigger_id, "trigger already processed");
                return Ok(false);
            }
        }

        if let Some(hours) = rule.cooldown_hours {
            if let Some(last) = executions.iter().map(|execution| execution.executed_at).max() {
                match last.checked_add_signed(Duration::hours(hours)) {
                    Some(ready_at) if now >= ready_at => {}
                    // Still cooling down, or the window overflowed.
                    _ => return Ok(false),
                }
            }
        }

        if let Some(cap) = rule.max_triggers_per_month {
            let month_start = month_start(now);
            let this_month = executions
                .iter()
                .filter(|execution| execution.executed_at >= month_start)
                .count();
            if this_month >= cap as usize {
                debug!(rule_id = %rule.id, cap, "monthly trigger cap reached");
                return Ok(false);
            }
        }

        // All conditions are evaluated eagerly; there is no ordering
        // dependency between them.
        let results = join_all(rule.conditions.iter().map(|condition| {
            self.conditions
                .evaluate(condition, trigger_entity, trigger_id, user_email)
        }))
        .await;

        Ok(match rule.logic {
            RuleLogic::And => results.iter().all(|satisfied| *satisfied),
            RuleLogic::Or => results.iter().any(|satisfied| *satisfied),
            RuleLogic::Unknown => false,
        })
    }
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now
        .date_naive()
        .with_day(1)
        .unwrap_or_else(|| now.date_naive());
    Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use interact_store::{
        ActionSummary, Condition, EntityKind, MemoryStore, Operator, RuleActions, RuleExecution,
    };
    use serde_json::json;
    use uuid::Uuid;

    fn rule(id: &str, logic: RuleLogic, conditions: Vec<Condition>) -> Rule {
        Rule {
            id: id.to_string(),
            name: format!("rule {id}"),
            description: None,
            conditions,
            logic,
            actions: RuleActions::default(),
            cooldown_hours: None,
            max_triggers_per_month: None,
            execution_count: 0,
            is_active: true,
        }
    }

    fn condition(entity: &str, field: &str, operator: Operator, value: serde_json::Value) -> Condition {
        Condition {
            entity: entity.to_string(),
            field: field.to_string(),
            operator,
            value,
        }
    }

    fn execution_at(rule_id: &str, user: &str, executed_at: DateTime<Utc>) -> RuleExecution {
        RuleExecution {
            id: Uuid::new_v4(),
            rule_id: rule_id.to_string(),
            rule_name: format!("rule {rule_id}"),
            user_email: user.to_string(),
            trigger_entity: None,
            trigger_entity_id: None,
            executed_at,
            actions: ActionSummary::default(),
            conditions_met: vec![],
            success: true,
        }
    }

    fn store_with_attendance() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_record(
            EntityKind::Participation,
            json!({"id": "p1", "user_email": "a@example.com", "attended": true, "score": 3}),
        );
        store
    }

    const USER: &str = "a@example.com";

    #[tokio::test]
    async fn cooldown_blocks_until_window_elapses() {
        let store = store_with_attendance();
        let now = Utc::now();
        store
            .append_execution(execution_at("r1", USER, now - Duration::minutes(5)))
            .await
            .unwrap();

        let evaluator = RuleEvaluator::new(Arc::new(store));
        let mut r1 = rule(
            "r1",
            RuleLogic::And,
            vec![condition("Participation", "attended", Operator::Equals, json!(true))],
        );
        r1.cooldown_hours = Some(24);

        let blocked = evaluator
            .should_fire(&r1, Some("Participation"), Some("p1"), USER, now)
            .await
            .unwrap();
        assert!(!blocked, "5 minutes into a 24h cooldown must not fire");

        let later = now + Duration::hours(25);
        let ready = evaluator
            .should_fire(&r1, Some("Participation"), Some("p1"), USER, later)
            .await
            .unwrap();
        assert!(ready, "after the cooldown the rule may fire again");
    }

    #[tokio::test]
    async fn monthly_cap_counts_only_current_month() {
        let store = store_with_attendance();
        let now = Utc::now();
        let start = month_start(now);
        // Two executions this month, one before the month began.
        store
            .append_execution(execution_at("r1", USER, start + Duration::minutes(1)))
            .await
            .unwrap();
        store
            .append_execution(execution_at("r1", USER, start + Duration::minutes(2)))
            .await
            .unwrap();
        store
            .append_execution(execution_at("r1", USER, start - Duration::hours(1)))
            .await
            .unwrap();

        let evaluator = RuleEvaluator::new(Arc::new(store));
        let mut r1 = rule(
            "r1",
            RuleLogic::And,
            vec![condition("Participation", "attended", Operator::Equals, json!(true))],
        );

        r1.max_triggers_per_month = Some(2);
        let capped = evaluator
            .should_fire(&r1, Some("Participation"), Some("p1"), USER, now)
            .await
            .unwrap();
        assert!(!capped, "cap of 2 with 2 executions this month must block");

        r1.max_triggers_per_month = Some(3);
        let allowed = evaluator
            .should_fire(&r1, Some("Participation"), Some("p1"), USER, now)
            .await
            .unwrap();
        assert!(allowed, "cap of 3 with 2 executions this month must pass");
    }

    #[tokio::test]
    async fn combinator_semantics() {
        let store = store_with_attendance();
        let evaluator = RuleEvaluator::new(Arc::new(store));
        let now = Utc::now();

        let satisfied = condition("Participation", "attended", Operator::Equals, json!(true));
        let unsatisfied = condition("Participation", "score", Operator::Gt, json!(10));

        let and_rule = rule("and", RuleLogic::And, vec![satisfied.clone(), unsatisfied.clone()]);
        assert!(!evaluator
            .should_fire(&and_rule, Some("Participation"), Some("p1"), USER, now)
            .await
            .unwrap());

        let or_rule = rule("or", RuleLogic::Or, vec![unsatisfied.clone(), satisfied.clone()]);
        assert!(evaluator
            .should_fire(&or_rule, Some("Participation"), Some("p1"), USER, now)
            .await
            .unwrap());

        let malformed = rule("bad", RuleLogic::Unknown, vec![satisfied.clone()]);
        assert!(!evaluator
            .should_fire(&malformed, Some("Participation"), Some("p1"), USER, now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn replayed_trigger_id_never_fires_again() {
        let store = store_with_attendance();
        let now = Utc::now();
        let mut replayed = execution_at("r1", USER, now - Duration::days(40));
        replayed.trigger_entity = Some("Participation".into());
        replayed.trigger_entity_id = Some("p1".into());
        store.append_execution(replayed).await.unwrap();

        let evaluator = RuleEvaluator::new(Arc::new(store));
        let r1 = rule(
            "r1",
            RuleLogic::And,
            vec![condition("Participation", "attended", Operator::Equals, json!(true))],
        );

        assert!(!evaluator
            .should_fire(&r1, Some("Participation"), Some("p1"), USER, now)
            .await
            .unwrap());

        // A fresh trigger for the same rule still fires.
        let store2 = store_with_attendance();
        store2.insert_record(
            EntityKind::Participation,
            json!({"id": "p2", "user_email": USER, "attended": true}),
        );
        let evaluator2 = RuleEvaluator::new(Arc::new(store2));
        assert!(evaluator2
            .should_fire(&r1, Some("Participation"), Some("p2"), USER, now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn empty_condition_list_fires_under_and() {
        let evaluator = RuleEvaluator::new(Arc::new(MemoryStore::new()));
        let open = rule("open", RuleLogic::And, vec![]);
        assert!(evaluator
            .should_fire(&open, None, None, USER, Utc::now())
            .await
            .unwrap());

        let or_open = rule("or-open", RuleLogic::Or, vec![]);
        assert!(!evaluator
            .should_fire(&or_open, None, None, USER, Utc::now())
            .await
            .unwrap());
    }

    #[test]
    fn month_start_is_first_day_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 15, 30, 0).unwrap();
        let start = month_start(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());
    }
}
