//! End-to-end engine scenarios: firing, throttling, partial failure and
//! per-rule time-boxing against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use interact_rules::{RuleEngine, TracingNotifier, TriggerEvent};
use interact_store::{
    Badge, BadgeAward, Condition, EntityKind, EntityStore, MemoryStore, Operator,
    PointsLedgerEntry, Rule, RuleActions, RuleExecution, RuleLogic, StoreError, UserPoints,
    UserRecord,
};

const USER: &str = "casey@example.com";

fn attendance_condition() -> Condition {
    Condition {
        entity: "Participation".into(),
        field: "attended".into(),
        operator: Operator::Equals,
        value: json!(true),
    }
}

fn rule(id: &str, actions: RuleActions) -> Rule {
    Rule {
        id: id.to_string(),
        name: format!("rule {id}"),
        description: None,
        conditions: vec![attendance_condition()],
        logic: RuleLogic::And,
        actions,
        cooldown_hours: None,
        max_triggers_per_month: None,
        execution_count: 0,
        is_active: true,
    }
}

fn points_rule(id: &str, points: i64) -> Rule {
    rule(
        id,
        RuleActions {
            award_points: Some(points),
            award_badge: None,
            send_notification: false,
        },
    )
}

fn engine(store: Arc<dyn EntityStore>) -> RuleEngine {
    RuleEngine::new(store, Arc::new(TracingNotifier))
}

fn seed_participation(store: &MemoryStore, id: &str) {
    store.insert_record(
        EntityKind::Participation,
        json!({"id": id, "user_email": USER, "attended": true}),
    );
}

#[tokio::test]
async fn scenario_a_first_fire_creates_points_and_audit_row() {
    let store = Arc::new(MemoryStore::new());
    seed_participation(&store, "p1");
    store.upsert_rule(points_rule("r1", 10)).await.unwrap();

    let report = engine(store.clone())
        .run(TriggerEvent::for_user(USER).with_trigger("Participation", "p1"))
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.executed_rules, 1);
    assert_eq!(report.rules[0].rule_id, "r1");
    assert_eq!(report.rules[0].actions.points_awarded, Some(10));
    assert_eq!(
        report.rules[0].conditions_met,
        vec!["Participation.attended equals"]
    );

    let points = store.user_points(USER).await.unwrap().expect("row created");
    assert_eq!(points.total_points, 10);
    assert_eq!(points.lifetime_points, 10);
    assert_eq!(points.points_this_month, 10);

    let executions = store.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].rule_id, "r1");
    assert!(executions[0].success);

    assert_eq!(store.rule("r1").await.unwrap().unwrap().execution_count, 1);
}

#[tokio::test]
async fn scenario_b_cooldown_blocks_the_second_trigger() {
    let store = Arc::new(MemoryStore::new());
    seed_participation(&store, "p1");
    seed_participation(&store, "p2");
    store.upsert_rule(points_rule("r1", 10)).await.unwrap();

    let engine = engine(store.clone());
    engine
        .run(TriggerEvent::for_user(USER).with_trigger("Participation", "p1"))
        .await
        .unwrap();

    // The administrator adds a 24h cooldown; a fresh trigger five minutes
    // later must not fire.
    let mut cooled = store.rule("r1").await.unwrap().unwrap();
    cooled.cooldown_hours = Some(24);
    store.upsert_rule(cooled).await.unwrap();

    let report = engine
        .run(TriggerEvent::for_user(USER).with_trigger("Participation", "p2"))
        .await
        .unwrap();

    assert_eq!(report.executed_rules, 0);
    assert_eq!(
        store.user_points(USER).await.unwrap().unwrap().total_points,
        10
    );
    assert_eq!(store.executions().len(), 1);
}

#[tokio::test]
async fn scenario_c_or_logic_fires_on_a_single_satisfied_condition() {
    let store = Arc::new(MemoryStore::new());
    seed_participation(&store, "p1");

    let mut or_rule = points_rule("r-or", 5);
    or_rule.logic = RuleLogic::Or;
    or_rule.conditions = vec![
        Condition {
            entity: "Participation".into(),
            field: "attended".into(),
            operator: Operator::Equals,
            value: json!(false), // unsatisfied
        },
        attendance_condition(), // satisfied
    ];
    store.upsert_rule(or_rule).await.unwrap();

    let report = engine(store.clone())
        .run(TriggerEvent::for_user(USER).with_trigger("Participation", "p1"))
        .await
        .unwrap();

    assert_eq!(report.executed_rules, 1);
}

#[tokio::test]
async fn scenario_d_unresolvable_badge_does_not_break_the_points_branch() {
    let store = Arc::new(MemoryStore::new());
    seed_participation(&store, "p1");
    store
        .upsert_rule(rule(
            "r1",
            RuleActions {
                award_points: Some(5),
                award_badge: Some("no-such-badge".into()),
                send_notification: false,
            },
        ))
        .await
        .unwrap();

    let report = engine(store.clone())
        .run(TriggerEvent::for_user(USER).with_trigger("Participation", "p1"))
        .await
        .unwrap();

    assert_eq!(report.executed_rules, 1);
    assert_eq!(report.rules[0].actions.points_awarded, Some(5));
    assert_eq!(report.rules[0].actions.badge_awarded, None);
    assert!(store.badge_awards().is_empty());
    assert_eq!(
        store.user_points(USER).await.unwrap().unwrap().total_points,
        5
    );
}

#[tokio::test]
async fn badge_and_points_and_notification_compose() {
    let store = Arc::new(MemoryStore::new());
    seed_participation(&store, "p1");
    store.insert_badge(Badge {
        id: "first-event".into(),
        name: "First Event".into(),
        description: None,
        repeatable: false,
    });
    store
        .upsert_rule(rule(
            "r1",
            RuleActions {
                award_points: Some(10),
                award_badge: Some("first-event".into()),
                send_notification: true,
            },
        ))
        .await
        .unwrap();

    let report = engine(store.clone())
        .run(TriggerEvent::for_user(USER).with_trigger("Participation", "p1"))
        .await
        .unwrap();

    let actions = &report.rules[0].actions;
    assert_eq!(actions.points_awarded, Some(10));
    assert_eq!(actions.badge_awarded.as_deref(), Some("first-event"));
    assert!(actions.notification_sent);
    assert_eq!(store.badge_awards().len(), 1);
}

/// Store wrapper that injects failures and latency for specific lookups.
struct FlakyStore {
    inner: MemoryStore,
    failing_badge: Option<String>,
    slow_rule: Option<(String, Duration)>,
}

impl FlakyStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing_badge: None,
            slow_rule: None,
        }
    }
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn active_rules(&self) -> Result<Vec<Rule>, StoreError> {
        self.inner.active_rules().await
    }

    async fn rules(&self) -> Result<Vec<Rule>, StoreError> {
        self.inner.rules().await
    }

    async fn rule(&self, id: &str) -> Result<Option<Rule>, StoreError> {
        self.inner.rule(id).await
    }

    async fn upsert_rule(&self, rule: Rule) -> Result<Rule, StoreError> {
        self.inner.upsert_rule(rule).await
    }

    async fn set_rule_active(&self, id: &str, active: bool) -> Result<Rule, StoreError> {
        self.inner.set_rule_active(id, active).await
    }

    async fn increment_execution_count(&self, id: &str) -> Result<(), StoreError> {
        self.inner.increment_execution_count(id).await
    }

    async fn executions_for(
        &self,
        rule_id: &str,
        user_email: &str,
    ) -> Result<Vec<RuleExecution>, StoreError> {
        if let Some((slow_id, delay)) = &self.slow_rule {
            if slow_id == rule_id {
                tokio::time::sleep(*delay).await;
            }
        }
        self.inner.executions_for(rule_id, user_email).await
    }

    async fn append_execution(&self, execution: RuleExecution) -> Result<(), StoreError> {
        self.inner.append_execution(execution).await
    }

    async fn user_points(&self, user_email: &str) -> Result<Option<UserPoints>, StoreError> {
        self.inner.user_points(user_email).await
    }

    async fn put_user_points(&self, points: UserPoints) -> Result<UserPoints, StoreError> {
        self.inner.put_user_points(points).await
    }

    async fn append_ledger_entry(&self, entry: PointsLedgerEntry) -> Result<(), StoreError> {
        self.inner.append_ledger_entry(entry).await
    }

    async fn ledger_entries_for(
        &self,
        user_email: &str,
    ) -> Result<Vec<PointsLedgerEntry>, StoreError> {
        self.inner.ledger_entries_for(user_email).await
    }

    async fn badge(&self, id: &str) -> Result<Option<Badge>, StoreError> {
        if self.failing_badge.as_deref() == Some(id) {
            return Err(StoreError::Backend("badge collection unavailable".into()));
        }
        self.inner.badge(id).await
    }

    async fn has_badge_award(
        &self,
        user_email: &str,
        badge_id: &str,
    ) -> Result<bool, StoreError> {
        self.inner.has_badge_award(user_email, badge_id).await
    }

    async fn append_badge_award(&self, award: BadgeAward) -> Result<(), StoreError> {
        self.inner.append_badge_award(award).await
    }

    async fn user(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.inner.user(email).await
    }

    async fn record_by_id(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<Value>, StoreError> {
        self.inner.record_by_id(kind, id).await
    }

    async fn record_for_user(
        &self,
        kind: EntityKind,
        user_email: &str,
    ) -> Result<Option<Value>, StoreError> {
        self.inner.record_for_user(kind, user_email).await
    }
}

#[tokio::test]
async fn failure_in_one_rule_does_not_block_the_others() {
    let memory = MemoryStore::new();
    seed_participation(&memory, "p1");
    memory.upsert_rule(points_rule("r1", 10)).await.unwrap();
    memory
        .upsert_rule(rule(
            "r2",
            RuleActions {
                award_points: None,
                award_badge: Some("boom".into()),
                send_notification: false,
            },
        ))
        .await
        .unwrap();
    memory.upsert_rule(points_rule("r3", 3)).await.unwrap();

    let mut flaky = FlakyStore::new(memory.clone());
    flaky.failing_badge = Some("boom".into());

    let report = engine(Arc::new(flaky))
        .run(TriggerEvent::for_user(USER).with_trigger("Participation", "p1"))
        .await
        .unwrap();

    assert_eq!(report.executed_rules, 2);
    let fired: Vec<&str> = report.rules.iter().map(|r| r.rule_id.as_str()).collect();
    assert_eq!(fired, vec!["r1", "r3"]);

    // The failed rule left no audit row and no counter bump.
    let executions = memory.executions();
    assert_eq!(executions.len(), 2);
    assert!(executions.iter().all(|e| e.rule_id != "r2"));
    assert_eq!(memory.rule("r2").await.unwrap().unwrap().execution_count, 0);

    assert_eq!(
        memory.user_points(USER).await.unwrap().unwrap().total_points,
        13
    );
}

#[tokio::test]
async fn slow_rule_is_time_boxed_and_the_rest_still_run() {
    let memory = MemoryStore::new();
    seed_participation(&memory, "p1");
    memory.upsert_rule(points_rule("a-slow", 100)).await.unwrap();
    memory.upsert_rule(points_rule("b-fast", 7)).await.unwrap();

    let mut flaky = FlakyStore::new(memory.clone());
    flaky.slow_rule = Some(("a-slow".into(), Duration::from_secs(2)));

    let report = RuleEngine::new(Arc::new(flaky), Arc::new(TracingNotifier))
        .with_rule_timeout(Duration::from_millis(100))
        .run(TriggerEvent::for_user(USER).with_trigger("Participation", "p1"))
        .await
        .unwrap();

    assert_eq!(report.executed_rules, 1);
    assert_eq!(report.rules[0].rule_id, "b-fast");
    assert_eq!(
        memory.user_points(USER).await.unwrap().unwrap().total_points,
        7
    );
}
