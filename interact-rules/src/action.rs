use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use interact_store::{
    ActionSummary, BadgeAward, EarnedThrough, EntityStore, PointsSource, Rule,
};

use crate::error::EngineError;
use crate::ledger::PointsLedger;
use crate::notify::NotificationSender;
use crate::outcome::FiredRule;

/// Performs a firing rule's configured actions.
///
/// The executor does not re-check whether the rule should fire; callers
/// decide that. Each configured action type runs independently and is
/// best-effort: an unresolvable badge or a failed notification is skipped
/// without aborting the other branches.
#[derive(Clone)]
pub struct ActionExecutor {
    store: Arc<dyn EntityStore>,
    ledger: PointsLedger,
    notifier: Arc<dyn NotificationSender>,
}

impl ActionExecutor {
    pub fn new(store: Arc<dyn EntityStore>, notifier: Arc<dyn NotificationSender>) -> Self {
        let ledger = PointsLedger::new(store.clone());
        Self {
            store,
            ledger,
            notifier,
        }
    }

    pub async fn execute(
        &self,
        rule: &Rule,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> Result<FiredRule, EngineError> {
        let mut actions = ActionSummary::default();
        let conditions_met = rule
            .conditions
            .iter()
            .map(|condition| condition.describe())
            .collect();

        if let Some(amount) = rule.actions.award_points {
            if amount > 0 {
                self.ledger
                    .award_at(user_email, amount, PointsSource::RuleExecution, &rule.name, now)
                    .await?;
                actions.points_awarded = Some(amount);
            } else {
                warn!(rule_id = %rule.id, amount, "skipping non-positive points award");
            }
        }

        if let Some(badge_id) = &rule.actions.award_badge {
            match self.store.badge(badge_id).await? {
                Some(badge) => {
                    let already_held =
                        !badge.repeatable && self.store.has_badge_award(user_email, badge_id).await?;
                    if already_held {
                        debug!(rule_id = %rule.id, badge_id, "badge already held, not repeatable");
                    } else {
                        self.store
                            .append_badge_award(BadgeAward {
                                id: Uuid::new_v4(),
                                user_email: user_email.to_string(),
                                badge_id: badge_id.clone(),
                                awarded_at: now,
                                earned_through: EarnedThrough::RuleExecution,
                            })
                            .await?;
                        actions.badge_awarded = Some(badge_id.clone());
                    }
                }
                None => {
                    warn!(rule_id = %rule.id, badge_id, "badge does not exist, skipping award");
                }
            }
        }

        if rule.actions.send_notification {
            let message = format!("You earned a reward from \"{}\"", rule.name);
            match self.notifier.send(user_email, &message).await {
                Ok(()) => actions.notification_sent = true,
                Err(err) => warn!(rule_id = %rule.id, error = %err, "notification failed"),
            }
        }

        Ok(FiredRule {
            rule_id: rule.id.clone(),
            actions,
            conditions_met,
        })
    }
}
