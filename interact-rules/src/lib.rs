//! Gamification rules engine for the INTeract engagement core.
//!
//! Rules are declarative condition lists with an action block; the
//! orchestrator evaluates every active rule against the triggering event,
//! throttles firings per user via cooldowns and monthly caps, and awards
//! points and badges through the ledger. One misconfigured rule never
//! blocks the others.

mod action;
mod condition;
mod engine;
mod error;
mod evaluator;
mod ledger;
mod loader;
mod notify;
mod outcome;
mod service;

pub use action::ActionExecutor;
pub use condition::{operator_matches, ConditionEvaluator};
pub use engine::{RuleEngine, TriggerEvent};
pub use error::EngineError;
pub use evaluator::RuleEvaluator;
pub use ledger::{PointsLedger, POINTS_PER_LEVEL};
pub use loader::{load_rules, seed_store, SeedError};
pub use notify::{NotificationSender, NotifyError, TracingNotifier};
pub use outcome::{ExecutionReport, FiredRule};
pub use service::{AwardRequest, EngagementApiBuilder, ServiceConfig};
