//! Engagement core service binary: wires configuration, logging, the
//! entity store and the rules engine together and serves the HTTP API.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use interact_auth::{KeyedRateLimiter, OwnerList};
use interact_core::{init_tracing, CoreConfig};
use interact_rules::{
    seed_store, EngagementApiBuilder, RuleEngine, ServiceConfig, TracingNotifier,
};
use interact_store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CoreConfig::from_env().context("loading configuration")?;
    init_tracing(None).context("initializing tracing")?;

    let store = Arc::new(MemoryStore::new());

    if let Some(path) = &config.rules_path {
        let seeded = seed_store(store.as_ref(), path)
            .await
            .with_context(|| format!("seeding rules from {}", path.display()))?;
        info!(count = seeded, path = %path.display(), "rules seeded");
    }

    let engine = Arc::new(
        RuleEngine::new(store.clone(), Arc::new(TracingNotifier))
            .with_rule_timeout(config.rule_timeout),
    );

    let owners = OwnerList::new(config.owner_emails.clone());
    let limiter = Arc::new(KeyedRateLimiter::per_minute(config.rate_limit_per_minute));

    let api = EngagementApiBuilder::new(
        store,
        engine,
        owners,
        config.service_token.clone(),
        limiter,
    );

    let shutdown = api
        .serve(ServiceConfig {
            bind_address: config.http_bind.clone(),
        })
        .await
        .context("starting api server")?;

    info!(bind = %config.http_bind, environment = ?config.environment, "engagement core running");

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown signal received");
    let _ = shutdown.send(());

    Ok(())
}
