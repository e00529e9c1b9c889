//! Follow-Verify Server
//!
//! Issues follow-verification credentials and gates one-time reward claims

use std::sync::Arc;
use std::time::Duration;

use follow_verify::{
    config::Config, server::AppState, ApiFollowChecker, ClaimService, CredentialStore,
    MemoryStore, SessionBinder, SystemClock, TwitterOAuth, VerificationService,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Follow-Verify Server");

    let config = Config::load()?;

    let client_id = config
        .twitter_client_id()
        .ok_or_else(|| anyhow::anyhow!("Twitter client id not configured (TWITTER_CLIENT_ID)"))?;
    let client_secret = config.twitter_client_secret().ok_or_else(|| {
        anyhow::anyhow!("Twitter client secret not configured (TWITTER_CLIENT_SECRET)")
    })?;

    let clock = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::new(clock.clone()));

    let verification =
        VerificationService::new(store.clone(), clock.clone(), config.token_ttl());
    let claims = ClaimService::new(
        store.clone(),
        clock.clone(),
        config.rewards.claim_energy,
        config.twitter.target_handle.clone(),
    );

    let identity = Arc::new(TwitterOAuth::new(
        client_id,
        client_secret,
        config.twitter.callback_url.clone(),
    ));
    let predicate = Arc::new(ApiFollowChecker::new(
        config.twitter.target_user_id.clone(),
    ));

    info!(
        "Follow verification target: @{} ({})",
        config.twitter.target_handle, config.twitter.target_user_id
    );

    // Optional background purge of expired records. Expiry stays lazy on
    // every read; this only bounds memory.
    if config.sweep.interval_secs > 0 {
        let sweep_store = store.clone();
        let sweep_interval = config.sweep.interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(sweep_interval));
            loop {
                interval.tick().await;
                let dropped = sweep_store.purge_expired();
                if dropped > 0 {
                    debug!("Expiry sweep dropped {} records", dropped);
                }
            }
        });
        info!(
            "Background expiry sweep started (every {} seconds)",
            sweep_interval
        );
    }

    let state = Arc::new(AppState {
        verification,
        claims,
        store,
        sessions: SessionBinder::new(),
        identity,
        predicate,
        target_user_id: config.twitter.target_user_id.clone(),
        started_at: std::time::Instant::now(),
    });

    follow_verify::server::run_server(&config, state).await?;

    Ok(())
}
