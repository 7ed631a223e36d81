use std::sync::Arc;

use anyhow::Result;
use aws_config::BehaviorVersion;
use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool},
};
use social::{
    ConnectionEngine, GroupService, InMemoryMediaGateway, InMemoryStore, MediaConfig,
    MediaGateway, PgStore, ProfileService, S3MediaGateway, SocialStore,
};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod error;
mod middleware;
mod models;
mod routes;
mod settings;
mod state;

use crate::{
    middleware::TokenVerifier,
    settings::{Settings, StoreBackend},
    state::AppState,
};

struct Backend {
    store: Arc<dyn SocialStore>,
    media: Arc<dyn MediaGateway>,
    db_pool: Option<PgPool>,
}

async fn postgres_backend(settings: &Settings) -> Result<Backend> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let store = PgStore::new(pool.clone());
    store.migrate().await?;

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let media = S3MediaGateway::new(
        aws_sdk_s3::Client::new(&aws),
        MediaConfig::from(&settings.media),
    );

    Ok(Backend {
        store: Arc::new(store),
        media: Arc::new(media),
        db_pool: Some(pool),
    })
}

fn memory_backend() -> Backend {
    warn!("Using the in-memory store; nothing survives a restart");
    Backend {
        store: Arc::new(InMemoryStore::new()),
        media: Arc::new(InMemoryMediaGateway::default()),
        db_pool: None,
    }
}

async fn redis_cache(settings: &Settings) -> Option<RedisPool> {
    if !settings.cache.enabled {
        return None;
    }
    let pool = match RedisConfig::from_env() {
        Ok(config) => RedisPool::new(&config).await,
        Err(e) => Err(e),
    };
    match pool {
        Ok(pool) => {
            info!("Username cache enabled");
            Some(pool)
        }
        Err(e) => {
            warn!("Redis unavailable, username cache disabled: {}", e);
            None
        }
    }
}

/// Schedule periodic member-count reconciliation for every group
async fn start_reconciliation(groups: GroupService, schedule: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_, _| {
        let groups = groups.clone();
        Box::pin(async move {
            match groups.reconcile_all().await {
                Ok(drifted) => {
                    for outcome in drifted {
                        warn!(
                            "Repaired member count of group {}: {} -> {}",
                            outcome.group_id, outcome.before, outcome.after
                        );
                    }
                }
                Err(e) => error!("Group reconciliation failed: {}", e),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Started group reconciliation with schedule: {}", schedule);
    Ok(scheduler)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting LinkUp API service");

    let settings = Settings::load()?;
    let verifier = TokenVerifier::from_pem(&settings.auth.public_key_pem()?)?;

    let backend = match settings.store.backend {
        StoreBackend::Postgres => postgres_backend(&settings).await?,
        StoreBackend::Memory => memory_backend(),
    };

    let groups = GroupService::new(backend.store.clone());
    let _scheduler = start_reconciliation(groups.clone(), &settings.groups.reconcile_schedule).await?;

    let app_state = AppState {
        connections: ConnectionEngine::new(backend.store.clone()),
        groups,
        profiles: ProfileService::new(backend.store, backend.media),
        verifier: Arc::new(verifier),
        db_pool: backend.db_pool,
        cache: redis_cache(&settings).await,
        username_ttl_seconds: settings.cache.username_ttl_seconds,
    };

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&settings.server.bind_addr).await?;
    info!("API service listening on {}", settings.server.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
