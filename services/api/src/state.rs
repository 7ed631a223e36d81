//! Application state shared across handlers

use std::sync::Arc;

use common::cache::RedisPool;
use social::{ConnectionEngine, GroupService, ProfileService};
use sqlx::PgPool;

use crate::middleware::TokenVerifier;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub connections: ConnectionEngine,
    pub groups: GroupService,
    pub profiles: ProfileService,
    pub verifier: Arc<TokenVerifier>,
    /// Present for the Postgres backend; used by the health check
    pub db_pool: Option<PgPool>,
    /// Username lookup cache; lookups go straight to the store without it
    pub cache: Option<RedisPool>,
    pub username_ttl_seconds: u64,
}
