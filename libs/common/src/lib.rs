//! Shared infrastructure for the LinkUp services
//!
//! This crate owns the pieces every service needs regardless of domain:
//! PostgreSQL pool configuration, the Redis lookup cache, and the
//! [`error::DatabaseError`] type the stores report through.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, init_pool, health_check};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     let is_healthy = health_check(&pool).await?;
//!     println!("Database health check: {}", is_healthy);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;
