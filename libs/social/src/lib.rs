//! Social domain core for LinkUp
//!
//! Profiles with reserved usernames, connection requests between users,
//! interest groups, and the image flows that hang off profiles. Everything
//! persistent goes through the traits in [`store`]; the services in this
//! crate hold no state of their own.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use social::{ConnectionEngine, InMemoryStore, Session, SocialStore};
//!
//! async fn example_usage() -> social::SocialResult<()> {
//!     let store: Arc<dyn SocialStore> = Arc::new(InMemoryStore::new());
//!     let engine = ConnectionEngine::new(store);
//!
//!     let alice = Session::new("alice", Some("alice@kiit.ac.in".into()), true)?;
//!     engine.send_request(&alice, "bob").await?;
//!     println!("{:?}", engine.get_status("alice", "bob").await);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod connections;
pub mod error;
pub mod groups;
pub mod media;
pub mod models;
pub mod pair;
pub mod profiles;
pub mod session;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use connections::ConnectionEngine;
pub use error::{SocialError, SocialResult};
pub use groups::{GroupService, Reconciled};
pub use media::{InMemoryMediaGateway, MediaConfig, MediaGateway, S3MediaGateway};
pub use pair::PairKey;
pub use profiles::{PeopleQuery, ProfileService};
pub use session::Session;
pub use store::{InMemoryStore, PgStore, SocialStore};
