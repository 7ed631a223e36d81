//! Connection and group flows against a live PostgreSQL
//!
//! Ignored by default; `cargo test -p social -- --ignored` runs them against
//! the database named by `DATABASE_URL`. Every test uses fresh user ids, so
//! runs can share one database.

use std::sync::Arc;

use chrono::Utc;
use common::database::{DatabaseConfig, init_pool};
use social::{
    ConnectionEngine, GroupService, InMemoryMediaGateway, PgStore, ProfileService, Session,
    SocialError, SocialStore,
    models::{ConnectionStatus, NewGroup, ProfileSignup},
    store::ConnectionStore,
};
use sqlx::PgPool;
use uuid::Uuid;

struct Db {
    pool: PgPool,
    store: Arc<PgStore>,
    connections: ConnectionEngine,
    groups: GroupService,
    profiles: ProfileService,
    tag: String,
}

impl Db {
    async fn connect() -> Db {
        let config = DatabaseConfig::from_env().unwrap();
        let pool = init_pool(&config).await.unwrap();
        let store = Arc::new(PgStore::new(pool.clone()));
        store.migrate().await.unwrap();

        let shared: Arc<dyn SocialStore> = store.clone();
        Db {
            connections: ConnectionEngine::new(shared.clone()),
            groups: GroupService::new(shared.clone()),
            profiles: ProfileService::new(shared, Arc::new(InMemoryMediaGateway::default())),
            store,
            pool,
            tag: Uuid::new_v4().simple().to_string()[..8].to_string(),
        }
    }

    fn uid(&self, name: &str) -> String {
        format!("{}-{}", name, self.tag)
    }

    async fn user(&self, name: &str) -> Session {
        let uid = self.uid(name);
        let session = Session::new(&uid, Some(format!("{}@kiit.ac.in", uid)), true).unwrap();
        self.profiles
            .create_profile(
                &session,
                ProfileSignup {
                    username: format!("{}.{}", name, self.tag),
                    display_name: Some(format!("User {}", name)),
                    photo_url: None,
                },
            )
            .await
            .unwrap();
        session
    }

    async fn count(&self, name: &str) -> u32 {
        self.profiles
            .get_profile(&self.uid(name))
            .await
            .unwrap()
            .connections_count
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn accept_and_remove_keep_counters_in_step() {
    let db = Db::connect().await;
    let alice = db.user("alice").await;
    let bob = db.user("bob").await;
    let (a, b) = (db.uid("alice"), db.uid("bob"));

    let request = db.connections.send_request(&alice, &b).await.unwrap();
    assert_eq!(
        db.connections.get_status(&b, &a).await,
        ConnectionStatus::Received {
            request_id: request.id.clone()
        }
    );
    let reverse = db.connections.send_request(&bob, &a).await.unwrap_err();
    assert!(matches!(reverse, SocialError::AlreadyPending));

    db.connections.accept_request(&bob, &request.id).await.unwrap();
    assert_eq!(db.connections.get_status(&a, &b).await, ConnectionStatus::Connected);
    assert_eq!((db.count("alice").await, db.count("bob").await), (1, 1));
    assert!(db.connections.get_request_between(&a, &b).await.unwrap().is_none());

    db.connections.remove_connection(&alice, &b).await.unwrap();
    let again = db.connections.remove_connection(&alice, &b).await.unwrap_err();
    assert!(matches!(again, SocialError::NotFound { .. }));
    assert_eq!((db.count("alice").await, db.count("bob").await), (0, 0));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn removal_floors_counters_at_zero() {
    let db = Db::connect().await;
    let alice = db.user("alice").await;
    let bob = db.user("bob").await;
    let b = db.uid("bob");

    let request = db.connections.send_request(&alice, &b).await.unwrap();
    db.connections.accept_request(&bob, &request.id).await.unwrap();

    sqlx::query("UPDATE profiles SET connections_count = 0 WHERE uid = $1")
        .bind(&b)
        .execute(&db.pool)
        .await
        .unwrap();

    db.connections.remove_connection(&alice, &b).await.unwrap();
    assert_eq!(db.count("bob").await, 0);
    assert_eq!(db.count("alice").await, 0);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn acceptance_only_consumes_the_request_it_read() {
    let db = Db::connect().await;
    let alice = db.user("alice").await;
    let bob = db.user("bob").await;
    let (a, b) = (db.uid("alice"), db.uid("bob"));

    db.connections.send_request(&alice, &b).await.unwrap();
    let snapshot = db.connections.get_request_between(&a, &b).await.unwrap().unwrap();
    db.connections.cancel_request(&alice, &snapshot.id).await.unwrap();
    db.connections.send_request(&bob, &a).await.unwrap();

    let committed = db
        .store
        .commit_acceptance(&snapshot.into_connection(Utc::now()))
        .await
        .unwrap();
    assert!(!committed);
    assert!(!db.connections.are_connected(&a, &b).await.unwrap());

    let pending = db.connections.get_request_between(&a, &b).await.unwrap().unwrap();
    assert!(pending.is_pending() && pending.is_from(&b));
    assert_eq!(db.count("alice").await, 0);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn rename_swaps_reservations_atomically() {
    let db = Db::connect().await;
    let alice = db.user("alice").await;
    db.user("bob").await;

    let taken = format!("bob.{}", db.tag);
    let err = db.profiles.rename_username(&alice, &taken).await.unwrap_err();
    assert!(matches!(err, SocialError::UsernameTaken(_)));

    let fresh = format!("ally.{}", db.tag);
    let (old, profile) = db.profiles.rename_username(&alice, &fresh).await.unwrap();
    assert_eq!(old, format!("alice.{}", db.tag));
    assert_eq!(profile.username, fresh);
    assert!(db.profiles.check_username_availability(&old).await.unwrap());
    assert!(!db.profiles.check_username_availability(&fresh).await.unwrap());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn group_membership_and_reconciliation() {
    let db = Db::connect().await;
    let owner = db.user("owner").await;
    let member = db.user("member").await;

    let group = db
        .groups
        .create(
            &owner,
            NewGroup {
                name: format!("Coders {}", db.tag),
                description: None,
                category: "Technology".to_string(),
                interests: vec!["Coding".to_string()],
                image_url: None,
            },
        )
        .await
        .unwrap();

    let joined = db.groups.join(&member, group.id).await.unwrap();
    let rejoined = db.groups.join(&member, group.id).await.unwrap();
    assert_eq!(joined.member_count, 2);
    assert_eq!(rejoined.member_count, 2);

    let left = db.groups.leave(&owner, group.id).await.unwrap();
    assert_eq!(left.member_count, 1);
    assert!(!left.is_admin(&db.uid("owner")));

    sqlx::query("UPDATE groups SET member_count = 9 WHERE id = $1")
        .bind(group.id)
        .execute(&db.pool)
        .await
        .unwrap();
    let outcome = db.groups.reconcile(group.id).await.unwrap();
    assert_eq!((outcome.before, outcome.after), (9, 1));
    assert_eq!(db.groups.get(group.id).await.unwrap().member_count, 1);
}
