//! Shared fixtures for the social integration tests
#![allow(dead_code)]

use std::sync::Arc;

use social::{
    ConnectionEngine, GroupService, InMemoryMediaGateway, InMemoryStore, MediaGateway,
    ProfileService, Session, SocialStore, models::ProfileSignup,
};

pub struct World {
    pub store: Arc<InMemoryStore>,
    pub media: Arc<InMemoryMediaGateway>,
    pub connections: ConnectionEngine,
    pub groups: GroupService,
    pub profiles: ProfileService,
}

impl World {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let media = Arc::new(InMemoryMediaGateway::default());
        let social_store: Arc<dyn SocialStore> = store.clone();
        let gateway: Arc<dyn MediaGateway> = media.clone();

        Self {
            connections: ConnectionEngine::new(social_store.clone()),
            groups: GroupService::new(social_store.clone()),
            profiles: ProfileService::new(social_store, gateway),
            store,
            media,
        }
    }

    /// Session for `uid` without creating a profile
    pub fn session(&self, uid: &str) -> Session {
        Session::new(uid, Some(format!("{}@kiit.ac.in", uid)), true).unwrap()
    }

    /// Session for `uid` with a freshly created profile
    pub async fn user(&self, uid: &str) -> Session {
        let session = self.session(uid);
        self.profiles
            .create_profile(
                &session,
                ProfileSignup {
                    username: format!("{}.user", uid),
                    display_name: Some(format!("User {}", uid)),
                    photo_url: None,
                },
            )
            .await
            .unwrap();
        session
    }

    pub async fn connections_count(&self, uid: &str) -> u32 {
        self.profiles.get_profile(uid).await.unwrap().connections_count
    }
}
