//! In-memory store
//!
//! One lock guards every collection, so each trait method is atomic the same
//! way a Postgres transaction is. Used by tests and by the API's `memory`
//! backend for local runs.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use common::error::DatabaseError;
use sqlx::types::Json;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use super::{ConnectionStore, GroupStore, ProfileStore};
use crate::{
    error::{SocialError, SocialResult},
    models::{
        Connection, ConnectionRequest, Group, ImageSlot, NewProfile, ProfileRecord, ProfileUpdate,
        UserProfile, UsernameReservation,
    },
    pair::PairKey,
};

#[derive(Default)]
struct State {
    profiles: HashMap<String, ProfileRecord>,
    reservations: HashMap<String, UsernameReservation>,
    requests: HashMap<PairKey, ConnectionRequest>,
    connections: HashMap<PairKey, Connection>,
    groups: HashMap<Uuid, Group>,
}

impl State {
    fn profile_mut(&mut self, uid: &str) -> SocialResult<&mut ProfileRecord> {
        self.profiles
            .get_mut(uid)
            .ok_or_else(|| SocialError::not_found("profile", uid))
    }

    fn adjust_connections_count(&mut self, uid: &str, delta: i32) {
        // Counters live on profiles; a member without a profile has none to adjust
        if let Some(record) = self.profiles.get_mut(uid) {
            let current = record.connections_count.unwrap_or(0).max(0);
            record.connections_count = Some((current + delta).max(0));
            record.updated_at = Utc::now();
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    fail_post_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make post appends and removals fail as if the database were unreachable
    pub fn fail_post_writes(&self, fail: bool) {
        self.fail_post_writes.store(fail, Ordering::SeqCst);
    }

    fn check_post_writes(&self) -> SocialResult<()> {
        if self.fail_post_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::Connection(sqlx::Error::PoolTimedOut).into());
        }
        Ok(())
    }

    /// Overwrite a profile's connection counter, as an external writer could
    pub async fn force_connections_count(&self, uid: &str, count: i32) -> SocialResult<()> {
        let mut state = self.state.lock().await;
        state.profile_mut(uid)?.connections_count = Some(count);
        Ok(())
    }

    /// Overwrite a group's cached member count, as an external writer could
    pub async fn force_member_count(&self, id: Uuid, count: u32) -> SocialResult<()> {
        let mut state = self.state.lock().await;
        let group = state
            .groups
            .get_mut(&id)
            .ok_or_else(|| SocialError::not_found("group", id))?;
        group.member_count = count;
        Ok(())
    }
}

fn newest_first<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn create_profile(&self, profile: &NewProfile) -> SocialResult<UserProfile> {
        info!("Creating profile for user: {}", profile.uid);
        let mut state = self.state.lock().await;

        if state.profiles.contains_key(&profile.uid) {
            return Err(SocialError::Conflict(format!(
                "Profile already exists for user {}",
                profile.uid
            )));
        }
        let username = profile.username.to_lowercase();
        if state.reservations.contains_key(&username) {
            return Err(SocialError::UsernameTaken(username));
        }

        let now = Utc::now();
        let record = ProfileRecord {
            uid: profile.uid.clone(),
            email: profile.email.clone(),
            display_name: Some(profile.display_name.clone()),
            username: username.clone(),
            photo_url: profile.photo_url.clone(),
            connections_count: Some(0),
            is_profile_complete: Some(false),
            created_at: now,
            updated_at: now,
            ..Default::default()
        };
        state.reservations.insert(
            username.clone(),
            UsernameReservation {
                username,
                uid: profile.uid.clone(),
                created_at: now,
            },
        );
        state.profiles.insert(profile.uid.clone(), record.clone());

        Ok(record.into())
    }

    async fn get_profile(&self, uid: &str) -> SocialResult<Option<UserProfile>> {
        let state = self.state.lock().await;
        Ok(state.profiles.get(uid).cloned().map(UserProfile::from))
    }

    async fn list_profiles(&self) -> SocialResult<Vec<UserProfile>> {
        let state = self.state.lock().await;
        let mut profiles: Vec<UserProfile> =
            state.profiles.values().cloned().map(UserProfile::from).collect();
        profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.uid.cmp(&b.uid)));
        Ok(profiles)
    }

    async fn update_profile(&self, uid: &str, update: &ProfileUpdate) -> SocialResult<UserProfile> {
        info!("Updating profile for user: {}", uid);
        let mut state = self.state.lock().await;
        let record = state.profile_mut(uid)?;

        if let Some(name) = &update.display_name {
            record.display_name = Some(name.clone());
        }
        if let Some(bio) = &update.bio {
            record.bio = Some(bio.clone());
        }
        if let Some(branch) = &update.branch {
            record.branch = Some(branch.clone());
        }
        if let Some(semester) = update.semester {
            record.semester = Some(i16::from(semester));
        }
        if let Some(links) = &update.social_links {
            record.social_links = Some(Json(links.clone()));
        }
        if let Some(interests) = &update.interests {
            record.interests = Some(interests.clone());
        }
        if let Some(societies) = &update.societies {
            record.societies = Some(societies.clone());
        }
        if let Some(complete) = update.is_profile_complete {
            record.is_profile_complete = Some(complete);
        }
        record.updated_at = Utc::now();

        Ok(record.clone().into())
    }

    async fn swap_image(
        &self,
        uid: &str,
        slot: ImageSlot,
        url: &str,
    ) -> SocialResult<Option<String>> {
        let mut state = self.state.lock().await;
        let record = state.profile_mut(uid)?;
        let field = match slot {
            ImageSlot::Avatar => &mut record.photo_url,
            ImageSlot::Cover => &mut record.cover_photo_url,
        };
        let previous = field.replace(url.to_string());
        record.updated_at = Utc::now();
        Ok(previous)
    }

    async fn append_post(&self, uid: &str, url: &str) -> SocialResult<UserProfile> {
        self.check_post_writes()?;
        let mut state = self.state.lock().await;
        let record = state.profile_mut(uid)?;
        record
            .posts
            .get_or_insert_with(Vec::new)
            .push(url.to_string());
        record.updated_at = Utc::now();
        Ok(record.clone().into())
    }

    async fn remove_post(&self, uid: &str, url: &str) -> SocialResult<bool> {
        self.check_post_writes()?;
        let mut state = self.state.lock().await;
        let record = state.profile_mut(uid)?;
        let posts = record.posts.get_or_insert_with(Vec::new);
        let before = posts.len();
        posts.retain(|p| p != url);
        let removed = posts.len() != before;
        if removed {
            record.updated_at = Utc::now();
        }
        Ok(removed)
    }

    async fn find_reservation(&self, username: &str) -> SocialResult<Option<UsernameReservation>> {
        let state = self.state.lock().await;
        Ok(state.reservations.get(&username.to_lowercase()).cloned())
    }

    async fn rename_username(
        &self,
        uid: &str,
        new_username: &str,
    ) -> SocialResult<(String, UserProfile)> {
        info!("Renaming user {} to {}", uid, new_username);
        let mut state = self.state.lock().await;
        let new_username = new_username.to_lowercase();

        let old_username = state.profile_mut(uid)?.username.clone();
        if old_username == new_username {
            let profile: UserProfile = state.profile_mut(uid)?.clone().into();
            return Ok((old_username, profile));
        }
        if state.reservations.contains_key(&new_username) {
            return Err(SocialError::UsernameTaken(new_username));
        }

        let now = Utc::now();
        state.reservations.retain(|_, r| r.uid != uid);
        state.reservations.insert(
            new_username.clone(),
            UsernameReservation {
                username: new_username.clone(),
                uid: uid.to_string(),
                created_at: now,
            },
        );
        let record = state.profile_mut(uid)?;
        record.username = new_username;
        record.updated_at = now;

        Ok((old_username, record.clone().into()))
    }
}

#[async_trait]
impl ConnectionStore for InMemoryStore {
    async fn get_request(&self, id: &PairKey) -> SocialResult<Option<ConnectionRequest>> {
        let state = self.state.lock().await;
        Ok(state.requests.get(id).cloned())
    }

    async fn insert_request(&self, request: &ConnectionRequest) -> SocialResult<bool> {
        let mut state = self.state.lock().await;
        if state.requests.contains_key(&request.id) {
            return Ok(false);
        }
        state.requests.insert(request.id.clone(), request.clone());
        Ok(true)
    }

    async fn delete_request(&self, id: &PairKey) -> SocialResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.requests.remove(id).is_some())
    }

    async fn requests_to(&self, user_id: &str) -> SocialResult<Vec<ConnectionRequest>> {
        let state = self.state.lock().await;
        let requests = state
            .requests
            .values()
            .filter(|r| r.is_pending() && r.is_to(user_id))
            .cloned()
            .collect();
        Ok(newest_first(requests, |r: &ConnectionRequest| r.created_at))
    }

    async fn requests_from(&self, user_id: &str) -> SocialResult<Vec<ConnectionRequest>> {
        let state = self.state.lock().await;
        let requests = state
            .requests
            .values()
            .filter(|r| r.is_pending() && r.is_from(user_id))
            .cloned()
            .collect();
        Ok(newest_first(requests, |r: &ConnectionRequest| r.created_at))
    }

    async fn get_connection(&self, id: &PairKey) -> SocialResult<Option<Connection>> {
        let state = self.state.lock().await;
        Ok(state.connections.get(id).cloned())
    }

    async fn connections_of(&self, user_id: &str) -> SocialResult<Vec<Connection>> {
        let state = self.state.lock().await;
        let connections = state
            .connections
            .values()
            .filter(|c| c.involves(user_id))
            .cloned()
            .collect();
        Ok(newest_first(connections, |c: &Connection| c.connected_at))
    }

    async fn commit_acceptance(&self, connection: &Connection) -> SocialResult<bool> {
        let mut state = self.state.lock().await;

        let pending = state
            .requests
            .get(&connection.id)
            .is_some_and(|r| {
                r.is_pending()
                    && r.is_from(&connection.user1.user_id)
                    && r.is_to(&connection.user2.user_id)
            });
        if !pending {
            return Ok(false);
        }
        if state.connections.contains_key(&connection.id) {
            return Err(SocialError::AlreadyConnected);
        }

        state.requests.remove(&connection.id);
        state
            .connections
            .insert(connection.id.clone(), connection.clone());
        state.adjust_connections_count(&connection.user1.user_id, 1);
        state.adjust_connections_count(&connection.user2.user_id, 1);
        Ok(true)
    }

    async fn commit_removal(&self, id: &PairKey) -> SocialResult<bool> {
        let mut state = self.state.lock().await;

        let Some(connection) = state.connections.remove(id) else {
            return Ok(false);
        };
        state.adjust_connections_count(&connection.user1.user_id, -1);
        state.adjust_connections_count(&connection.user2.user_id, -1);
        state.requests.remove(id);
        Ok(true)
    }
}

#[async_trait]
impl GroupStore for InMemoryStore {
    async fn insert_group(&self, group: &Group) -> SocialResult<()> {
        let mut state = self.state.lock().await;
        if state.groups.contains_key(&group.id) {
            return Err(SocialError::Conflict(format!(
                "Group already exists: {}",
                group.id
            )));
        }
        state.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn get_group(&self, id: Uuid) -> SocialResult<Option<Group>> {
        let state = self.state.lock().await;
        Ok(state.groups.get(&id).cloned())
    }

    async fn list_groups(&self) -> SocialResult<Vec<Group>> {
        let state = self.state.lock().await;
        let groups = state.groups.values().cloned().collect();
        Ok(newest_first(groups, |g: &Group| (g.created_at, g.id)))
    }

    async fn groups_with_member(&self, user_id: &str) -> SocialResult<Vec<Group>> {
        let state = self.state.lock().await;
        let groups = state
            .groups
            .values()
            .filter(|g| g.is_member(user_id))
            .cloned()
            .collect();
        Ok(newest_first(groups, |g: &Group| (g.created_at, g.id)))
    }

    async fn add_member(&self, id: Uuid, user_id: &str) -> SocialResult<Option<Group>> {
        let mut state = self.state.lock().await;
        let Some(group) = state.groups.get_mut(&id) else {
            return Ok(None);
        };
        if !group.is_member(user_id) {
            group.members.push(user_id.to_string());
            group.updated_at = Utc::now();
        }
        group.member_count = group.members.len() as u32;
        Ok(Some(group.clone()))
    }

    async fn remove_member(&self, id: Uuid, user_id: &str) -> SocialResult<Option<Group>> {
        let mut state = self.state.lock().await;
        let Some(group) = state.groups.get_mut(&id) else {
            return Ok(None);
        };
        group.members.retain(|m| m != user_id);
        group.admins.retain(|a| a != user_id);
        group.member_count = group.members.len() as u32;
        group.updated_at = Utc::now();
        Ok(Some(group.clone()))
    }

    async fn reconcile_member_count(&self, id: Uuid) -> SocialResult<Option<(u32, u32)>> {
        let mut state = self.state.lock().await;
        let Some(group) = state.groups.get_mut(&id) else {
            return Ok(None);
        };
        let before = group.member_count;
        group.member_count = group.members.len() as u32;
        Ok(Some((before, group.member_count)))
    }
}
