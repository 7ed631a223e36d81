//! Group membership service

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{SocialError, SocialResult},
    models::{Group, NewGroup},
    session::Session,
    store::SocialStore,
    validation::{normalize_tags, require},
};

/// Maximum number of groups offered as recommendations
pub const RECOMMENDED_LIMIT: usize = 30;

/// Outcome of rewriting one group's member count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciled {
    pub group_id: Uuid,
    pub before: u32,
    pub after: u32,
}

impl Reconciled {
    pub fn drifted(&self) -> bool {
        self.before != self.after
    }
}

#[derive(Clone)]
pub struct GroupService {
    store: Arc<dyn SocialStore>,
}

impl GroupService {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    /// Create a group with the session user as its only member and admin
    pub async fn create(&self, session: &Session, new_group: NewGroup) -> SocialResult<Group> {
        session.require_verified()?;
        let name = require("Group name", &new_group.name)?;
        let category = require("Category", &new_group.category)?;
        let interests = normalize_tags(&new_group.interests)?;
        if interests.is_empty() {
            return Err(SocialError::Invalid(
                "At least one interest is required".to_string(),
            ));
        }

        let now = Utc::now();
        let creator = session.user_id().to_string();
        let group = Group {
            id: Uuid::new_v4(),
            name,
            description: new_group
                .description
                .map(|d| d.trim().to_string())
                .unwrap_or_default(),
            category,
            interests,
            members: vec![creator.clone()],
            admins: vec![creator.clone()],
            member_count: 1,
            created_by: creator,
            image_url: new_group.image_url.filter(|u| !u.trim().is_empty()),
            created_at: now,
            updated_at: now,
        };

        self.store.insert_group(&group).await?;
        Ok(group)
    }

    /// Add the session user to the group; joining twice is a no-op
    pub async fn join(&self, session: &Session, group_id: Uuid) -> SocialResult<Group> {
        session.require_verified()?;
        info!("User {} joining group {}", session.user_id(), group_id);
        self.store
            .add_member(group_id, session.user_id())
            .await?
            .ok_or_else(|| SocialError::not_found("group", group_id))
    }

    /// Remove the session user from the group's members and admins
    pub async fn leave(&self, session: &Session, group_id: Uuid) -> SocialResult<Group> {
        session.require_verified()?;
        info!("User {} leaving group {}", session.user_id(), group_id);
        self.store
            .remove_member(group_id, session.user_id())
            .await?
            .ok_or_else(|| SocialError::not_found("group", group_id))
    }

    pub async fn get(&self, group_id: Uuid) -> SocialResult<Group> {
        self.store
            .get_group(group_id)
            .await?
            .ok_or_else(|| SocialError::not_found("group", group_id))
    }

    pub async fn list(&self) -> SocialResult<Vec<Group>> {
        self.store.list_groups().await
    }

    pub async fn my_groups(&self, user_id: &str) -> SocialResult<Vec<Group>> {
        self.store.groups_with_member(user_id).await
    }

    /// Groups the user has not joined that share one of `interests`
    pub async fn recommended(&self, user_id: &str, interests: &[String]) -> SocialResult<Vec<Group>> {
        let groups = self.store.list_groups().await?;
        Ok(groups
            .into_iter()
            .filter(|g| !g.is_member(user_id) && g.shares_interest(interests))
            .take(RECOMMENDED_LIMIT)
            .collect())
    }

    /// Rewrite the group's member count from its member list
    pub async fn reconcile(&self, group_id: Uuid) -> SocialResult<Reconciled> {
        let (before, after) = self
            .store
            .reconcile_member_count(group_id)
            .await?
            .ok_or_else(|| SocialError::not_found("group", group_id))?;
        Ok(Reconciled {
            group_id,
            before,
            after,
        })
    }

    /// Reconcile every group whose listed count disagrees with its members,
    /// returning the ones that were repaired
    pub async fn reconcile_all(&self) -> SocialResult<Vec<Reconciled>> {
        info!("Reconciling group member counts");
        let groups = self.store.list_groups().await?;

        let mut drifted = Vec::new();
        for group in groups.iter().filter(|g| g.member_count_drift() != 0) {
            match self.reconcile(group.id).await {
                Ok(outcome) if outcome.drifted() => drifted.push(outcome),
                Ok(_) => {}
                Err(e) => warn!("Failed to reconcile group {}: {}", group.id, e),
            }
        }
        Ok(drifted)
    }
}
