//! Profile service: usernames, profile edits, image flows, and the people directory

use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    error::{SocialError, SocialResult},
    media::MediaGateway,
    models::{ImageSlot, NewProfile, ProfileSignup, ProfileUpdate, UserProfile},
    session::Session,
    store::SocialStore,
    validation::{
        USERNAME_MAX_LEN, USERNAME_MIN_LEN, normalize_tags, require, validate_email,
        validate_semester, validate_username,
    },
};

/// Largest accepted image upload
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const IMAGE_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Filters for the people directory
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeopleQuery {
    pub q: Option<String>,
    pub year: Option<u8>,
    pub branch: Option<String>,
    pub society: Option<String>,
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn SocialStore>,
    media: Arc<dyn MediaGateway>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn SocialStore>, media: Arc<dyn MediaGateway>) -> Self {
        Self { store, media }
    }

    /// Whether `username` could be reserved right now
    pub async fn check_username_availability(&self, username: &str) -> SocialResult<bool> {
        let username = username.trim().to_lowercase();
        if validate_username(&username).is_err() {
            return Ok(false);
        }
        Ok(self.store.find_reservation(&username).await?.is_none())
    }

    /// Create the session user's profile and reserve its username
    pub async fn create_profile(
        &self,
        session: &Session,
        signup: ProfileSignup,
    ) -> SocialResult<UserProfile> {
        session.require_verified()?;
        let username = signup.username.trim().to_lowercase();
        validate_username(&username)?;

        let email = session
            .email()
            .ok_or_else(|| SocialError::Invalid("Account has no email address".to_string()))?;
        validate_email(email)?;

        let display_name = signup
            .display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| username.clone());

        let profile = NewProfile {
            uid: session.user_id().to_string(),
            email: email.to_lowercase(),
            display_name,
            username,
            photo_url: signup.photo_url.filter(|u| !u.trim().is_empty()),
        };
        self.store.create_profile(&profile).await
    }

    pub async fn get_profile(&self, uid: &str) -> SocialResult<UserProfile> {
        self.store
            .get_profile(uid)
            .await?
            .ok_or_else(|| SocialError::not_found("profile", uid))
    }

    /// Resolve a username to its owner's profile
    pub async fn find_by_username(&self, username: &str) -> SocialResult<Option<UserProfile>> {
        let username = username.trim().to_lowercase();
        if validate_username(&username).is_err() {
            return Ok(None);
        }
        match self.store.find_reservation(&username).await? {
            Some(reservation) => self.store.get_profile(&reservation.uid).await,
            None => Ok(None),
        }
    }

    pub async fn list_profiles(&self) -> SocialResult<Vec<UserProfile>> {
        self.store.list_profiles().await
    }

    /// Apply a partial update to the session user's profile
    pub async fn update_profile(
        &self,
        session: &Session,
        mut update: ProfileUpdate,
    ) -> SocialResult<UserProfile> {
        session.require_verified()?;
        if update.is_empty() {
            return Err(SocialError::Invalid("No profile fields to update".to_string()));
        }

        if let Some(name) = update.display_name.take() {
            update.display_name = Some(require("Display name", &name)?);
        }
        update.bio = update.bio.map(|b| b.trim().to_string());
        update.branch = update.branch.map(|b| b.trim().to_string());
        if let Some(semester) = update.semester {
            validate_semester(semester)?;
        }
        if let Some(interests) = update.interests.take() {
            update.interests = Some(normalize_tags(&interests)?);
        }
        if let Some(societies) = update.societies.take() {
            update.societies = Some(normalize_tags(&societies)?);
        }

        self.store.update_profile(session.user_id(), &update).await
    }

    /// Move the session user to `new_username`; returns the previous username
    pub async fn rename_username(
        &self,
        session: &Session,
        new_username: &str,
    ) -> SocialResult<(String, UserProfile)> {
        session.require_verified()?;
        let new_username = new_username.trim().to_lowercase();
        validate_username(&new_username)?;
        self.store
            .rename_username(session.user_id(), &new_username)
            .await
    }

    /// Upload an avatar or cover image and point the profile at it
    ///
    /// The upload is deleted again if the profile write fails. The image it
    /// replaces is deleted afterwards; a failure there is only logged.
    pub async fn upload_profile_image(
        &self,
        session: &Session,
        slot: ImageSlot,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> SocialResult<String> {
        session.require_verified()?;
        validate_image(&bytes, content_type)?;
        info!("Uploading {:?} image for user: {}", slot, session.user_id());

        let url = self.media.upload(bytes, content_type).await?;
        let previous = match self.store.swap_image(session.user_id(), slot, &url).await {
            Ok(previous) => previous,
            Err(e) => {
                self.discard(&url).await;
                return Err(e);
            }
        };

        if let Some(previous) = previous.filter(|p| *p != url && self.media.owns(p)) {
            self.discard(&previous).await;
        }
        Ok(url)
    }

    /// Upload a post image and append it to the session user's posts
    pub async fn add_post(
        &self,
        session: &Session,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> SocialResult<UserProfile> {
        session.require_verified()?;
        validate_image(&bytes, content_type)?;
        info!("Adding post for user: {}", session.user_id());

        let url = self.media.upload(bytes, content_type).await?;
        match self.store.append_post(session.user_id(), &url).await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                self.discard(&url).await;
                Err(e)
            }
        }
    }

    /// Remove one of the session user's posts, then its stored image
    pub async fn delete_post(&self, session: &Session, url: &str) -> SocialResult<()> {
        session.require_verified()?;
        let profile = self.get_profile(session.user_id()).await?;
        if !profile.posts.iter().any(|p| p == url) {
            return Err(SocialError::not_found("post", url));
        }
        info!("Deleting post for user: {}", session.user_id());

        if !self.store.remove_post(session.user_id(), url).await? {
            return Err(SocialError::not_found("post", url));
        }
        if self.media.owns(url) {
            self.discard(url).await;
        }
        Ok(())
    }

    /// Every profile except the viewer's, filtered by `query`
    pub async fn directory(&self, viewer: &str, query: &PeopleQuery) -> SocialResult<Vec<UserProfile>> {
        let profiles = self.store.list_profiles().await?;
        Ok(search_profiles(&profiles, viewer, query))
    }

    async fn discard(&self, url: &str) {
        if let Err(e) = self.media.delete(url).await {
            warn!("Failed to delete media {}: {}", url, e);
        }
    }
}

fn validate_image(bytes: &[u8], content_type: &str) -> SocialResult<()> {
    if bytes.is_empty() {
        return Err(SocialError::Invalid("Image is empty".to_string()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(SocialError::Invalid(format!(
            "Image must be at most {} MB",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    if !IMAGE_CONTENT_TYPES.contains(&content_type) {
        return Err(SocialError::Invalid(format!(
            "Unsupported image type: {}",
            content_type
        )));
    }
    Ok(())
}

fn clean_handle(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.')
        .collect()
}

/// Candidate usernames derived from a display name and email
pub fn username_suggestions(display_name: &str, email: &str) -> Vec<String> {
    username_suggestions_with(&mut rand::thread_rng(), display_name, email)
}

pub fn username_suggestions_with<R: Rng + ?Sized>(
    rng: &mut R,
    display_name: &str,
    email: &str,
) -> Vec<String> {
    let name = clean_handle(display_name);
    let prefix = clean_handle(email.split('@').next().unwrap_or_default());

    let candidates = [
        name.clone(),
        prefix.clone(),
        format!("{}{}", name, rng.gen_range(0..100)),
        format!("{}{}", prefix, rng.gen_range(0..100)),
        format!("{}.{}", name, rng.gen_range(0..1000)),
        format!("kiit.{}", name),
        format!("{}.kiit", name),
    ];

    let mut out: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let len = candidate.len();
        if (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) && !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

/// People directory search over an already loaded profile list
///
/// Text matching is a case-insensitive substring test over display name,
/// username, email, roll number, and branch.
pub fn search_profiles(profiles: &[UserProfile], viewer: &str, query: &PeopleQuery) -> Vec<UserProfile> {
    let needle = query
        .q
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    profiles
        .iter()
        .filter(|p| p.uid != viewer)
        .filter(|p| match &needle {
            Some(needle) => {
                contains_ci(Some(p.display_name.as_str()), needle)
                    || contains_ci(Some(p.username.as_str()), needle)
                    || contains_ci(Some(p.email.as_str()), needle)
                    || contains_ci(Some(p.roll_number()), needle)
                    || contains_ci(p.branch.as_deref(), needle)
            }
            None => true,
        })
        .filter(|p| query.year.is_none_or(|year| p.year() == Some(year)))
        .filter(|p| {
            query
                .branch
                .as_deref()
                .is_none_or(|branch| p.branch.as_deref() == Some(branch))
        })
        .filter(|p| {
            query
                .society
                .as_deref()
                .is_none_or(|society| p.societies.iter().any(|s| s == society))
        })
        .cloned()
        .collect()
}
