//! User profile model and its store-boundary normalization

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::{catalog::year_from_semester, error::SocialError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
}

impl SocialLinks {
    fn normalized(self) -> Self {
        Self {
            instagram: non_blank(self.instagram),
            linkedin: non_blank(self.linkedin),
            github: non_blank(self.github),
        }
    }
}

/// User profile as the rest of the crate sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub username: String,
    pub photo_url: Option<String>,
    pub cover_photo_url: Option<String>,
    pub bio: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<u8>,
    pub social_links: SocialLinks,
    pub interests: Vec<String>,
    pub societies: Vec<String>,
    pub posts: Vec<String>,
    pub connections_count: u32,
    pub is_profile_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn year(&self) -> Option<u8> {
        self.semester.and_then(year_from_semester)
    }

    /// Local part of the email; KIIT addresses use the roll number here
    pub fn roll_number(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }
}

/// Profile row as stored; every column that may be absent is optional
#[derive(Debug, Clone, Default, FromRow)]
pub struct ProfileRecord {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub username: String,
    pub photo_url: Option<String>,
    pub cover_photo_url: Option<String>,
    pub bio: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<i16>,
    pub social_links: Option<Json<SocialLinks>>,
    pub interests: Option<Vec<String>>,
    pub societies: Option<Vec<String>>,
    pub posts: Option<Vec<String>>,
    pub connections_count: Option<i32>,
    pub is_profile_complete: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileRecord> for UserProfile {
    fn from(record: ProfileRecord) -> Self {
        UserProfile {
            uid: record.uid,
            email: record.email,
            display_name: record
                .display_name
                .map(|n| n.trim().to_string())
                .unwrap_or_default(),
            username: record.username.to_lowercase(),
            photo_url: non_blank(record.photo_url),
            cover_photo_url: non_blank(record.cover_photo_url),
            bio: non_blank(record.bio),
            branch: non_blank(record.branch),
            semester: record
                .semester
                .and_then(|s| u8::try_from(s).ok())
                .filter(|s| year_from_semester(*s).is_some()),
            social_links: record
                .social_links
                .map(|Json(links)| links.normalized())
                .unwrap_or_default(),
            interests: dedup(record.interests.unwrap_or_default()),
            societies: dedup(record.societies.unwrap_or_default()),
            posts: record.posts.unwrap_or_default(),
            connections_count: record
                .connections_count
                .map(|c| u32::try_from(c).unwrap_or(0))
                .unwrap_or(0),
            is_profile_complete: record.is_profile_complete.unwrap_or(false),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Payload for first-time profile creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub username: String,
    pub photo_url: Option<String>,
}

/// What a signed-in user supplies to create their profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSignup {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Partial update of the caller's own profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<u8>,
    pub social_links: Option<SocialLinks>,
    pub interests: Option<Vec<String>>,
    pub societies: Option<Vec<String>>,
    pub is_profile_complete: Option<bool>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.bio.is_none()
            && self.branch.is_none()
            && self.semester.is_none()
            && self.social_links.is_none()
            && self.interests.is_none()
            && self.societies.is_none()
            && self.is_profile_complete.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSlot {
    Avatar,
    Cover,
}

impl FromStr for ImageSlot {
    type Err = SocialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avatar" => Ok(ImageSlot::Avatar),
            "cover" => Ok(ImageSlot::Cover),
            other => Err(SocialError::Invalid(format!("Unknown image slot: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UsernameReservation {
    pub username: String,
    pub uid: String,
    pub created_at: DateTime<Utc>,
}
