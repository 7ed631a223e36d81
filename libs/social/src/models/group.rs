//! Group model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A group; `members` is authoritative and `member_count` mirrors its length
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub interests: Vec<String>,
    pub members: Vec<String>,
    pub admins: Vec<String>,
    pub member_count: u32,
    pub created_by: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|a| a == user_id)
    }

    pub fn shares_interest(&self, interests: &[String]) -> bool {
        self.interests.iter().any(|i| interests.contains(i))
    }

    /// Difference between the cached counter and the member list
    pub fn member_count_drift(&self) -> i64 {
        i64::from(self.member_count) - self.members.len() as i64
    }
}

/// Payload for creating a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub interests: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}
