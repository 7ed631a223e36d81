//! Connection requests, connections, and the derived pair status

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::SocialError, pair::PairKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = SocialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "declined" => Ok(RequestStatus::Declined),
            other => Err(SocialError::Invalid(format!(
                "Unknown request status: {}",
                other
            ))),
        }
    }
}

/// One side of a request or connection, with denormalized display data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub name: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub id: PairKey,
    pub from: Participant,
    pub to: Participant,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectionRequest {
    pub fn new(from: Participant, to: Participant, now: DateTime<Utc>) -> Self {
        ConnectionRequest {
            id: PairKey::new(&from.user_id, &to.user_id),
            from,
            to,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub fn is_from(&self, user_id: &str) -> bool {
        self.from.user_id == user_id
    }

    pub fn is_to(&self, user_id: &str) -> bool {
        self.to.user_id == user_id
    }

    /// The connection an acceptance of this request creates
    pub fn into_connection(self, now: DateTime<Utc>) -> Connection {
        Connection {
            id: self.id,
            user1: self.from,
            user2: self.to,
            connected_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: PairKey,
    pub user1: Participant,
    pub user2: Participant,
    pub connected_at: DateTime<Utc>,
}

impl Connection {
    pub fn involves(&self, user_id: &str) -> bool {
        self.user1.user_id == user_id || self.user2.user_id == user_id
    }

    /// The participant that is not `user_id`
    pub fn other(&self, user_id: &str) -> Option<&Participant> {
        if self.user1.user_id == user_id {
            Some(&self.user2)
        } else if self.user2.user_id == user_id {
            Some(&self.user1)
        } else {
            None
        }
    }

    /// Project the connection from one member's point of view
    pub fn view_for(&self, user_id: &str) -> Option<ConnectionView> {
        self.other(user_id).map(|other| ConnectionView {
            connection_id: self.id.clone(),
            user_id: other.user_id.clone(),
            name: other.name.clone(),
            photo_url: other.photo_url.clone(),
            connected_at: self.connected_at,
        })
    }
}

/// A connection as listed for one of its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionView {
    pub connection_id: PairKey,
    pub user_id: String,
    pub name: String,
    pub photo_url: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// Relationship between the querying user and a target user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ConnectionStatus {
    None,
    Sent { request_id: PairKey },
    Received { request_id: PairKey },
    Connected,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: &str) -> Participant {
        Participant {
            user_id: id.to_string(),
            name: id.to_uppercase(),
            photo_url: None,
        }
    }

    #[test]
    fn request_id_is_the_pair_key() {
        let request = ConnectionRequest::new(participant("zed"), participant("amy"), Utc::now());
        assert_eq!(request.id.as_str(), "amy_zed");
        assert!(request.is_from("zed"));
        assert!(request.is_to("amy"));
        assert!(request.is_pending());
    }

    #[test]
    fn views_show_the_other_member() {
        let connection = ConnectionRequest::new(participant("amy"), participant("zed"), Utc::now())
            .into_connection(Utc::now());
        assert_eq!(connection.view_for("amy").unwrap().user_id, "zed");
        assert_eq!(connection.view_for("zed").unwrap().name, "AMY");
        assert!(connection.view_for("bob").is_none());
    }

    #[test]
    fn status_serializes_with_tag() {
        let status = ConnectionStatus::Sent {
            request_id: PairKey::new("a", "b"),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "sent");
        assert_eq!(json["request_id"], "a_b");
        assert_eq!(
            serde_json::to_value(ConnectionStatus::None).unwrap()["status"],
            "none"
        );
    }
}
