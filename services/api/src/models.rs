//! API models for request and response payloads

use serde::{Deserialize, Serialize};
use social::{
    PairKey,
    models::{ConnectionRequest, ConnectionStatus, UserProfile},
};

/// Request to connect with another user
#[derive(Deserialize)]
pub struct SendRequestPayload {
    pub to: String,
}

#[derive(Deserialize)]
pub struct RenamePayload {
    pub username: String,
}

#[derive(Deserialize)]
pub struct DeletePostPayload {
    pub url: String,
}

#[derive(Deserialize)]
pub struct SuggestionsQuery {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub username: String,
    pub available: bool,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// A profile as seen by another user, with the relationship between them
#[derive(Serialize)]
pub struct PersonResponse {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub connection: ConnectionStatus,
}

/// Pending requests with the pair key callers pass back to accept or decline
#[derive(Serialize)]
pub struct RequestListResponse {
    pub requests: Vec<ConnectionRequest>,
    pub count: usize,
}

impl From<Vec<ConnectionRequest>> for RequestListResponse {
    fn from(requests: Vec<ConnectionRequest>) -> Self {
        Self {
            count: requests.len(),
            requests,
        }
    }
}

#[derive(Serialize)]
pub struct RenameResponse {
    pub previous: String,
    pub profile: UserProfile,
}

#[derive(Serialize)]
pub struct RemovedResponse {
    pub id: PairKey,
    pub message: &'static str,
}
