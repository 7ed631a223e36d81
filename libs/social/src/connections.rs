//! Connection request lifecycle and the derived per-pair status

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::{
    error::{SocialError, SocialResult},
    models::{Connection, ConnectionRequest, ConnectionStatus, ConnectionView, Participant},
    pair::PairKey,
    session::Session,
    store::SocialStore,
    validation::validate_user_id,
};

/// Drives requests and connections between pairs of users
#[derive(Clone)]
pub struct ConnectionEngine {
    store: Arc<dyn SocialStore>,
}

impl ConnectionEngine {
    /// Create a new connection engine over a store
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    async fn participant(&self, user_id: &str) -> SocialResult<Participant> {
        let profile = self
            .store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| SocialError::not_found("user", user_id))?;

        let name = if profile.display_name.is_empty() {
            profile.username
        } else {
            profile.display_name
        };
        Ok(Participant {
            user_id: profile.uid,
            name,
            photo_url: profile.photo_url,
        })
    }

    /// Send a connection request from the session user to `to`
    pub async fn send_request(&self, session: &Session, to: &str) -> SocialResult<ConnectionRequest> {
        session.require_verified()?;
        validate_user_id(to)?;
        if session.is(to) {
            return Err(SocialError::Invalid(
                "Cannot send a connection request to yourself".to_string(),
            ));
        }
        info!("Sending connection request from {} to {}", session.user_id(), to);

        let key = PairKey::new(session.user_id(), to);
        let recipient = self.participant(to).await?;
        let sender = self.participant(session.user_id()).await?;

        if self.store.get_connection(&key).await?.is_some() {
            return Err(SocialError::AlreadyConnected);
        }
        if let Some(existing) = self.store.get_request(&key).await? {
            if existing.is_pending() {
                return Err(SocialError::AlreadyPending);
            }
            // Leftover from an older write path; clear it so the insert below can land
            self.store.delete_request(&key).await?;
        }

        let request = ConnectionRequest::new(sender, recipient, Utc::now());
        if !self.store.insert_request(&request).await? {
            return Err(SocialError::AlreadyPending);
        }
        Ok(request)
    }

    /// Withdraw a request; only its sender may do this
    pub async fn cancel_request(&self, session: &Session, request_id: &PairKey) -> SocialResult<()> {
        session.require_verified()?;
        info!("User {} cancelling request {}", session.user_id(), request_id);
        let request = self.find_request(request_id).await?;
        if !request.is_from(session.user_id()) {
            return Err(SocialError::Forbidden(
                "Only the sender can cancel a connection request".to_string(),
            ));
        }
        self.delete_or_not_found(request_id).await
    }

    /// Accept a pending request; only its recipient may do this
    pub async fn accept_request(
        &self,
        session: &Session,
        request_id: &PairKey,
    ) -> SocialResult<Connection> {
        session.require_verified()?;
        info!("User {} accepting request {}", session.user_id(), request_id);
        let request = self.find_request(request_id).await?;
        if !request.is_to(session.user_id()) {
            return Err(SocialError::Forbidden(
                "Only the recipient can accept a connection request".to_string(),
            ));
        }
        if !request.is_pending() {
            return Err(SocialError::not_found("connection request", request_id));
        }

        let connection = request.into_connection(Utc::now());
        if !self.store.commit_acceptance(&connection).await? {
            return Err(SocialError::not_found("connection request", request_id));
        }
        info!(
            "Users {} and {} are now connected",
            connection.user1.user_id, connection.user2.user_id
        );
        Ok(connection)
    }

    /// Decline a request; only its recipient may do this
    pub async fn decline_request(&self, session: &Session, request_id: &PairKey) -> SocialResult<()> {
        session.require_verified()?;
        info!("User {} declining request {}", session.user_id(), request_id);
        let request = self.find_request(request_id).await?;
        if !request.is_to(session.user_id()) {
            return Err(SocialError::Forbidden(
                "Only the recipient can decline a connection request".to_string(),
            ));
        }
        self.delete_or_not_found(request_id).await
    }

    /// Remove the connection between the session user and `other`
    pub async fn remove_connection(&self, session: &Session, other: &str) -> SocialResult<()> {
        session.require_verified()?;
        validate_user_id(other)?;
        info!("Removing connection between {} and {}", session.user_id(), other);

        let key = PairKey::new(session.user_id(), other);
        if !self.store.commit_removal(&key).await? {
            return Err(SocialError::not_found("connection", key));
        }
        Ok(())
    }

    /// Relationship of `current` to `target`; lookup failures read as no relationship
    pub async fn get_status(&self, current: &str, target: &str) -> ConnectionStatus {
        match self.lookup_status(current, target).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to resolve connection status {} -> {}: {}", current, target, e);
                ConnectionStatus::None
            }
        }
    }

    async fn lookup_status(&self, current: &str, target: &str) -> SocialResult<ConnectionStatus> {
        if current == target {
            return Ok(ConnectionStatus::None);
        }
        let key = PairKey::new(current, target);

        if self.store.get_connection(&key).await?.is_some() {
            return Ok(ConnectionStatus::Connected);
        }

        let status = match self.store.get_request(&key).await? {
            Some(request) if request.is_pending() && request.is_from(current) => {
                ConnectionStatus::Sent { request_id: request.id }
            }
            Some(request) if request.is_pending() => ConnectionStatus::Received { request_id: request.id },
            _ => ConnectionStatus::None,
        };
        Ok(status)
    }

    pub async fn get_request_between(&self, a: &str, b: &str) -> SocialResult<Option<ConnectionRequest>> {
        self.store.get_request(&PairKey::new(a, b)).await
    }

    pub async fn are_connected(&self, a: &str, b: &str) -> SocialResult<bool> {
        Ok(self.store.get_connection(&PairKey::new(a, b)).await?.is_some())
    }

    /// Pending requests addressed to the user, newest first
    pub async fn received_requests(&self, user_id: &str) -> SocialResult<Vec<ConnectionRequest>> {
        self.store.requests_to(user_id).await
    }

    /// Pending requests the user has sent, newest first
    pub async fn sent_requests(&self, user_id: &str) -> SocialResult<Vec<ConnectionRequest>> {
        self.store.requests_from(user_id).await
    }

    pub async fn user_connections(&self, user_id: &str) -> SocialResult<Vec<Connection>> {
        self.store.connections_of(user_id).await
    }

    pub async fn connections_count(&self, user_id: &str) -> SocialResult<usize> {
        Ok(self.user_connections(user_id).await?.len())
    }

    /// The user's connections, each showing the other member
    pub async fn connection_views(&self, user_id: &str) -> SocialResult<Vec<ConnectionView>> {
        let connections = self.user_connections(user_id).await?;
        Ok(connections
            .iter()
            .filter_map(|c| c.view_for(user_id))
            .collect())
    }

    async fn find_request(&self, request_id: &PairKey) -> SocialResult<ConnectionRequest> {
        self.store
            .get_request(request_id)
            .await?
            .ok_or_else(|| SocialError::not_found("connection request", request_id))
    }

    async fn delete_or_not_found(&self, request_id: &PairKey) -> SocialResult<()> {
        if !self.store.delete_request(request_id).await? {
            return Err(SocialError::not_found("connection request", request_id));
        }
        Ok(())
    }
}
