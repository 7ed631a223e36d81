//! Store boundary
//!
//! The engines only talk to the traits below. Every method that touches more
//! than one document (profile creation, rename, acceptance, removal) is a
//! single atomic unit in each implementation, so callers never see a half
//! applied flow.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::SocialResult,
    models::{
        Connection, ConnectionRequest, Group, ImageSlot, NewProfile, ProfileUpdate, UserProfile,
        UsernameReservation,
    },
    pair::PairKey,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Create the profile and reserve its username together
    ///
    /// Fails with `UsernameTaken` when the username is reserved and with
    /// `Conflict` when the user already has a profile.
    async fn create_profile(&self, profile: &NewProfile) -> SocialResult<UserProfile>;

    async fn get_profile(&self, uid: &str) -> SocialResult<Option<UserProfile>>;

    async fn list_profiles(&self) -> SocialResult<Vec<UserProfile>>;

    async fn update_profile(&self, uid: &str, update: &ProfileUpdate) -> SocialResult<UserProfile>;

    /// Point an image slot at `url`, returning the URL it replaced
    async fn swap_image(&self, uid: &str, slot: ImageSlot, url: &str)
    -> SocialResult<Option<String>>;

    async fn append_post(&self, uid: &str, url: &str) -> SocialResult<UserProfile>;

    /// Returns false when the post was not on the profile
    async fn remove_post(&self, uid: &str, url: &str) -> SocialResult<bool>;

    async fn find_reservation(&self, username: &str) -> SocialResult<Option<UsernameReservation>>;

    /// Reserve `new_username`, release the old reservation, and update the
    /// profile; returns the previous username with the updated profile
    async fn rename_username(
        &self,
        uid: &str,
        new_username: &str,
    ) -> SocialResult<(String, UserProfile)>;
}

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn get_request(&self, id: &PairKey) -> SocialResult<Option<ConnectionRequest>>;

    /// Insert-if-absent; false when a request already exists for the pair
    async fn insert_request(&self, request: &ConnectionRequest) -> SocialResult<bool>;

    async fn delete_request(&self, id: &PairKey) -> SocialResult<bool>;

    /// Pending requests addressed to `user_id`, newest first
    async fn requests_to(&self, user_id: &str) -> SocialResult<Vec<ConnectionRequest>>;

    /// Pending requests sent by `user_id`, newest first
    async fn requests_from(&self, user_id: &str) -> SocialResult<Vec<ConnectionRequest>>;

    async fn get_connection(&self, id: &PairKey) -> SocialResult<Option<Connection>>;

    /// Connections with `user_id` on either side, newest first
    async fn connections_of(&self, user_id: &str) -> SocialResult<Vec<Connection>>;

    /// Delete the pending request sent by `user1` to `user2`, insert the
    /// connection, and bump both members' counters
    ///
    /// Returns false (and writes nothing) when that request is gone or the
    /// pair's request now runs the other way; fails with `AlreadyConnected`
    /// when the connection exists.
    async fn commit_acceptance(&self, connection: &Connection) -> SocialResult<bool>;

    /// Delete the connection, decrement both counters (never below zero),
    /// and purge any request for the pair; false when there was no connection
    async fn commit_removal(&self, id: &PairKey) -> SocialResult<bool>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn insert_group(&self, group: &Group) -> SocialResult<()>;

    async fn get_group(&self, id: Uuid) -> SocialResult<Option<Group>>;

    /// All groups, newest first
    async fn list_groups(&self) -> SocialResult<Vec<Group>>;

    async fn groups_with_member(&self, user_id: &str) -> SocialResult<Vec<Group>>;

    /// Set-union the user into `members`; `None` when the group is missing
    async fn add_member(&self, id: Uuid, user_id: &str) -> SocialResult<Option<Group>>;

    /// Remove the user from `members` and `admins`; `None` when missing
    async fn remove_member(&self, id: Uuid, user_id: &str) -> SocialResult<Option<Group>>;

    /// Rewrite `member_count` from the member list, returning (before, after)
    async fn reconcile_member_count(&self, id: Uuid) -> SocialResult<Option<(u32, u32)>>;
}

/// Everything the services need from one backing store
pub trait SocialStore: ProfileStore + ConnectionStore + GroupStore {}

impl<T: ProfileStore + ConnectionStore + GroupStore> SocialStore for T {}
