//! Domain models

pub mod connection;
pub mod group;
pub mod profile;

// Re-export for convenience
pub use connection::{
    Connection, ConnectionRequest, ConnectionStatus, ConnectionView, Participant, RequestStatus,
};
pub use group::{Group, NewGroup};
pub use profile::{
    ImageSlot, NewProfile, ProfileRecord, ProfileSignup, ProfileUpdate, SocialLinks, UserProfile,
    UsernameReservation,
};
