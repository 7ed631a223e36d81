//! The acting user for one request
//!
//! A [`Session`] is built once at the edge (from verified identity claims)
//! and handed explicitly to every mutating operation. It is never stored
//! globally; its lifetime is the request that created it.

use serde::{Deserialize, Serialize};

use crate::{
    error::{SocialError, SocialResult},
    validation::validate_user_id,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    user_id: String,
    email: Option<String>,
    email_verified: bool,
}

impl Session {
    /// Build a session from identity-provider claims
    pub fn new(
        user_id: impl Into<String>,
        email: Option<String>,
        email_verified: bool,
    ) -> SocialResult<Self> {
        let user_id = user_id.into();
        validate_user_id(&user_id)?;
        Ok(Self {
            user_id,
            email,
            email_verified,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Accounts act only once the provider has verified their email
    pub fn require_verified(&self) -> SocialResult<()> {
        if !self.email_verified {
            return Err(SocialError::Forbidden(
                "Email address is not verified".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ids_that_break_pair_keys() {
        assert!(Session::new("abc_def", None, true).is_err());
        assert!(Session::new("", None, true).is_err());
        let session = Session::new("u1", Some("a@kiit.ac.in".into()), true).unwrap();
        assert!(session.is("u1"));
        assert_eq!(session.email(), Some("a@kiit.ac.in"));
    }

    #[test]
    fn unverified_sessions_are_forbidden() {
        let session = Session::new("u1", Some("a@kiit.ac.in".into()), false).unwrap();
        assert!(matches!(
            session.require_verified(),
            Err(SocialError::Forbidden(_))
        ));
        let session = Session::new("u1", None, true).unwrap();
        assert!(session.require_verified().is_ok());
    }
}
