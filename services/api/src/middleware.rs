//! Authentication middleware for identity-provider tokens

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use social::Session;
use tracing::warn;

use crate::{error::ApiError, state::AppState};

/// JWT claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Opaque user id
    pub sub: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    /// Expiration time
    pub exp: u64,
}

/// Verifies RS256 bearer tokens against the configured public key
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn from_pem(pem: &str) -> anyhow::Result<Self> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        Ok(Self { key, validation })
    }

    /// Decode the token and turn its claims into a session
    pub fn verify(&self, token: &str) -> Result<Session, ApiError> {
        let token_data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| {
                warn!("Failed to validate token: {}", e);
                ApiError::Unauthorized
            })?;

        let claims = token_data.claims;
        let session = Session::new(claims.sub, claims.email, claims.email_verified).map_err(|e| {
            warn!("Token subject rejected: {}", e);
            ApiError::Unauthorized
        })?;
        session.require_verified()?;
        Ok(session)
    }
}

/// Authentication middleware
///
/// Inserts the caller's [`Session`] into the request extensions. Accounts
/// whose email is unverified get 403 on every protected route.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(ApiError::Unauthorized)?;
    let session = state.verifier.verify(bearer.token())?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use social::SocialError;

    const PRIVATE_KEY: &str = include_str!("../testdata/jwt_test_private.pem");
    const PUBLIC_KEY: &str = include_str!("../testdata/jwt_test_public.pem");

    fn token(sub: &str, email_verified: bool) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            email: Some(format!("{}@kiit.ac.in", sub)),
            email_verified,
            exp: 4_102_444_800,
        };
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
        encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
    }

    #[test]
    fn verified_token_yields_session() {
        let verifier = TokenVerifier::from_pem(PUBLIC_KEY).unwrap();
        let session = verifier.verify(&token("asha", true)).unwrap();
        assert_eq!(session.user_id(), "asha");
        assert_eq!(session.email(), Some("asha@kiit.ac.in"));
    }

    #[test]
    fn unverified_email_is_forbidden() {
        let verifier = TokenVerifier::from_pem(PUBLIC_KEY).unwrap();
        let err = verifier.verify(&token("eve", false)).unwrap_err();
        assert!(matches!(err, ApiError::Social(SocialError::Forbidden(_))));
    }

    #[test]
    fn malformed_subject_or_token_is_unauthorized() {
        let verifier = TokenVerifier::from_pem(PUBLIC_KEY).unwrap();
        assert!(matches!(
            verifier.verify(&token("bad_id", true)),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            verifier.verify("not-a-token"),
            Err(ApiError::Unauthorized)
        ));
    }
}
