//! Bearer-token verification. Maps a JWT to the owning user's id and fails
//! closed on anything it cannot validate.

use crate::services::error::{UploadError, UploadResult};
use axum::http::{HeaderMap, header};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const ISSUER: &str = "tubely-access";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

#[derive(Clone)]
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mint an HS256 token for `user_id` valid for `ttl`.
    pub fn issue_token(&self, user_id: Uuid, ttl: Duration) -> UploadResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: ISSUER.to_string(),
            sub: user_id.to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| UploadError::Unauthenticated(format!("could not sign token: {}", e)))
    }

    /// Validate `token` and return the user id it was issued for.
    pub fn validate_token(&self, token: &str) -> UploadResult<Uuid> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!("JWT validation failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    UploadError::Unauthenticated("token has expired".to_string())
                }
                _ => UploadError::Unauthenticated("couldn't validate JWT".to_string()),
            }
        })?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| UploadError::Unauthenticated("token subject is not a user id".into()))
    }

    /// Extract the bearer token from `headers` and validate it.
    pub fn authenticate(&self, headers: &HeaderMap) -> UploadResult<Uuid> {
        let token = bearer_token(headers)?;
        self.validate_token(token)
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> UploadResult<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| UploadError::Unauthenticated("couldn't find JWT".into()))?
        .to_str()
        .map_err(|_| UploadError::Unauthenticated("authorization header is not ASCII".into()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(UploadError::Unauthenticated(
            "malformed authorization header".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn issued_token_validates_to_same_user() {
        let verifier = JwtVerifier::new("secret");
        let user = Uuid::new_v4();
        let token = verifier.issue_token(user, Duration::from_secs(60)).unwrap();
        assert_eq!(verifier.validate_token(&token).unwrap(), user);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = JwtVerifier::new("a")
            .issue_token(Uuid::new_v4(), Duration::from_secs(60))
            .unwrap();
        let err = JwtVerifier::new("b").validate_token(&token).unwrap_err();
        assert!(matches!(err, UploadError::Unauthenticated(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let verifier = JwtVerifier::new("secret");
        let token = verifier
            .issue_token(Uuid::new_v4(), Duration::from_secs(0))
            .unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        assert!(verifier.validate_token(&token).is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }
}
