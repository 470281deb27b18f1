use std::fmt;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode};

use crate::errors::{AuthenticateError, Error as AppError};

use super::types::TokenClaims;

/// HS256 keys derived from the configured secret. Shared by the auth
/// extractor, the request logger and the rate limiter key extractor.
#[derive(Clone)]
pub struct JwtConfig {
    keys: Arc<JwtKeys>,
}

struct JwtKeys {
    decoding: DecodingKey,
    encoding: EncodingKey,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig").finish_non_exhaustive()
    }
}

impl JwtConfig {
    pub fn new(secret_key: &str) -> Self {
        Self {
            keys: Arc::new(JwtKeys {
                decoding: DecodingKey::from_secret(secret_key.as_bytes()),
                encoding: EncodingKey::from_secret(secret_key.as_bytes()),
            }),
        }
    }

    /// JWT decode function
    pub fn decode_jwt(&self, token: &str) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<TokenClaims>(token, &self.keys.decoding, &validation).map(|data| data.claims)
    }

    // Tokens are issued by the identity provider; this is for local tooling and tests.
    pub fn generate_jwt(
        &self,
        user_id: &str,
        role: Option<String>,
        expiration_seconds: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let iat = now.timestamp() as usize;
        let exp = (now + Duration::seconds(expiration_seconds)).timestamp() as usize;

        let claims = TokenClaims {
            user_id: user_id.to_string(),
            role,
            iat,
            exp,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.keys.encoding)
    }
}

/// Authenticated caller. The `userId` claim is trusted as-is.
#[derive(Debug, Clone)]
pub struct JwtAuth(pub TokenClaims);

impl JwtAuth {
    pub fn user_id(&self) -> &str {
        &self.0.user_id
    }
}

impl<S> FromRequestParts<S> for JwtAuth
where
    JwtConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AuthenticateError::MissingCredentials)?;

        let jwt_config = JwtConfig::from_ref(state);
        let token_data = jwt_config
            .decode_jwt(bearer.token())
            .map_err(|_| AuthenticateError::InvalidToken)?;

        if token_data.user_id.is_empty() {
            return Err(AuthenticateError::InvalidToken.into());
        }

        Ok(JwtAuth(token_data))
    }
}
