use std::net::IpAddr;

use axum::http::Request;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use http::Method;
use tower_governor::{
    GovernorError,
    key_extractor::{KeyExtractor, SmartIpKeyExtractor},
};

use crate::core::jwt_auth::jwt_auth::JwtConfig;

/// Rate limit key: the caller's user id when a valid bearer token is present,
/// otherwise the client IP. Service-to-service ingress calls fall in the IP bucket.
#[derive(Debug, Clone)]
pub struct BearerOrSmartIpKeyExtractor {
    jwt: JwtConfig,
}

impl BearerOrSmartIpKeyExtractor {
    pub fn new(jwt: JwtConfig) -> Self {
        Self { jwt }
    }
}

#[derive(Debug, Hash, Eq, PartialEq, Clone, strum_macros::Display)]
pub enum RequestKey {
    User(String, Method, String), // user id, method, path
    Ip(IpAddr, Method, String),   // ip, method, path
}

impl KeyExtractor for BearerOrSmartIpKeyExtractor {
    type Key = RequestKey;

    fn extract<B>(&self, req: &Request<B>) -> Result<Self::Key, GovernorError> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        if let Some(auth) = req.headers().typed_get::<Authorization<Bearer>>() {
            if let Ok(claims) = self.jwt.decode_jwt(auth.token()) {
                return Ok(RequestKey::User(claims.user_id, method, path));
            }
        }

        // Fallback to IP extraction
        let ip = SmartIpKeyExtractor.extract(req)?;
        Ok(RequestKey::Ip(ip, method, path))
    }

    fn key_name(&self, key: &Self::Key) -> Option<String> {
        Some(format!("{key}"))
    }

    fn name(&self) -> &'static str {
        "BearerOrSmartIpKeyExtractor"
    }
}
