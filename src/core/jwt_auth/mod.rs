pub mod jwt_auth;
pub mod types;
