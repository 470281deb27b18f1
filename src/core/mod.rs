pub mod cache;
pub mod jwt_auth;
pub mod kafka_service;
pub mod middleware;
