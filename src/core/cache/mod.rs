pub mod redis_emitter;
pub mod redis_service;
