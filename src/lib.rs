pub mod adapters;
pub mod api_docs;
pub mod app;
pub mod app_state;
pub mod bootstrap;
pub mod common;
pub mod config;
pub mod core;
pub mod database;
pub mod enums;
pub mod errors;
pub mod fanout;
pub mod models;
pub mod queue;
pub mod routes;
pub mod store;
pub mod utils;
