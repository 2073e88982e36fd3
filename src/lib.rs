pub mod acl;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
