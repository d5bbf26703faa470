// Library exports for roost
// This allows integration tests and external code to use roost modules

pub mod actions;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod notifications;
pub mod routes;
pub mod state;
pub mod store;
pub mod timeline;
