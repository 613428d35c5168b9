pub mod access;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod models;
pub mod quota;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod validation;
