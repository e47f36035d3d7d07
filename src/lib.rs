pub mod app;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod skills;
pub mod state;
pub mod storage;
pub mod users;
