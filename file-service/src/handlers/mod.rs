pub mod auth;
pub mod download;
pub mod files;
pub mod health;
pub mod upload;
