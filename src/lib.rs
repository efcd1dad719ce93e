//! Library crate for gotcha-back, exposing modules for binaries and integration tests.

mod auth;
mod config;
pub mod dao;
mod dto;
mod error;
mod oracle;
pub mod routes;
pub mod services;
pub mod state;
