//! Instanti8 Server Library
//!
//! Core modules for the Instanti8 deployment orchestration backend.

pub mod azure;
pub mod chat;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod logs;
pub mod models;
pub mod registry;
pub mod server;
