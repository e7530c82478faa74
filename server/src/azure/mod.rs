//! Azure management-plane integration

pub mod auth;
pub mod client;
