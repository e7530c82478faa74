//! Data models for deployments and cloud resources

pub mod container;
pub mod deployment;
