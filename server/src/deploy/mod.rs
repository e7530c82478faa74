//! Deployment orchestration: executors, status lifecycle, code handling

pub mod codegen;
pub mod executor;
pub mod fsm;
pub mod parse;
pub mod saas;
