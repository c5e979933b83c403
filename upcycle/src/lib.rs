//! upcycle library
//!
//! A transactional update/rollback orchestrator for a small compose-managed
//! service stack: snapshot, sync, build, restart, health-check, then commit
//! or revert.

pub mod backup;
pub mod build;
pub mod errors;
pub mod filesys;
pub mod health;
pub mod logs;
pub mod models;
pub mod registry;
pub mod runtime;
pub mod source;
pub mod storage;
pub mod update;
pub mod utils;
pub mod verify;
