//! Data models

pub mod artifact;
pub mod component;
