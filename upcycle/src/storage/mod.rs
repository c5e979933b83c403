//! Local state storage

pub mod layout;
pub mod settings;
