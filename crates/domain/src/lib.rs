//! `ps-domain`: types shared by every pubsub-client crate: the error
//! enum, the TOML configuration model, and structured trace events.

pub mod config;
pub mod error;
pub mod trace;
