//! Credential models shared by the store, coordinator, and pipeline.

pub mod credential;

pub use credential::*;
