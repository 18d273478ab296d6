//! Data types shared across pipeline stages.

pub mod config;
pub mod content;
pub mod intent;
pub mod platform;
pub mod record;
pub mod request;
pub mod schema;
pub mod state;
