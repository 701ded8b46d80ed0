pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod provider;
pub mod resilience;
pub mod service;

#[cfg(test)]
pub mod test_helpers;

pub use config::Config;
pub use engine::{EngineEvent, LoadRequest, MediaEngine};
pub use error::{Error, Result};
pub use service::SessionController;
