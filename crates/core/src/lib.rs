//! Core types and shared functionality for the mikra offline agent.
//!
//! This crate provides:
//! - Request/response values exchanged between the engine and its collaborators
//! - The `CacheStorage` and `Network` collaborator contracts
//! - A SQLite-backed cache store implementing `CacheStorage`
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod network;

pub use cache::{CacheDb, CacheStorage};
pub use config::{AgentConfig, ConfigError, HostMatch};
pub use error::Error;
pub use http::{Request, Response};
pub use network::Network;
