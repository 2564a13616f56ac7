//! Network client for the mikra agent.
//!
//! This crate provides the reqwest-backed implementation of the
//! `mikra_core::Network` contract and the URL helpers used to build
//! requests from configuration and tool input.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, canonicalize, resolve};
