//! Request router and cache strategy engine for the mikra offline agent.
//!
//! The worker receives three kinds of events. `install` seeds the current
//! cache partition with the precache manifest, `activate` purges every
//! other partition and claims open clients, and `fetch` classifies the
//! request host and answers through one of three strategies:
//!
//! | host | strategy |
//! |---|---|
//! | live-data API | network only, synthesized JSON error when offline |
//! | map tiles | cache first, network on miss |
//! | anything else | stale-while-revalidate |
//!
//! The cache store and the network are collaborators behind the
//! `mikra_core::CacheStorage` and `mikra_core::Network` traits.

pub mod classify;
pub mod event;
pub mod handler;
pub mod lifecycle;
pub mod strategy;
pub mod tools;
pub mod worker;

pub use classify::{Classifier, Strategy};
pub use event::{ClientSignal, Event, EventKind, Lifetime};
pub use strategy::{ResponseSource, Served, StrategyExecutor};
pub use worker::{EventOutcome, Worker, WorkerState};
