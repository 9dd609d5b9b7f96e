//! mito-core - Core library for MITO
//!
//! The network resilience layer of the MITO task client: a request executor
//! with timeout, retry and offline queueing, the persistent action log and
//! its sync coordinator, the realtime push channel and the notification
//! aggregator. Shells (the CLI) only wire these together and present results.

pub mod api;
pub mod auth;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod http;
pub mod models;
pub mod notifications;
pub mod outbox;
pub mod realtime;
pub mod storage;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{NormalizedNotification, RecordId, User};
