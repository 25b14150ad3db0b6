//! REST API client module for game-statistics profile services.
//!
//! This module provides the `ApiClient` for fetching the raw JSON profile of
//! a player, clan or band by tag, and the `Fetcher` trait the snapshot store
//! is written against.

pub mod client;
pub mod error;

pub use client::{ApiClient, Fetcher, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
