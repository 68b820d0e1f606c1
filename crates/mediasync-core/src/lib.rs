//! Download orchestration engine for syncing a purchased media collection.
//!
//! Items come from a `catalog::CatalogClient`, get destinations from a
//! `layout::PathFormatter`, and are downloaded by `engine::WorkerPool`.

pub mod config;
pub mod logging;

pub mod catalog;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod idempotency;
pub mod job;
pub mod layout;
pub mod retry;
pub mod storage;
