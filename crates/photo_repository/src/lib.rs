//! C5 — Photo Repository: entity persistence, dedup lookup, vector
//! search, and the tag graph, per spec.md §4.5.
//!
//! One `*Store` struct per aggregate, mirroring
//! `crates/libs/common_services::database::stores::*` in the teacher:
//! free functions taking `impl Executor<'_, Database = Postgres>` so
//! callers choose between a bare pool and an in-flight transaction.

mod drive_sync_store;
mod memory_store;
mod photo_store;
mod pool;
mod tag_store;
mod user_store;

pub use drive_sync_store::DriveSyncStore;
pub use memory_store::MemoryStore;
pub use photo_store::{DuplicateGroup, PaginationPage, PhotoStore};
pub use pool::{connect_pool, run_migrations};
pub use tag_store::TagStore;
pub use user_store::UserStore;
