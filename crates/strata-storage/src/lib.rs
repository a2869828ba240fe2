// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage backends for Strata.
//!
//! Four interchangeable implementations of the [`strata_core::Storage`]
//! contract -- in-memory, Postgres, managed Postgres with OAuth token
//! refresh, and SQL warehouse -- plus the environment-driven selector
//! that picks one at startup with graceful fallback.

pub mod cache;
pub mod ids;
pub mod managed;
pub mod memory;
mod pg;
pub mod postgres;
pub mod seed;
pub mod select;
pub mod warehouse;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use select::{BackendChoice, choose_backend, initialize_storage};
pub use warehouse::WarehouseStorage;

/// Milliseconds since the Unix epoch; the timestamp base for
/// conversations and messages.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
