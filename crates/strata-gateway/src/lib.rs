// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API gateway for the Strata chat backend.
//!
//! Thin routing and serialization over the storage contract and the
//! serving client, plus the request-context resolver and the canned
//! fallback responder.

pub mod context;
pub mod handlers;
pub mod mock;
pub mod server;

pub use server::{AppState, router, start_server};
