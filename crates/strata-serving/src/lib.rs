// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote model-serving integration for Strata.
//!
//! Wraps the workspace serving API: OAuth client-credential exchange,
//! endpoint listing with heuristic type classification, and chat
//! invocation with a reply-extraction fallback chain.

pub mod classify;
pub mod client;
pub mod types;

pub use classify::classify;
pub use client::{FALLBACK_REPLY, ServingClient};
pub use types::ChatMessage;
