// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Strata chat backend.
//!
//! Defines the entity model, the error taxonomy, and the [`Storage`]
//! contract implemented by every persistence backend. Nothing in this
//! crate performs I/O.

pub mod error;
pub mod storage;
pub mod types;

pub use error::StrataError;
pub use storage::Storage;
pub use types::{
    AppConfig, Conversation, ConversationUpdate, Domain, DomainUpdate, Endpoint,
    EndpointType, EndpointUpdate, InsertDomain, InsertEndpoint, InsertMessage, Message,
    MessageRole, Site, UserContext,
};
