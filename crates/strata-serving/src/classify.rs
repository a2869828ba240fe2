// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic classification of serving endpoints.
//!
//! Rules are evaluated in a fixed precedence order and the first match
//! wins; reordering them changes classifications for descriptors that
//! match several rules.

use strata_core::EndpointType;

use crate::types::EndpointDescriptor;

/// Name substrings that mark a hosted general-purpose model.
const FOUNDATION_KEYWORDS: [&str; 6] = ["llama", "mixtral", "dbrx", "claude", "gpt", "gemini"];

/// Classify a raw endpoint descriptor.
///
/// Precedence:
/// 1. Declared task contains "agent".
/// 2. Per served entity, in listing order: external-model marker wins
///    as foundation, then "agent" in the entity name, then "agent" in
///    the version string.
/// 3. "agent" in the endpoint name.
/// 4. A foundation keyword in the endpoint name.
/// 5. Route-optimized endpoints default to foundation.
/// 6. Everything else is custom.
pub fn classify(descriptor: &EndpointDescriptor) -> EndpointType {
    if let Some(task) = &descriptor.task {
        if task.to_lowercase().contains("agent") {
            return EndpointType::Agent;
        }
    }

    if let Some(config) = &descriptor.config {
        for entity in &config.served_entities {
            if entity.external_model.is_some() {
                return EndpointType::Foundation;
            }
            if let Some(entity_name) = &entity.entity_name {
                if entity_name.to_lowercase().contains("agent") {
                    return EndpointType::Agent;
                }
            }
            if let Some(version) = entity.version_string() {
                if version.to_lowercase().contains("agent") {
                    return EndpointType::Agent;
                }
            }
        }
    }

    let name = descriptor.name.to_lowercase();
    if name.contains("agent") {
        return EndpointType::Agent;
    }

    if FOUNDATION_KEYWORDS.iter().any(|kw| name.contains(kw)) {
        return EndpointType::Foundation;
    }

    if descriptor.route_optimized {
        return EndpointType::Foundation;
    }

    EndpointType::Custom
}
