// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-request user identity from trusted proxy headers.
//!
//! Authentication happens upstream at the reverse proxy; these headers
//! arrive pre-verified and no authenticity check is performed here.
//! Anything reaching this service without passing the proxy is a
//! deployment error, not something this layer can detect.

use axum::http::HeaderMap;

use strata_core::UserContext;

/// Header carrying the authenticated user's email.
pub const FORWARDED_EMAIL: &str = "x-forwarded-email";

/// Header carrying the user's upstream access token.
pub const FORWARDED_ACCESS_TOKEN: &str = "x-forwarded-access-token";

/// Resolve the request's user context from proxy headers.
///
/// With `dev_fallback`, requests without identity headers resolve to a
/// fixed developer identity instead of anonymous (local development
/// runs without the proxy in front).
pub fn resolve_user(headers: &HeaderMap, dev_fallback: bool) -> UserContext {
    let email = header_value(headers, FORWARDED_EMAIL);
    let access_token = header_value(headers, FORWARDED_ACCESS_TOKEN);

    if email.is_none() && dev_fallback {
        return dev_user();
    }

    let display_name = email.as_deref().map(display_name_from_email);
    UserContext {
        email,
        access_token,
        display_name,
    }
}

/// Fixed identity for proxy-less local development.
pub fn dev_user() -> UserContext {
    UserContext {
        email: Some("developer@meridianresources.com".to_string()),
        access_token: None,
        display_name: Some("Developer".to_string()),
    }
}

/// Derive a display name from the email's local part: split on
/// non-alphanumeric separators and title-case each word.
pub fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    local
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
