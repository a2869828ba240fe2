// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Id derivation for domains and endpoints.
//!
//! Every backend derives ids the same way; the caller must hold
//! whatever lock guards the occupied-id set for the whole
//! derive-and-insert sequence, or concurrent creates can mint
//! duplicate ids.

/// Derive a unique id from a display name.
///
/// The base is the lowercased name with spaces as hyphens and every
/// character outside alphanumerics-and-hyphen stripped. On collision
/// the first free numeric suffix is appended: `base`, `base-1`,
/// `base-2`, with no gaps or reuse.
pub fn derive_id(name: &str, is_occupied: impl Fn(&str) -> bool) -> String {
    let base: String = name
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect();

    if !is_occupied(&base) {
        return base;
    }

    let mut counter = 1;
    loop {
        let candidate = format!("{base}-{counter}");
        if !is_occupied(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
