// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canned assistant replies for when no serving endpoint is reachable.

/// Build a deterministic placeholder reply. Used whenever the remote
/// invocation fails or the workspace is not configured, so the chat
/// flow keeps working end to end.
pub fn generate_mock_response(
    message: &str,
    endpoint_name: &str,
    domain_name: &str,
    site_name: &str,
    history_len: usize,
) -> String {
    let mut reply = format!(
        "[{endpoint_name} | {domain_name}] You asked: \"{message}\". \
         Live model serving is not reachable right now, so this is a canned response."
    );

    if site_name != "All Sites" {
        reply.push_str(&format!(" (focused on {site_name})"));
    }
    if history_len > 0 {
        reply.push_str(&format!(
            "\n\n*I have {history_len} earlier message{} from this conversation as context.*",
            if history_len == 1 { "" } else { "s" }
        ));
    }
    reply
}
