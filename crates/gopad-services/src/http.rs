//! Shared HTTP plumbing for the collaborators.

use std::time::Duration;

use gopad_core::CollaboratorError;
use serde::de::DeserializeOwned;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("gopad/", env!("CARGO_PKG_VERSION"));

/// Largest error body kept in a [`CollaboratorError::Status`].
const MAX_ERROR_BODY: usize = 2_048;

/// HTTP client shared by all collaborators.
///
/// Only the connect phase is bounded here; whole-call bounds are applied by
/// the dispatcher when configured.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
}

/// Join a base URL and a path without doubling the slash.
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Send a request and decode a JSON success body.
pub async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, CollaboratorError> {
    let response = request
        .send()
        .await
        .map_err(|e| CollaboratorError::Network(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CollaboratorError::Network(format!("failed to read response: {e}")))?;

    if !status.is_success() {
        let mut body = body;
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(CollaboratorError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))
}
