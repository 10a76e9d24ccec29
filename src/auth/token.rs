// Bearer token extraction
//
// Tokens travel in Authorization headers in both directions: requests carry
// `Authorization: Bearer <token>` and authentication responses (login,
// two-factor verify, OAuth exchange, refresh) return the new token the same
// way, never in the JSON body.

use reqwest::header::{HeaderMap, AUTHORIZATION};

/// Extract a bearer token from a header map.
///
/// Returns `None` when the header is absent, is not valid UTF-8, does not
/// use the `Bearer ` scheme, or carries an empty token.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;

    if token.is_empty() {
        return None;
    }

    Some(token.to_string())
}
