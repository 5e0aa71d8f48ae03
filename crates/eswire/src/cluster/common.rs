//! HTTP helpers shared by the admin client: client construction, URL and
//! index-name validation, error mapping.

use crate::error::{Error, Result};
use reqwest::Client;
use std::time::Duration;

/// Connect timeout for the admin endpoint.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates a configured HTTP client with timeout.
#[must_use]
pub fn create_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Validates the admin endpoint URL.
pub fn validate_url(url: &str) -> Result<()> {
    let has_valid_scheme = ["http://", "https://"].iter().any(|s| url.starts_with(s));

    if !has_valid_scheme {
        return Err(Error::Config(format!(
            "Invalid URL scheme in '{}'. Allowed: http, https",
            url
        )));
    }

    if url.len() < 10 {
        return Err(Error::Config(format!("Invalid URL format: {}", url)));
    }

    Ok(())
}

/// Validates that a name designates exactly one index and is safe in a URL path.
pub fn validate_index_name(index: &str) -> Result<()> {
    const FORBIDDEN: &[char] = &['/', '\\', '?', '#', '*', ',', ' ', '"', '<', '>', '|'];

    if index.is_empty() || index == "." || index == ".." {
        return Err(Error::Config(format!("Invalid index name: '{}'", index)));
    }
    if index.starts_with('_') || index.starts_with('-') || index.starts_with('+') {
        return Err(Error::Config(format!(
            "Index name '{}' cannot start with '_', '-' or '+'",
            index
        )));
    }
    if let Some(c) = index.chars().find(|c| FORBIDDEN.contains(c)) {
        return Err(Error::Config(format!(
            "Index name '{}' contains forbidden character '{}'",
            index, c
        )));
    }
    Ok(())
}

/// Maps a non-success HTTP response to an error.
pub fn handle_http_error(status_code: u16, body: &str, action: &str) -> Error {
    match status_code {
        401 | 403 => Error::Authentication(format!("{} rejected: {}", action, body)),
        _ => Error::Cluster(format!("{} failed with {}: {}", action, status_code, body)),
    }
}
