//! Credentials and the token handoff flow.
//!
//! A [`Credential`] is an opaque bearer token. It can come from the command
//! line, the `MOTHERDUCK_TOKEN` environment variable, the clipboard (after
//! the user fetched one from the token-request page) or the connect pane.
//! It is never written to disk.

pub mod clipboard;

pub use clipboard::credential_from_clipboard;

use std::fmt;

use url::Url;

use crate::error::{ExploreError, Result};

/// Environment variable holding the service token.
pub const TOKEN_ENV_VAR: &str = "MOTHERDUCK_TOKEN";

/// Where users obtain a token.
pub const DEFAULT_TOKEN_SERVICE_URL: &str = "https://app.motherduck.com";

/// Application name shown on the token-request page.
pub const DEFAULT_APP_NAME: &str = "duck-explore: NYPD Complaints";

/// An opaque bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a token as given. Callers reading user input trim it first.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for handing to the engine.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

/// Picks the credential to use at startup.
///
/// Precedence: explicit flag, then `MOTHERDUCK_TOKEN`. Values are trimmed
/// and blank ones ignored.
pub fn resolve_credential(flag: Option<&str>) -> Option<Credential> {
    let from_env = std::env::var(TOKEN_ENV_VAR).ok();
    pick_credential(flag, from_env.as_deref())
}

fn pick_credential(flag: Option<&str>, env: Option<&str>) -> Option<Credential> {
    [flag, env]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(Credential::new)
}

/// Builds the URL of the external token-request page.
///
/// The page issues a token for `app_name`, copies it to the clipboard and
/// sends the user back to `return_to` when given.
pub fn token_request_url(service_url: &str, app_name: &str, return_to: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(service_url)
        .map_err(|e| ExploreError::config(format!("Invalid token service URL: {e}")))?;

    url.path_segments_mut()
        .map_err(|_| ExploreError::config(format!("Token service URL cannot be a base: {service_url}")))?
        .pop_if_empty()
        .push("token-request");

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("appName", app_name);
        if let Some(return_to) = return_to {
            query.append_pair("returnTo", return_to);
        }
    }

    Ok(url)
}
