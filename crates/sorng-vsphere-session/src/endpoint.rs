//! SDK URL handling.
//!
//! Accepts the forms govc users type (`vc.lab.local`, `user:pass@host`,
//! `https://host/sdk`) and separates the embedded credentials from the
//! address so the transport can be set up before login.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{SessionError, SessionResult};
use crate::types::UserCredentials;

/// Path appended when the URL has none.
pub const DEFAULT_SDK_PATH: &str = "/sdk";

/// Parse an SDK URL, defaulting the scheme to `https` and the path to `/sdk`.
pub fn parse_service_url(service: &str) -> SessionResult<Url> {
    let raw = service.trim();
    if raw.is_empty() {
        return Err(SessionError::invalid_endpoint(
            "SDK URL () could not be parsed: empty URL",
        ));
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| {
        SessionError::invalid_endpoint(format!("SDK URL ({service}) could not be parsed: {e}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SessionError::invalid_endpoint(format!(
            "SDK URL ({service}) could not be parsed: unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(SessionError::invalid_endpoint(format!(
            "SDK URL ({service}) could not be parsed: missing host"
        )));
    }

    if url.path().is_empty() || url.path() == "/" {
        url.set_path(DEFAULT_SDK_PATH);
    }

    Ok(url)
}

/// A parsed SDK URL with its userinfo split off.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    /// URL without username / password
    pub url: Url,
    /// Credentials that were embedded in the URL, if any
    pub user: Option<UserCredentials>,
}

impl ServiceEndpoint {
    pub fn parse(service: &str) -> SessionResult<Self> {
        let mut url = parse_service_url(service)?;

        let user = if url.username().is_empty() && url.password().is_none() {
            None
        } else {
            Some(UserCredentials {
                username: decode(url.username()),
                password: url.password().map(decode),
            })
        };

        url.set_password(None)
            .and_then(|_| url.set_username(""))
            .map_err(|_| {
                SessionError::invalid_endpoint(format!(
                    "SDK URL ({service}) could not be parsed: cannot strip credentials"
                ))
            })?;

        Ok(Self { url, user })
    }

    /// Username for extension login (empty when none was given).
    pub fn username(&self) -> &str {
        self.user.as_ref().map_or("", |u| u.username.as_str())
    }
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}
