//! Error types for the vSphere session crate.

use std::fmt;

use crate::types::ResourceKind;

/// Categorised error kinds.
#[derive(Debug, Clone)]
pub enum SessionErrorKind {
    /// SDK URL could not be parsed
    InvalidEndpoint,
    /// Certificate login requested against a target that cannot do it
    UnsupportedAuth,
    /// X509 key pair could not be loaded
    CertLoad,
    /// Endpoint unreachable or the transport failed
    ConnectionFailed,
    /// Login failed (password or certificate)
    AuthFailed,
    /// Operation needs a connected session
    NotConnected,
    /// SOAP fault returned by the endpoint (fault type name)
    SoapFault(String),
    /// XML / response decoding error
    ParseError,
    /// Timeout
    Timeout,
    /// One or more inventory lookups failed
    Resolution(ResolutionErrors),
}

/// Crate error type carrying a kind + human-readable message.
#[derive(Debug, Clone)]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: SessionErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn invalid_endpoint(msg: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::InvalidEndpoint, msg)
    }

    pub fn unsupported_auth(msg: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::UnsupportedAuth, msg)
    }

    pub fn cert_load(msg: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::CertLoad, msg)
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::ConnectionFailed, msg)
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::AuthFailed, msg)
    }

    pub fn not_connected() -> Self {
        Self::new(
            SessionErrorKind::NotConnected,
            "Session is not connected. Call connect or create first.",
        )
    }

    pub fn fault(fault: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::SoapFault(fault.into()), msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::ParseError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Timeout, msg)
    }

    /// Wrap accumulated lookup failures. The message is every individual
    /// message joined with newlines.
    pub fn resolution(errors: ResolutionErrors) -> Self {
        let message = errors.to_string();
        Self::new(SessionErrorKind::Resolution(errors), message)
    }

    /// Name of the SOAP fault, if this error came from one.
    pub fn fault_name(&self) -> Option<&str> {
        match self.kind {
            SessionErrorKind::SoapFault(ref name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Individual lookup failures, if this is a resolution error.
    pub fn resolution_errors(&self) -> Option<&ResolutionErrors> {
        match self.kind {
            SessionErrorKind::Resolution(ref errs) => Some(errs),
            _ => None,
        }
    }

    pub fn is_invalid_endpoint(&self) -> bool {
        matches!(self.kind, SessionErrorKind::InvalidEndpoint)
    }

    pub fn is_unsupported_auth(&self) -> bool {
        matches!(self.kind, SessionErrorKind::UnsupportedAuth)
    }

    pub fn is_cert_load(&self) -> bool {
        matches!(self.kind, SessionErrorKind::CertLoad)
    }

    pub fn is_auth_failed(&self) -> bool {
        matches!(self.kind, SessionErrorKind::AuthFailed)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Resolution messages are already one line per failure
        match self.kind {
            SessionErrorKind::Resolution(_) => f.write_str(&self.message),
            _ => write!(f, "[{:?}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SessionError> for String {
    fn from(e: SessionError) -> String {
        e.to_string()
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(format!("HTTP timeout: {e}"))
        } else {
            Self::connection(format!("HTTP error: {e}"))
        }
    }
}

impl From<quick_xml::Error> for SessionError {
    fn from(e: quick_xml::Error) -> Self {
        Self::parse(format!("XML parse error: {e}"))
    }
}

/// Convenience alias.
pub type SessionResult<T> = Result<T, SessionError>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Inventory lookup errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Why a single inventory lookup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveErrorKind {
    /// An explicit path or name matched nothing
    NotFound,
    /// An explicit name matched more than one object
    MultipleFound,
    /// No path given and no object of the kind exists
    DefaultNotFound,
    /// No path given and more than one object of the kind exists
    DefaultMultipleFound,
    /// The endpoint call itself failed
    Api,
}

/// One failed lookup, kept structured until it is shown to a human.
#[derive(Debug, Clone)]
pub struct ResolveError {
    pub resource: ResourceKind,
    pub kind: ResolveErrorKind,
    pub message: String,
}

impl ResolveError {
    pub fn new(resource: ResourceKind, kind: ResolveErrorKind, msg: impl Into<String>) -> Self {
        Self { resource, kind, message: msg.into() }
    }

    pub fn not_found(resource: ResourceKind, path: &str) -> Self {
        Self::new(
            resource,
            ResolveErrorKind::NotFound,
            format!("{} '{}' not found", resource.label(), path),
        )
    }

    pub fn multiple_found(resource: ResourceKind, path: &str) -> Self {
        Self::new(
            resource,
            ResolveErrorKind::MultipleFound,
            format!("path '{}' resolves to multiple {}s", path, resource.label()),
        )
    }

    pub fn default_not_found(resource: ResourceKind) -> Self {
        Self::new(
            resource,
            ResolveErrorKind::DefaultNotFound,
            format!("no default {} found", resource.label()),
        )
    }

    pub fn default_multiple_found(resource: ResourceKind) -> Self {
        Self::new(
            resource,
            ResolveErrorKind::DefaultMultipleFound,
            format!(
                "default {} resolves to multiple instances, please specify",
                resource.label()
            ),
        )
    }

    pub fn api(resource: ResourceKind, err: &SessionError) -> Self {
        Self::new(
            resource,
            ResolveErrorKind::Api,
            format!("{} lookup failed: {}", resource.label(), err.message),
        )
    }

    pub fn is_default_multiple_found(&self) -> bool {
        self.kind == ResolveErrorKind::DefaultMultipleFound
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ResolveError {}

/// Accumulated lookup failures from one populate pass.
#[derive(Debug, Clone, Default)]
pub struct ResolutionErrors(Vec<ResolveError>);

impl ResolutionErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: ResolveError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolveError> {
        self.0.iter()
    }

    /// The failure for a given resource, if there was one.
    pub fn for_resource(&self, resource: ResourceKind) -> Option<&ResolveError> {
        self.0.iter().find(|e| e.resource == resource)
    }
}

impl fmt::Display for ResolutionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&lines.join("\n"))
    }
}

impl<'a> IntoIterator for &'a ResolutionErrors {
    type Item = &'a ResolveError;
    type IntoIter = std::slice::Iter<'a, ResolveError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
