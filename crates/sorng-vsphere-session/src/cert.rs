//! Client certificate loading for extension login.

use std::fmt;
use std::path::Path;

use crate::error::{SessionError, SessionResult};

/// A PEM certificate + private key pair, validated on load.
#[derive(Clone)]
pub struct ClientCertificate {
    pem: Vec<u8>,
}

impl ClientCertificate {
    /// Read and validate an X509 key pair.
    pub async fn load(cert_file: impl AsRef<Path>, key_file: impl AsRef<Path>) -> SessionResult<Self> {
        let cert_file = cert_file.as_ref();
        let key_file = key_file.as_ref();
        let fail = |e: String| {
            SessionError::cert_load(format!(
                "Unable to load X509 key pair({},{}): {e}",
                cert_file.display(),
                key_file.display()
            ))
        };

        let cert = tokio::fs::read(cert_file).await.map_err(|e| fail(e.to_string()))?;
        let key = tokio::fs::read(key_file).await.map_err(|e| fail(e.to_string()))?;

        Self::from_pem(&cert, &key).map_err(|e| fail(e.message))
    }

    /// Build from in-memory PEM blocks.
    pub fn from_pem(cert: &[u8], key: &[u8]) -> SessionResult<Self> {
        let mut pem = Vec::with_capacity(cert.len() + key.len() + 1);
        pem.extend_from_slice(cert);
        if !cert.ends_with(b"\n") {
            pem.push(b'\n');
        }
        pem.extend_from_slice(key);

        let cert_ok = contains(cert, b"-----BEGIN CERTIFICATE-----");
        let key_ok = contains(key, b"PRIVATE KEY-----");
        if !cert_ok || !key_ok {
            return Err(SessionError::cert_load(
                "expected a PEM certificate and a PEM private key",
            ));
        }

        // Parse once so a broken pair fails here rather than at connect
        reqwest::Identity::from_pem(&pem)
            .map_err(|e| SessionError::cert_load(format!("invalid key pair: {e}")))?;

        Ok(Self { pem })
    }

    /// TLS client identity for the HTTP client.
    pub fn identity(&self) -> SessionResult<reqwest::Identity> {
        reqwest::Identity::from_pem(&self.pem)
            .map_err(|e| SessionError::cert_load(format!("invalid key pair: {e}")))
    }
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("pem_len", &self.pem.len())
            .finish()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
