//! Self-signed TLS identity and its pinnable fingerprint.

use axum_server::tls_rustls::RustlsConfig;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use sha2::{Digest, Sha256};

use crate::lifecycle::fatal::FatalError;

/// A freshly generated certificate and key, PEM encoded.
pub struct SelfSignedIdentity {
    cert_pem: String,
    key_pem: String,
    fingerprint: String,
}

impl SelfSignedIdentity {
    /// Generate a certificate valid for `names`.
    pub fn generate(names: &[String]) -> Result<Self, FatalError> {
        let certified = rcgen::generate_simple_self_signed(names.to_vec())
            .map_err(|e| FatalError::Tls(format!("certificate generation failed: {}", e)))?;

        Ok(Self {
            cert_pem: certified.cert.pem(),
            key_pem: certified.key_pair.serialize_pem(),
            fingerprint: public_key_fingerprint(&certified.key_pair.public_key_der()),
        })
    }

    /// Base64 SHA-256 of the public key, as used by `curl --pinnedpubkey sha256//…`.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Build the rustls server config for this identity.
    pub async fn rustls_config(&self) -> Result<RustlsConfig, FatalError> {
        RustlsConfig::from_pem(
            self.cert_pem.as_bytes().to_vec(),
            self.key_pem.as_bytes().to_vec(),
        )
        .await
        .map_err(|e| FatalError::Tls(e.to_string()))
    }
}

/// Fingerprint a DER-encoded SubjectPublicKeyInfo.
pub fn public_key_fingerprint(spki_der: &[u8]) -> String {
    BASE64_STANDARD.encode(Sha256::digest(spki_der))
}
