//! Startup artifacts.
//!
//! # Responsibilities
//! - Read the one-shot client password file, then delete it
//! - Publish the TLS fingerprint for clients to pin
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The password file never outlives startup

use std::fs;
use std::path::Path;

use crate::lifecycle::fatal::FatalError;

/// Read the client password from `path` and remove the file.
///
/// Trailing newlines are stripped; any other whitespace is part of the
/// password.
pub fn take_credential(path: &Path) -> Result<String, FatalError> {
    let raw = fs::read_to_string(path).map_err(|source| FatalError::CredentialRead {
        path: path.to_path_buf(),
        source,
    })?;
    let password = raw.trim_end_matches('\n').to_string();

    fs::remove_file(path).map_err(|source| FatalError::CredentialRemove {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "Read and removed password file");
    Ok(password)
}

/// Write the fingerprint to `path`, newline-terminated.
pub fn publish_fingerprint(path: &Path, fingerprint: &str) -> Result<(), FatalError> {
    fs::write(path, format!("{}\n", fingerprint)).map_err(|source| FatalError::Fingerprint {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(fingerprint = %fingerprint, path = %path.display(), "Wrote fingerprint");
    Ok(())
}
