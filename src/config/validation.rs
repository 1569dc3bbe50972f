//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, queue capacity > 0)
//! - Check that listen addresses have a host:port shape; resolving names is
//!   left to bind
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::BridgeConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_address(&mut errors, "control.bind_address", &config.control.bind_address);

    if config.listener.tls {
        if config.listener.fingerprint_file.trim().is_empty() {
            errors.push(ValidationError::new("listener.fingerprint_file", "must not be empty"));
        }
        if config.listener.tls_names.is_empty() {
            errors.push(ValidationError::new("listener.tls_names", "at least one name is required"));
        }
    }

    if config.control.accept_wait_secs == 0 {
        errors.push(ValidationError::new("control.accept_wait_secs", "must be greater than zero"));
    }
    if config.control.write_timeout_ms == 0 {
        errors.push(ValidationError::new("control.write_timeout_ms", "must be greater than zero"));
    }
    if config.control.queue_capacity == 0 {
        errors.push(ValidationError::new("control.queue_capacity", "must be greater than zero"));
    }
    if config.control.max_line_bytes == 0 {
        errors.push(ValidationError::new("control.max_line_bytes", "must be greater than zero"));
    }
    if config.control.drain_timeout_ms == Some(0) {
        errors.push(ValidationError::new(
            "control.drain_timeout_ms",
            "must be greater than zero when set",
        ));
    }

    if config.auth.password_file.trim().is_empty() {
        errors.push(ValidationError::new("auth.password_file", "must not be empty"));
    }

    if config.observability.metrics_enabled {
        // The exporter takes a socket address, not a host name.
        if let Err(e) = config.observability.metrics_address.parse::<SocketAddr>() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("invalid address {:?}: {}", config.observability.metrics_address, e),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    let well_formed = match value.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    };
    if !well_formed {
        errors.push(ValidationError::new(
            field,
            format!("invalid address {:?}: expected host:port", value),
        ));
    }
}
