//! Error types for APOGEE operations

use thiserror::Error;

use crate::PeriodKey;

/// Errors raised while talking to the NASA open-data APIs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Rate limited by {endpoint} after {attempts} attempts (last retry-after {retry_after_secs}s)")]
    RateLimited {
        endpoint: String,
        attempts: u32,
        retry_after_secs: u64,
    },

    #[error("Request to {endpoint} failed with status {status}: {body}")]
    RequestFailed {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Transport error calling {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

impl UpstreamError {
    /// Upstream rejected the API key (401/403).
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            UpstreamError::RequestFailed {
                status: 401 | 403,
                ..
            }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. })
    }
}

/// Validation errors, raised before any upstream or store access.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid date for {field}: '{value}' (expected YYYY-MM-DD)")]
    InvalidDate { field: String, value: String },

    #[error("Unknown rover: '{identity}'")]
    UnknownParent { identity: String },

    #[error("Invalid range for {field}: {reason}")]
    InvalidRange { field: String, reason: String },
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Failed to open store at {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Corrupt record under key {key}: {reason}")]
    Deserialization { key: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all APOGEE errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApogeeError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A single period could not be persisted during a sync; the sync itself
    /// continues with the remaining periods.
    #[error("Reconciliation of {parent} sol {period_key} failed: {reason}")]
    PartialReconciliation {
        parent: String,
        period_key: PeriodKey,
        reason: String,
    },
}

impl ApogeeError {
    /// Errors that must surface to the caller instead of degrading to an
    /// empty per-period result.
    pub fn is_fatal(&self) -> bool {
        match self {
            ApogeeError::Config(_) => true,
            ApogeeError::Upstream(e) => e.is_auth_failure(),
            _ => false,
        }
    }
}

/// Result type for APOGEE operations.
pub type ApogeeResult<T> = Result<T, ApogeeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_display_rate_limited() {
        let err = UpstreamError::RateLimited {
            endpoint: "/mars-photos/api/v1/manifests/curiosity".to_string(),
            attempts: 3,
            retry_after_secs: 60,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Rate limited"));
        assert!(msg.contains("curiosity"));
        assert!(msg.contains("3 attempts"));
    }

    #[test]
    fn test_validation_error_display_invalid_date() {
        let err = ValidationError::InvalidDate {
            field: "start_date".to_string(),
            value: "2024/01/01".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("start_date"));
        assert!(msg.contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_master_error_from_sub_errors() {
        let err: ApogeeError = ConfigError::MissingRequired {
            field: "NASA_API_KEY".to_string(),
        }
        .into();
        assert!(matches!(err, ApogeeError::Config(_)));
        assert!(format!("{}", err).contains("NASA_API_KEY"));
    }

    #[test]
    fn test_fatal_classification() {
        let config: ApogeeError = ConfigError::MissingRequired {
            field: "NASA_API_KEY".to_string(),
        }
        .into();
        assert!(config.is_fatal());

        let forbidden: ApogeeError = UpstreamError::RequestFailed {
            endpoint: "/planetary/apod".to_string(),
            status: 403,
            body: "API_KEY_INVALID".to_string(),
        }
        .into();
        assert!(forbidden.is_fatal());

        let server: ApogeeError = UpstreamError::RequestFailed {
            endpoint: "/planetary/apod".to_string(),
            status: 500,
            body: String::new(),
        }
        .into();
        assert!(!server.is_fatal());

        let limited: ApogeeError = UpstreamError::RateLimited {
            endpoint: "/neo/rest/v1/feed".to_string(),
            attempts: 3,
            retry_after_secs: 60,
        }
        .into();
        assert!(!limited.is_fatal());
    }
}
