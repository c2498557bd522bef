// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for ordersync-core.
//!
//! A single taxonomy shared by normalization, repositories and handlers.
//! Every variant carries a stable error code so callers (UI, jobs) can branch
//! on it without matching display strings.

use thiserror::Error;

/// Result type using SyncError.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by the sync layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SyncError {
    /// A query, command or write target failed validation before any I/O.
    #[error("Validation error for '{field}': {message}")]
    Validation {
        /// The offending field or argument.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A required argument was absent where the contract forbids it.
    #[error("Invalid argument '{argument}': {message}")]
    InvalidArgument {
        /// Argument name.
        argument: &'static str,
        /// Reason.
        message: String,
    },

    /// A must-exist lookup found nothing.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Entity type name.
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The partner system rejected the request. `detail` is the partner's
    /// response body, unmodified.
    #[error("Partner returned {status}: {detail}")]
    Partner {
        /// HTTP status code.
        status: u16,
        /// Partner error body.
        detail: String,
    },

    /// An operation would cross or ignore a tenant boundary. Never retried.
    #[error("Tenant isolation violation for {entity}: {reason}")]
    TenantIsolation {
        /// Entity type name.
        entity: &'static str,
        /// Why the operation was refused.
        reason: String,
    },

    /// Internal invariant violated (e.g. an inconsistent identity map during
    /// normalization). Indicates a defect.
    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    /// Store operation failed.
    #[error("Database error during '{operation}': {details}")]
    Database {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// The partner could not be reached or answered with something unreadable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The caller cancelled the operation; nothing was committed.
    #[error("Operation cancelled")]
    Cancelled,

    /// A blocking adapter was invoked from inside an async runtime.
    #[error("Blocking call '{0}' made from within an async context")]
    BlockingInAsync(&'static str),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Shorthand for a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a not-found error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::NotFound { .. } => "OBJECT_NOT_FOUND",
            Self::Partner { .. } => "PARTNER_ERROR",
            Self::TenantIsolation { .. } => "TENANT_ISOLATION",
            Self::Invariant(_) => "INTERNAL_INVARIANT",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::BlockingInAsync(_) => "BLOCKING_IN_ASYNC",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether a caller may reasonably retry. This layer never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Partner { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for SyncError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        SyncError::Database {
            operation: "migrate".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Database {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}

impl From<crate::config::ConfigError> for SyncError {
    fn from(err: crate::config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}
