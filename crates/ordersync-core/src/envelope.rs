// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Uniform result container returned by every handler and service manager.
//!
//! UI and job callers depend only on this shape: a success flag, an optional
//! error and an optional payload. A successful outcome with no payload is how
//! "not found" is reported unless the caller asks for [`Outcome::must_exist`].

use std::fmt::Display;

use crate::error::SyncError;

/// Success/failure envelope around an optional payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    success: bool,
    error: Option<SyncError>,
    payload: Option<T>,
}

/// Outcome of a read.
pub type QueryResult<T> = Outcome<T>;

/// Outcome of a write. The payload, when present, is the persisted entity.
pub type CommandResult<T = ()> = Outcome<T>;

impl<T> Outcome<T> {
    /// Successful outcome carrying a payload.
    pub fn found(payload: T) -> Self {
        Self {
            success: true,
            error: None,
            payload: Some(payload),
        }
    }

    /// Successful outcome without a payload.
    pub fn absent() -> Self {
        Self {
            success: true,
            error: None,
            payload: None,
        }
    }

    /// Failed outcome.
    pub fn failed(error: SyncError) -> Self {
        Self {
            success: false,
            error: Some(error),
            payload: None,
        }
    }

    /// Wrap a repository result whose absence is not an error.
    pub fn from_optional(result: Result<Option<T>, SyncError>) -> Self {
        match result {
            Ok(Some(payload)) => Self::found(payload),
            Ok(None) => Self::absent(),
            Err(e) => Self::failed(e),
        }
    }

    /// Wrap a repository result that always yields a payload on success.
    pub fn from_result(result: Result<T, SyncError>) -> Self {
        match result {
            Ok(payload) => Self::found(payload),
            Err(e) => Self::failed(e),
        }
    }

    /// Whether the operation succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// The error of a failed outcome.
    pub fn error(&self) -> Option<&SyncError> {
        self.error.as_ref()
    }

    /// The payload, if any.
    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    /// Take the payload, discarding the envelope.
    pub fn into_payload(self) -> Option<T> {
        self.payload
    }

    /// Convert back into a `Result`, keeping absence as `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, SyncError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.payload),
        }
    }

    /// Promote an empty successful outcome to a not-found error naming the
    /// entity type and identifier.
    pub fn must_exist(self, entity: &'static str, id: impl Display) -> Result<T, SyncError> {
        match self.into_result()? {
            Some(payload) => Ok(payload),
            None => Err(SyncError::not_found(entity, id)),
        }
    }

    /// Transform the payload of a successful outcome.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            success: self.success,
            error: self.error,
            payload: self.payload.map(f),
        }
    }
}
