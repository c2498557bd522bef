// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tenants and partner endpoints.

use std::fmt;

use crate::error::{Result, SyncError};

/// Tenant identifier. Never empty or blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a tenant identifier. Surrounding whitespace is
    /// stripped.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(SyncError::validation("tenant_id", "must not be empty"));
        }
        Ok(Self(value.to_string()))
    }

    /// The identifier as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A partner server configuration. Entities reach their tenant through the
/// endpoint they were synchronized with.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Store key.
    pub id: i64,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name.
    pub name: String,
    /// Partner REST base URL, without trailing slash.
    pub base_url: String,
    /// Bearer token sent with every partner request.
    pub api_token: Option<String>,
}

impl Endpoint {
    /// Whether this endpoint belongs to `tenant`.
    pub fn is_owned_by(&self, tenant: &TenantId) -> bool {
        &self.tenant_id == tenant
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
