// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Business entities: capability traits and their canonical types.
//!
//! | Contract | Canonical | Related references |
//! |----------|-----------|--------------------|
//! | [`CustomerContract`] | [`Customer`] | default address, addresses |
//! | [`AddressContract`] | [`Address`] | owning customer (back edge), country |
//! | [`CountryContract`] | [`Country`] | - |
//! | [`TaxRateContract`] | [`TaxRate`] | country |
//! | [`OrderContract`] | [`Order`] | customer, shipping address |
//!
//! [`SalesChannel`], [`OrderLine`] and [`Endpoint`] have no identity of their
//! own and are canonical-only.
//!
//! Forward edges are strong `Arc`s. The address → customer edge is a `Weak`,
//! so an address never keeps its customer alive and graphs never form strong
//! reference cycles.

mod address;
mod country;
mod customer;
mod endpoint;
mod order;
mod sales_channel;
mod tax_rate;

pub use address::{Address, AddressContract, AddressData};
pub use country::{Country, CountryContract};
pub use customer::{Customer, CustomerContract, CustomerData, DefaultAddress};
pub use endpoint::{Endpoint, TenantId};
pub use order::{Order, OrderContract, OrderData, OrderLine, OrderStatus};
pub use sales_channel::SalesChannel;
pub use tax_rate::{MAX_RATE_BASIS_POINTS, TaxRate, TaxRateContract, TaxRateData};

use chrono::{DateTime, Utc};

/// Local and remote identity of an entity. The two keys are independent: a
/// row may exist locally before the partner has assigned a key, and a partner
/// object may be fetched before it is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EntityKey {
    /// Surrogate key assigned by the local store.
    pub local_id: Option<i64>,
    /// Key assigned by the partner system.
    pub remote_id: Option<String>,
}

impl EntityKey {
    /// Key of an entity known only locally.
    pub fn local(id: i64) -> Self {
        Self {
            local_id: Some(id),
            remote_id: None,
        }
    }

    /// Key of an entity known only to the partner.
    pub fn remote(id: impl Into<String>) -> Self {
        Self {
            local_id: None,
            remote_id: Some(id.into()),
        }
    }

    /// Whether the partner has assigned a key.
    pub fn is_synchronized(&self) -> bool {
        self.remote_id.is_some()
    }
}

/// Audit metadata. Written by repositories, never by callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditInfo {
    /// When the row was first stored.
    pub created_at: Option<DateTime<Utc>>,
    /// Who stored it.
    pub created_by: Option<String>,
    /// When the row was last written.
    pub modified_at: Option<DateTime<Utc>>,
    /// Who last wrote it.
    pub modified_by: Option<String>,
}
