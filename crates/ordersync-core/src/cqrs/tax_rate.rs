// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tax rate queries and commands.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::envelope::{CommandResult, Outcome, QueryResult};
use crate::error::{Result, SyncError};
use crate::model::{MAX_RATE_BASIS_POINTS, TaxRate, TaxRateContract, TenantId};
use crate::repository::TaxRateRepository;

use super::{
    Command, CommandHandler, Query, QueryHandler, admit_command, admit_query, canonical,
    non_blank, positive_id, present,
};

/// Stored tax rates of a tenant.
#[derive(Debug, Clone)]
pub struct ListTaxRatesForTenant {
    tenant: TenantId,
}

impl ListTaxRatesForTenant {
    /// List for `tenant`.
    pub fn new(tenant: TenantId) -> Self {
        Self { tenant }
    }

    /// Caller's tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }
}

impl Query for ListTaxRatesForTenant {
    const NAME: &'static str = "ListTaxRatesForTenant";
    type Output = Vec<Arc<TaxRate>>;

    fn parameters(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("tenant_id", json!(self.tenant.as_str()))])
    }
}

/// Store a tax rate: insert when it has no local id, replace otherwise.
#[derive(Clone)]
pub struct SaveTaxRate {
    tenant: TenantId,
    rate: Option<Arc<dyn TaxRateContract>>,
}

impl SaveTaxRate {
    /// Store `rate` for `tenant`. `None` fails validation.
    pub fn new(tenant: TenantId, rate: Option<Arc<dyn TaxRateContract>>) -> Self {
        Self { tenant, rate }
    }

    /// Caller's tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// The rate to store.
    pub fn rate(&self) -> Option<&Arc<dyn TaxRateContract>> {
        self.rate.as_ref()
    }
}

impl Command for SaveTaxRate {
    const NAME: &'static str = "SaveTaxRate";
    type Output = Arc<TaxRate>;

    fn parameters(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("tenant_id", json!(self.tenant.as_str())),
            ("code", json!(self.rate.as_ref().map(|r| r.code().to_string()))),
        ])
    }

    fn validate(&self) -> Result<()> {
        present("rate", self.rate.as_ref())?;
        if let Some(rate) = &self.rate {
            non_blank("code", rate.code())?;
            if rate.rate_basis_points() > MAX_RATE_BASIS_POINTS {
                return Err(SyncError::validation("rate", "must not exceed 100%"));
            }
        }
        Ok(())
    }
}

/// Soft-delete a stored tax rate.
#[derive(Debug, Clone)]
pub struct DeleteTaxRate {
    tenant: TenantId,
    id: i64,
}

impl DeleteTaxRate {
    /// Delete rate `id` of `tenant`.
    pub fn new(tenant: TenantId, id: i64) -> Self {
        Self { tenant, id }
    }

    /// Caller's tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Local id.
    pub fn id(&self) -> i64 {
        self.id
    }
}

impl Command for DeleteTaxRate {
    const NAME: &'static str = "DeleteTaxRate";
    type Output = ();

    fn parameters(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("tenant_id", json!(self.tenant.as_str())),
            ("id", json!(self.id)),
        ])
    }

    fn validate(&self) -> Result<()> {
        positive_id("id", self.id)
    }
}

/// Handles [`ListTaxRatesForTenant`].
pub struct ListTaxRatesForTenantHandler {
    repository: TaxRateRepository,
}

impl ListTaxRatesForTenantHandler {
    pub(crate) fn new(repository: TaxRateRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl QueryHandler<ListTaxRatesForTenant> for ListTaxRatesForTenantHandler {
    async fn handle(
        &self,
        query: ListTaxRatesForTenant,
        cancel: &CancellationToken,
    ) -> QueryResult<Vec<Arc<TaxRate>>> {
        if let Err(rejected) = admit_query(&query) {
            return rejected;
        }
        Outcome::from_result(self.repository.list_for_tenant(&query.tenant, cancel).await)
    }
}

/// Handles [`SaveTaxRate`].
pub struct SaveTaxRateHandler {
    repository: TaxRateRepository,
}

impl SaveTaxRateHandler {
    pub(crate) fn new(repository: TaxRateRepository) -> Self {
        Self { repository }
    }

    async fn save(&self, command: &SaveTaxRate, cancel: &CancellationToken) -> Result<Arc<TaxRate>> {
        let rate = canonical::<TaxRate>("rate", command.rate.as_ref())?;
        if rate.local_id().is_some() {
            self.repository.update(&command.tenant, rate, cancel).await
        } else {
            self.repository.create(&command.tenant, rate, cancel).await
        }
    }
}

#[async_trait]
impl CommandHandler<SaveTaxRate> for SaveTaxRateHandler {
    async fn handle(
        &self,
        command: SaveTaxRate,
        cancel: &CancellationToken,
    ) -> CommandResult<Arc<TaxRate>> {
        if let Err(rejected) = admit_command(&command) {
            return rejected;
        }
        Outcome::from_result(self.save(&command, cancel).await)
    }
}

/// Handles [`DeleteTaxRate`].
pub struct DeleteTaxRateHandler {
    repository: TaxRateRepository,
}

impl DeleteTaxRateHandler {
    pub(crate) fn new(repository: TaxRateRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CommandHandler<DeleteTaxRate> for DeleteTaxRateHandler {
    async fn handle(&self, command: DeleteTaxRate, cancel: &CancellationToken) -> CommandResult {
        if let Err(rejected) = admit_command(&command) {
            return rejected;
        }
        Outcome::from_result(self.repository.delete(&command.tenant, command.id, cancel).await)
    }
}
