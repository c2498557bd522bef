// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cqrs::tax_rate::{
    DeleteTaxRateHandler, ListTaxRatesForTenantHandler, SaveTaxRateHandler,
};
use crate::cqrs::{CommandHandler, DeleteTaxRate, ListTaxRatesForTenant, QueryHandler, SaveTaxRate};
use crate::envelope::{CommandResult, QueryResult};
use crate::model::{TaxRate, TaxRateContract, TenantId};
use crate::repository::TaxRateRepository;

/// Tax rate operations.
pub struct TaxRateManager {
    repository: TaxRateRepository,
}

impl TaxRateManager {
    /// Create a new tax rate manager.
    pub fn new(repository: TaxRateRepository) -> Self {
        Self { repository }
    }

    /// Stored rates of the tenant.
    pub async fn list_tax_rates(
        &self,
        tenant: &TenantId,
        cancel: &CancellationToken,
    ) -> QueryResult<Vec<Arc<TaxRate>>> {
        ListTaxRatesForTenantHandler::new(self.repository.clone())
            .handle(ListTaxRatesForTenant::new(tenant.clone()), cancel)
            .await
    }

    /// Insert or replace a rate from any [`TaxRateContract`] source.
    pub async fn save_tax_rate(
        &self,
        tenant: &TenantId,
        rate: Arc<dyn TaxRateContract>,
        cancel: &CancellationToken,
    ) -> CommandResult<Arc<TaxRate>> {
        SaveTaxRateHandler::new(self.repository.clone())
            .handle(SaveTaxRate::new(tenant.clone(), Some(rate)), cancel)
            .await
    }

    /// Soft-delete a stored rate.
    pub async fn delete_tax_rate(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> CommandResult {
        DeleteTaxRateHandler::new(self.repository.clone())
            .handle(DeleteTaxRate::new(tenant.clone(), id), cancel)
            .await
    }

    /// Close the underlying store.
    pub async fn shutdown(&self) {
        info!("Shutting down tax rate manager");
        self.repository.persistence().close().await;
    }
}
