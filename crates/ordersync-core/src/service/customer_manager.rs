// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cqrs::customer::{
    DeleteCustomerHandler, FetchPartnerCustomerHandler, GetCustomerByIdHandler,
    ListCustomersForTenantHandler, PushCustomerToPartnerHandler, SaveCustomerHandler,
};
use crate::cqrs::{
    CommandHandler, DeleteCustomer, FetchPartnerCustomer, GetCustomerById,
    ListCustomersForTenant, PushCustomerToPartner, QueryHandler, SaveCustomer,
};
use crate::envelope::{CommandResult, QueryResult};
use crate::model::{Customer, CustomerContract, TenantId};
use crate::repository::CustomerRepository;

/// Customer aggregate operations.
///
/// Owns its repository; [`shutdown`](Self::shutdown) closes the store behind
/// it, which every other manager sharing that store will observe.
pub struct CustomerManager {
    repository: CustomerRepository,
}

impl CustomerManager {
    /// Create a new customer manager.
    pub fn new(repository: CustomerRepository) -> Self {
        Self { repository }
    }

    /// Stored customer, or an empty success.
    pub async fn get_customer(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> QueryResult<Arc<Customer>> {
        GetCustomerByIdHandler::new(self.repository.clone())
            .handle(GetCustomerById::new(tenant.clone(), id), cancel)
            .await
    }

    /// Stored customer, or a not-found failure.
    pub async fn require_customer(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> QueryResult<Arc<Customer>> {
        GetCustomerByIdHandler::new(self.repository.clone())
            .handle(GetCustomerById::new(tenant.clone(), id).must_exist(), cancel)
            .await
    }

    /// All stored customers of the tenant.
    pub async fn list_customers(
        &self,
        tenant: &TenantId,
        cancel: &CancellationToken,
    ) -> QueryResult<Vec<Arc<Customer>>> {
        ListCustomersForTenantHandler::new(self.repository.clone())
            .handle(ListCustomersForTenant::new(tenant.clone()), cancel)
            .await
    }

    /// The partner's current copy of a customer.
    pub async fn fetch_from_partner(
        &self,
        tenant: &TenantId,
        endpoint_id: i64,
        remote_id: &str,
        cancel: &CancellationToken,
    ) -> QueryResult<Arc<Customer>> {
        FetchPartnerCustomerHandler::new(self.repository.clone())
            .handle(
                FetchPartnerCustomer::new(tenant.clone(), endpoint_id, remote_id),
                cancel,
            )
            .await
    }

    /// Insert or replace a customer from any [`CustomerContract`] source.
    pub async fn save_customer(
        &self,
        tenant: &TenantId,
        customer: Arc<dyn CustomerContract>,
        cancel: &CancellationToken,
    ) -> CommandResult<Arc<Customer>> {
        SaveCustomerHandler::new(self.repository.clone())
            .handle(SaveCustomer::new(tenant.clone(), Some(customer)), cancel)
            .await
    }

    /// Soft-delete a stored customer.
    pub async fn delete_customer(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> CommandResult {
        DeleteCustomerHandler::new(self.repository.clone())
            .handle(DeleteCustomer::new(tenant.clone(), id), cancel)
            .await
    }

    /// Send a customer to its partner endpoint.
    pub async fn push_to_partner(
        &self,
        tenant: &TenantId,
        customer: Arc<dyn CustomerContract>,
        cancel: &CancellationToken,
    ) -> CommandResult<Arc<Customer>> {
        PushCustomerToPartnerHandler::new(self.repository.clone())
            .handle(PushCustomerToPartner::new(tenant.clone(), Some(customer)), cancel)
            .await
    }

    /// Close the underlying store.
    pub async fn shutdown(&self) {
        info!("Shutting down customer manager");
        self.repository.persistence().close().await;
    }
}
