// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::dto::CustomerDto;
use crate::error::{Result, SyncError};
use crate::model::{Customer, TenantId};
use crate::partner::{self, PartnerTransport, resources};
use crate::persistence::{CustomerWrite, Persistence};

use super::{cancellable, check_owner, require_local_id, stored_endpoint};

/// Customers of one store, local and partner-side.
#[derive(Clone)]
pub struct CustomerRepository {
    persistence: Arc<dyn Persistence>,
    partner: Arc<dyn PartnerTransport>,
    actor: String,
}

impl CustomerRepository {
    /// `actor` is recorded in the audit columns of every write.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        partner: Arc<dyn PartnerTransport>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            persistence,
            partner,
            actor: actor.into(),
        }
    }

    /// The store handle, for shutdown.
    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.persistence
    }

    /// Local snapshot of one customer. `None` when the id is unknown,
    /// deleted, or belongs to another tenant.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn get_by_id(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Customer>>> {
        let graph = cancellable(cancel, self.persistence.get_customer(tenant, id)).await?;
        graph.map(|g| g.into_entity()).transpose()
    }

    /// Like [`get_by_id`](Self::get_by_id) but absence is an error.
    pub async fn get_existing(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Arc<Customer>> {
        self.get_by_id(tenant, id, cancel)
            .await?
            .ok_or_else(|| SyncError::not_found("Customer", id))
    }

    /// Every live customer of the tenant, by id.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn list_for_tenant(
        &self,
        tenant: &TenantId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<Customer>>> {
        let graphs = cancellable(cancel, self.persistence.list_customers(tenant)).await?;
        let customers = graphs
            .into_iter()
            .map(|g| g.into_entity())
            .collect::<Result<Vec<_>>>()?;
        debug!(count = customers.len(), "Listed customers");
        Ok(customers)
    }

    /// Authoritative copy from the partner. `None` when the partner does not
    /// know `remote_id`.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn fetch_remote(
        &self,
        tenant: &TenantId,
        endpoint_id: i64,
        remote_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Customer>>> {
        cancellable(cancel, async {
            let endpoint = stored_endpoint(self.persistence.as_ref(), tenant, endpoint_id).await?;
            let dto: Option<CustomerDto> = partner::get_typed(
                self.partner.as_ref(),
                &endpoint,
                resources::CUSTOMERS,
                remote_id,
            )
            .await?;
            dto.map(|dto| Customer::from_dto(&dto, Some(endpoint)))
                .transpose()
        })
        .await
    }

    /// Store a new customer and return it as stored.
    #[instrument(skip(self, customer, cancel), fields(tenant_id = %tenant))]
    pub async fn create(
        &self,
        tenant: &TenantId,
        customer: Arc<Customer>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Customer>> {
        check_owner(customer.endpoint(), tenant, "Customer")?;
        if let Some(id) = customer.local_id() {
            return Err(SyncError::validation(
                "local_id",
                format!("customer {} is already stored", id),
            ));
        }
        let write = CustomerWrite::from_entity(&customer)?;

        let id = cancellable(
            cancel,
            self.persistence.insert_customer(tenant, &write, &self.actor),
        )
        .await?;
        info!(customer_id = id, "Customer created");
        self.reload(tenant, id).await
    }

    /// Replace the stored customer, address book included.
    #[instrument(skip(self, customer, cancel), fields(tenant_id = %tenant))]
    pub async fn update(
        &self,
        tenant: &TenantId,
        customer: Arc<Customer>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Customer>> {
        check_owner(customer.endpoint(), tenant, "Customer")?;
        let id = require_local_id(customer.local_id())?;
        let write = CustomerWrite::from_entity(&customer)?;

        let updated = cancellable(
            cancel,
            self.persistence.update_customer(tenant, id, &write, &self.actor),
        )
        .await?;
        if !updated {
            return Err(SyncError::not_found("Customer", id));
        }
        info!(customer_id = id, "Customer updated");
        self.reload(tenant, id).await
    }

    /// Soft-delete a customer.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn delete(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let deleted = cancellable(
            cancel,
            self.persistence.soft_delete_customer(tenant, id, &self.actor),
        )
        .await?;
        if !deleted {
            return Err(SyncError::not_found("Customer", id));
        }
        info!(customer_id = id, "Customer deleted");
        Ok(())
    }

    /// Send the customer to its partner endpoint (PUT when it has a remote
    /// id, POST otherwise) and return the partner's representation. The local
    /// store is not touched.
    #[instrument(skip(self, customer, cancel), fields(tenant_id = %tenant))]
    pub async fn push_remote(
        &self,
        tenant: &TenantId,
        customer: Arc<Customer>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Customer>> {
        check_owner(customer.endpoint(), tenant, "Customer")?;
        let endpoint_id = customer.endpoint().map(|e| e.id).ok_or_else(|| {
            SyncError::Invariant("owned customer without endpoint".to_string())
        })?;

        cancellable(cancel, async {
            let endpoint = stored_endpoint(self.persistence.as_ref(), tenant, endpoint_id).await?;
            let dto: CustomerDto = partner::upsert_typed(
                self.partner.as_ref(),
                &endpoint,
                resources::CUSTOMERS,
                customer.remote_id(),
                &customer.to_dto(),
            )
            .await?;
            info!(remote_id = ?dto.id, "Customer pushed to partner");
            Customer::from_dto(&dto, Some(endpoint))
        })
        .await
    }

    // Runs after the write committed, so it is not cancellable.
    async fn reload(&self, tenant: &TenantId, id: i64) -> Result<Arc<Customer>> {
        match self.persistence.get_customer(tenant, id).await? {
            Some(graph) => graph.into_entity(),
            None => Err(SyncError::Invariant(format!(
                "customer {} vanished after write",
                id
            ))),
        }
    }
}
