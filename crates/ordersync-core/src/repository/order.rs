// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::dto::OrderDto;
use crate::error::{Result, SyncError};
use crate::model::{Order, TenantId};
use crate::partner::{self, PartnerTransport, resources};
use crate::persistence::{OrderWrite, Persistence};

use super::{cancellable, check_owner, require_local_id, stored_endpoint};

/// Orders of one store, local and partner-side.
#[derive(Clone)]
pub struct OrderRepository {
    persistence: Arc<dyn Persistence>,
    partner: Arc<dyn PartnerTransport>,
    actor: String,
}

impl OrderRepository {
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

    /// Local snapshot of one order with its customer and lines.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn get_by_id(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Order>>> {
        let graph = cancellable(cancel, self.persistence.get_order(tenant, id)).await?;
        graph.map(|g| g.into_entity()).transpose()
    }

    /// Like [`get_by_id`](Self::get_by_id) but absence is an error.
    pub async fn get_existing(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Arc<Order>> {
        self.get_by_id(tenant, id, cancel)
            .await?
            .ok_or_else(|| SyncError::not_found("Order", id))
    }

    /// Stored orders placed in `[from, to)`, oldest first.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn list_in_range(
        &self,
        tenant: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<Order>>> {
        let graphs = cancellable(
            cancel,
            self.persistence.list_orders_in_range(tenant, from, to),
        )
        .await?;
        let orders = graphs
            .into_iter()
            .map(|g| g.into_entity())
            .collect::<Result<Vec<_>>>()?;
        debug!(count = orders.len(), "Listed orders in range");
        Ok(orders)
    }

    /// Authoritative copy of one order from the partner.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn fetch_remote(
        &self,
        tenant: &TenantId,
        endpoint_id: i64,
        remote_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Order>>> {
        cancellable(cancel, async {
            let endpoint = stored_endpoint(self.persistence.as_ref(), tenant, endpoint_id).await?;
            let dto: Option<OrderDto> =
                partner::get_typed(self.partner.as_ref(), &endpoint, resources::ORDERS, remote_id)
                    .await?;
            dto.map(|dto| Order::from_dto(&dto, Some(endpoint)))
                .transpose()
        })
        .await
    }

    /// Orders the partner reports as placed in `[from, to)`.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn fetch_remote_in_range(
        &self,
        tenant: &TenantId,
        endpoint_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<Order>>> {
        cancellable(cancel, async {
            let endpoint = stored_endpoint(self.persistence.as_ref(), tenant, endpoint_id).await?;
            let query = [
                ("created_from", from.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("created_to", to.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ];
            let dtos: Vec<OrderDto> =
                partner::list_typed(self.partner.as_ref(), &endpoint, resources::ORDERS, &query)
                    .await?;
            debug!(count = dtos.len(), "Fetched partner orders");
            dtos.iter()
                .map(|dto| Order::from_dto(dto, Some(endpoint.clone())))
                .collect()
        })
        .await
    }

    /// Store a new order. Its customer, if any, must already be stored.
    #[instrument(skip(self, order, cancel), fields(tenant_id = %tenant))]
    pub async fn create(
        &self,
        tenant: &TenantId,
        order: Arc<Order>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Order>> {
        self.check_write(tenant, &order)?;
        if let Some(id) = order.local_id() {
            return Err(SyncError::validation(
                "local_id",
                format!("order {} is already stored", id),
            ));
        }
        let write = OrderWrite::from_entity(&order)?;

        let id = cancellable(
            cancel,
            self.persistence.insert_order(tenant, &write, &self.actor),
        )
        .await?;
        info!(order_id = id, order_number = %write.order_number, "Order created");
        self.reload(tenant, id).await
    }

    /// Replace the stored order, lines included.
    #[instrument(skip(self, order, cancel), fields(tenant_id = %tenant))]
    pub async fn update(
        &self,
        tenant: &TenantId,
        order: Arc<Order>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Order>> {
        self.check_write(tenant, &order)?;
        let id = require_local_id(order.local_id())?;
        let write = OrderWrite::from_entity(&order)?;

        let updated = cancellable(
            cancel,
            self.persistence.update_order(tenant, id, &write, &self.actor),
        )
        .await?;
        if !updated {
            return Err(SyncError::not_found("Order", id));
        }
        info!(order_id = id, "Order updated");
        self.reload(tenant, id).await
    }

    /// Soft-delete an order.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn delete(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let deleted = cancellable(
            cancel,
            self.persistence.soft_delete_order(tenant, id, &self.actor),
        )
        .await?;
        if !deleted {
            return Err(SyncError::not_found("Order", id));
        }
        info!(order_id = id, "Order deleted");
        Ok(())
    }

    /// Send an order to its partner endpoint and return the partner's copy.
    /// Nothing is written locally.
    #[instrument(skip(self, order, cancel), fields(tenant_id = %tenant))]
    pub async fn push_remote(
        &self,
        tenant: &TenantId,
        order: Arc<Order>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Order>> {
        self.check_write(tenant, &order)?;
        let endpoint_id = order
            .endpoint()
            .map(|e| e.id)
            .ok_or_else(|| SyncError::Invariant("owned order without endpoint".to_string()))?;

        cancellable(cancel, async {
            let endpoint = stored_endpoint(self.persistence.as_ref(), tenant, endpoint_id).await?;
            let dto: OrderDto = partner::upsert_typed(
                self.partner.as_ref(),
                &endpoint,
                resources::ORDERS,
                order.remote_id(),
                &order.to_dto(),
            )
            .await?;
            info!(remote_id = ?dto.id, "Order pushed to partner");
            Order::from_dto(&dto, Some(endpoint))
        })
        .await
    }

    fn check_write(&self, tenant: &TenantId, order: &Order) -> Result<()> {
        check_owner(order.endpoint(), tenant, "Order")?;
        if let Some(customer) = order.customer() {
            check_owner(customer.endpoint(), tenant, "Customer")?;
        }
        Ok(())
    }

    async fn reload(&self, tenant: &TenantId, id: i64) -> Result<Arc<Order>> {
        match self.persistence.get_order(tenant, id).await? {
            Some(graph) => graph.into_entity(),
            None => Err(SyncError::Invariant(format!(
                "order {} vanished after write",
                id
            ))),
        }
    }
}
