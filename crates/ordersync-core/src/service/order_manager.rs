// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cqrs::order::{
    DeleteOrderHandler, FetchPartnerOrderHandler, GetOrderByIdHandler,
    GetOrdersInDateRangeHandler, PushOrderToPartnerHandler, SaveOrderHandler,
};
use crate::cqrs::{
    CommandHandler, DeleteOrder, FetchPartnerOrder, GetOrderById, GetOrdersInDateRange,
    PushOrderToPartner, QueryHandler, SaveOrder,
};
use crate::envelope::{CommandResult, QueryResult};
use crate::model::{Order, OrderContract, TenantId};
use crate::repository::OrderRepository;

/// Order aggregate operations.
pub struct OrderManager {
    repository: OrderRepository,
}

impl OrderManager {
    /// Create a new order manager.
    pub fn new(repository: OrderRepository) -> Self {
        Self { repository }
    }

    /// Stored order, or an empty success.
    pub async fn get_order(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> QueryResult<Arc<Order>> {
        GetOrderByIdHandler::new(self.repository.clone())
            .handle(GetOrderById::new(tenant.clone(), id), cancel)
            .await
    }

    /// Stored orders placed in `[from, to)`, oldest first.
    pub async fn get_orders_in_date_range(
        &self,
        tenant: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> QueryResult<Vec<Arc<Order>>> {
        GetOrdersInDateRangeHandler::new(self.repository.clone())
            .handle(GetOrdersInDateRange::new(tenant.clone(), from, to), cancel)
            .await
    }

    /// The partner's current copy of an order.
    pub async fn fetch_from_partner(
        &self,
        tenant: &TenantId,
        endpoint_id: i64,
        remote_id: &str,
        cancel: &CancellationToken,
    ) -> QueryResult<Arc<Order>> {
        FetchPartnerOrderHandler::new(self.repository.clone())
            .handle(
                FetchPartnerOrder::new(tenant.clone(), endpoint_id, remote_id),
                cancel,
            )
            .await
    }

    /// Insert or replace an order. Its customer must already be stored.
    pub async fn save_order(
        &self,
        tenant: &TenantId,
        order: Arc<dyn OrderContract>,
        cancel: &CancellationToken,
    ) -> CommandResult<Arc<Order>> {
        SaveOrderHandler::new(self.repository.clone())
            .handle(SaveOrder::new(tenant.clone(), Some(order)), cancel)
            .await
    }

    /// Soft-delete a stored order.
    pub async fn delete_order(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> CommandResult {
        DeleteOrderHandler::new(self.repository.clone())
            .handle(DeleteOrder::new(tenant.clone(), id), cancel)
            .await
    }

    /// Send an order to its partner endpoint. Nothing is stored locally.
    pub async fn push_to_partner(
        &self,
        tenant: &TenantId,
        order: Arc<dyn OrderContract>,
        cancel: &CancellationToken,
    ) -> CommandResult<Arc<Order>> {
        PushOrderToPartnerHandler::new(self.repository.clone())
            .handle(PushOrderToPartner::new(tenant.clone(), Some(order)), cancel)
            .await
    }

    /// Close the underlying store.
    pub async fn shutdown(&self) {
        info!("Shutting down order manager");
        self.repository.persistence().close().await;
    }
}
