// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Order queries and commands.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::envelope::{CommandResult, Outcome, QueryResult};
use crate::error::{Result, SyncError};
use crate::model::{Order, OrderContract, TenantId};
use crate::repository::OrderRepository;

use super::{
    Command, CommandHandler, Query, QueryHandler, admit_command, admit_query, canonical,
    non_blank, positive_id, present,
};

/// Read one stored order.
#[derive(Debug, Clone)]
pub struct GetOrderById {
    tenant: TenantId,
    id: i64,
}

impl GetOrderById {
    /// Read order `id` of `tenant`.
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

impl Query for GetOrderById {
    const NAME: &'static str = "GetOrderById";
    type Output = Arc<Order>;

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

/// Stored orders placed in `[from, to)`.
#[derive(Debug, Clone)]
pub struct GetOrdersInDateRange {
    tenant: TenantId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl GetOrdersInDateRange {
    /// `from` is inclusive, `to` exclusive.
    pub fn new(tenant: TenantId, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { tenant, from, to }
    }

    /// Caller's tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Inclusive lower bound.
    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    /// Exclusive upper bound.
    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }
}

impl Query for GetOrdersInDateRange {
    const NAME: &'static str = "GetOrdersInDateRange";
    type Output = Vec<Arc<Order>>;

    fn parameters(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("tenant_id", json!(self.tenant.as_str())),
            ("from", json!(self.from.to_rfc3339())),
            ("to", json!(self.to.to_rfc3339())),
        ])
    }

    fn validate(&self) -> Result<()> {
        if self.from > self.to {
            return Err(SyncError::validation(
                "from",
                format!("{} is after {}", self.from, self.to),
            ));
        }
        Ok(())
    }
}

/// Read an order straight from the partner.
#[derive(Debug, Clone)]
pub struct FetchPartnerOrder {
    tenant: TenantId,
    endpoint_id: i64,
    remote_id: String,
}

impl FetchPartnerOrder {
    /// Ask endpoint `endpoint_id` for partner order `remote_id`.
    pub fn new(tenant: TenantId, endpoint_id: i64, remote_id: impl Into<String>) -> Self {
        Self {
            tenant,
            endpoint_id,
            remote_id: remote_id.into(),
        }
    }

    /// Caller's tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Endpoint to ask.
    pub fn endpoint_id(&self) -> i64 {
        self.endpoint_id
    }

    /// Partner id.
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }
}

impl Query for FetchPartnerOrder {
    const NAME: &'static str = "FetchPartnerOrder";
    type Output = Arc<Order>;

    fn parameters(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("tenant_id", json!(self.tenant.as_str())),
            ("endpoint_id", json!(self.endpoint_id)),
            ("remote_id", json!(self.remote_id)),
        ])
    }

    fn validate(&self) -> Result<()> {
        positive_id("endpoint_id", self.endpoint_id)?;
        non_blank("remote_id", &self.remote_id)
    }
}

/// Store an order: insert when it has no local id, replace otherwise.
#[derive(Clone)]
pub struct SaveOrder {
    tenant: TenantId,
    order: Option<Arc<dyn OrderContract>>,
}

impl SaveOrder {
    /// Store `order` for `tenant`. `None` fails validation.
    pub fn new(tenant: TenantId, order: Option<Arc<dyn OrderContract>>) -> Self {
        Self { tenant, order }
    }

    /// Caller's tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// The order to store.
    pub fn order(&self) -> Option<&Arc<dyn OrderContract>> {
        self.order.as_ref()
    }
}

impl Command for SaveOrder {
    const NAME: &'static str = "SaveOrder";
    type Output = Arc<Order>;

    fn parameters(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("tenant_id", json!(self.tenant.as_str())),
            (
                "order_number",
                json!(self.order.as_ref().map(|o| o.order_number().to_string())),
            ),
        ])
    }

    fn validate(&self) -> Result<()> {
        validate_order(self.order.as_ref())
    }
}

/// Soft-delete a stored order.
#[derive(Debug, Clone)]
pub struct DeleteOrder {
    tenant: TenantId,
    id: i64,
}

impl DeleteOrder {
    /// Delete order `id` of `tenant`.
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

impl Command for DeleteOrder {
    const NAME: &'static str = "DeleteOrder";
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

/// Send an order to its partner endpoint. The partner's copy is returned
/// and nothing is stored locally.
#[derive(Clone)]
pub struct PushOrderToPartner {
    tenant: TenantId,
    order: Option<Arc<dyn OrderContract>>,
}

impl PushOrderToPartner {
    /// Send `order` through `tenant`'s endpoint. `None` fails validation.
    pub fn new(tenant: TenantId, order: Option<Arc<dyn OrderContract>>) -> Self {
        Self { tenant, order }
    }

    /// Caller's tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// The order to send.
    pub fn order(&self) -> Option<&Arc<dyn OrderContract>> {
        self.order.as_ref()
    }
}

impl Command for PushOrderToPartner {
    const NAME: &'static str = "PushOrderToPartner";
    type Output = Arc<Order>;

    fn parameters(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("tenant_id", json!(self.tenant.as_str())),
            (
                "remote_id",
                json!(self.order.as_ref().and_then(|o| o.key().remote_id)),
            ),
        ])
    }

    fn validate(&self) -> Result<()> {
        validate_order(self.order.as_ref())
    }
}

fn validate_order(order: Option<&Arc<dyn OrderContract>>) -> Result<()> {
    present("order", order)?;
    if let Some(order) = order {
        non_blank("order_number", order.order_number())?;
        non_blank("currency", order.currency())?;
    }
    Ok(())
}

/// Handles [`GetOrderById`].
pub struct GetOrderByIdHandler {
    repository: OrderRepository,
}

impl GetOrderByIdHandler {
    pub(crate) fn new(repository: OrderRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl QueryHandler<GetOrderById> for GetOrderByIdHandler {
    async fn handle(&self, query: GetOrderById, cancel: &CancellationToken) -> QueryResult<Arc<Order>> {
        if let Err(rejected) = admit_query(&query) {
            return rejected;
        }
        Outcome::from_optional(self.repository.get_by_id(&query.tenant, query.id, cancel).await)
    }
}

/// Handles [`GetOrdersInDateRange`].
pub struct GetOrdersInDateRangeHandler {
    repository: OrderRepository,
}

impl GetOrdersInDateRangeHandler {
    pub(crate) fn new(repository: OrderRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl QueryHandler<GetOrdersInDateRange> for GetOrdersInDateRangeHandler {
    async fn handle(
        &self,
        query: GetOrdersInDateRange,
        cancel: &CancellationToken,
    ) -> QueryResult<Vec<Arc<Order>>> {
        if let Err(rejected) = admit_query(&query) {
            return rejected;
        }
        Outcome::from_result(
            self.repository
                .list_in_range(&query.tenant, query.from, query.to, cancel)
                .await,
        )
    }
}

/// Handles [`FetchPartnerOrder`].
pub struct FetchPartnerOrderHandler {
    repository: OrderRepository,
}

impl FetchPartnerOrderHandler {
    pub(crate) fn new(repository: OrderRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl QueryHandler<FetchPartnerOrder> for FetchPartnerOrderHandler {
    async fn handle(
        &self,
        query: FetchPartnerOrder,
        cancel: &CancellationToken,
    ) -> QueryResult<Arc<Order>> {
        if let Err(rejected) = admit_query(&query) {
            return rejected;
        }
        Outcome::from_optional(
            self.repository
                .fetch_remote(&query.tenant, query.endpoint_id, query.remote_id.trim(), cancel)
                .await,
        )
    }
}

/// Handles [`SaveOrder`].
pub struct SaveOrderHandler {
    repository: OrderRepository,
}

impl SaveOrderHandler {
    pub(crate) fn new(repository: OrderRepository) -> Self {
        Self { repository }
    }

    async fn save(&self, command: &SaveOrder, cancel: &CancellationToken) -> Result<Arc<Order>> {
        let order = canonical::<Order>("order", command.order.as_ref())?;
        if order.local_id().is_some() {
            self.repository.update(&command.tenant, order, cancel).await
        } else {
            self.repository.create(&command.tenant, order, cancel).await
        }
    }
}

#[async_trait]
impl CommandHandler<SaveOrder> for SaveOrderHandler {
    async fn handle(&self, command: SaveOrder, cancel: &CancellationToken) -> CommandResult<Arc<Order>> {
        if let Err(rejected) = admit_command(&command) {
            return rejected;
        }
        Outcome::from_result(self.save(&command, cancel).await)
    }
}

/// Handles [`DeleteOrder`].
pub struct DeleteOrderHandler {
    repository: OrderRepository,
}

impl DeleteOrderHandler {
    pub(crate) fn new(repository: OrderRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CommandHandler<DeleteOrder> for DeleteOrderHandler {
    async fn handle(&self, command: DeleteOrder, cancel: &CancellationToken) -> CommandResult {
        if let Err(rejected) = admit_command(&command) {
            return rejected;
        }
        Outcome::from_result(self.repository.delete(&command.tenant, command.id, cancel).await)
    }
}

/// Handles [`PushOrderToPartner`].
pub struct PushOrderToPartnerHandler {
    repository: OrderRepository,
}

impl PushOrderToPartnerHandler {
    pub(crate) fn new(repository: OrderRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CommandHandler<PushOrderToPartner> for PushOrderToPartnerHandler {
    async fn handle(
        &self,
        command: PushOrderToPartner,
        cancel: &CancellationToken,
    ) -> CommandResult<Arc<Order>> {
        if let Err(rejected) = admit_command(&command) {
            return rejected;
        }
        let result = match canonical::<Order>("order", command.order.as_ref()) {
            Ok(order) => self.repository.push_remote(&command.tenant, order, cancel).await,
            Err(e) => Err(e),
        };
        Outcome::from_result(result)
    }
}
