// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Synchronous adapters over the async repositories.
//!
//! Each method is a `block_on` of the async method with the same name; there
//! is no second code path. The adapter owns a current-thread runtime and must
//! only be created, used and dropped on plain threads. Calling it from inside
//! a tokio runtime returns [`SyncError::BlockingInAsync`] instead of
//! deadlocking.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::model::{Customer, Endpoint, Order, TaxRate, TenantId};
use crate::partner::HttpTransport;
use crate::persistence::{Persistence, SqlitePersistence};

use super::{CustomerRepository, OrderRepository, TaxRateRepository};

fn runtime(operation: &'static str) -> Result<Runtime> {
    if Handle::try_current().is_ok() {
        return Err(SyncError::BlockingInAsync(operation));
    }
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| SyncError::Config(format!("Failed to build blocking runtime: {}", e)))
}

fn block_on<F: Future>(runtime: &Runtime, operation: &'static str, fut: F) -> Result<F::Output> {
    if Handle::try_current().is_ok() {
        return Err(SyncError::BlockingInAsync(operation));
    }
    Ok(runtime.block_on(fut))
}

/// Open the configured store and partner transport on `runtime`.
fn connect(runtime: &Runtime, config: &Config) -> Result<(Arc<dyn Persistence>, Arc<HttpTransport>)> {
    let persistence: Arc<dyn Persistence> = Arc::new(block_on(
        runtime,
        "connect",
        SqlitePersistence::connect(config),
    )??);
    Ok((persistence, Arc::new(HttpTransport::from_config(config)?)))
}

fn register_endpoint(
    runtime: &Runtime,
    persistence: &Arc<dyn Persistence>,
    tenant: &TenantId,
    name: &str,
    base_url: &str,
    api_token: Option<&str>,
) -> Result<Arc<Endpoint>> {
    let record = block_on(
        runtime,
        "register_endpoint",
        persistence.save_endpoint(tenant, name, base_url, api_token),
    )??;
    Ok(Arc::new(record.into_endpoint()?))
}

/// Blocking [`CustomerRepository`].
pub struct BlockingCustomerRepository {
    inner: CustomerRepository,
    runtime: Runtime,
}

impl BlockingCustomerRepository {
    /// Wrap an existing repository. Its store must not be tied to another
    /// runtime's lifetime.
    pub fn new(inner: CustomerRepository) -> Result<Self> {
        Ok(Self {
            inner,
            runtime: runtime("new")?,
        })
    }

    /// Build the store and transport from `config` on the adapter's own
    /// runtime.
    pub fn connect(config: &Config) -> Result<Self> {
        let runtime = runtime("connect")?;
        let (persistence, partner) = connect(&runtime, config)?;
        Ok(Self {
            inner: CustomerRepository::new(persistence, partner, config.default_actor.clone()),
            runtime,
        })
    }

    /// See [`CustomerRepository::get_by_id`].
    pub fn get_by_id(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Customer>>> {
        block_on(&self.runtime, "get_by_id", self.inner.get_by_id(tenant, id, cancel))?
    }

    /// See [`CustomerRepository::get_existing`].
    pub fn get_existing(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Arc<Customer>> {
        block_on(&self.runtime, "get_existing", self.inner.get_existing(tenant, id, cancel))?
    }

    /// See [`CustomerRepository::list_for_tenant`].
    pub fn list_for_tenant(
        &self,
        tenant: &TenantId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<Customer>>> {
        block_on(&self.runtime, "list_for_tenant", self.inner.list_for_tenant(tenant, cancel))?
    }

    /// See [`CustomerRepository::fetch_remote`].
    pub fn fetch_remote(
        &self,
        tenant: &TenantId,
        endpoint_id: i64,
        remote_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Customer>>> {
        block_on(
            &self.runtime,
            "fetch_remote",
            self.inner.fetch_remote(tenant, endpoint_id, remote_id, cancel),
        )?
    }

    /// See [`CustomerRepository::create`].
    pub fn create(
        &self,
        tenant: &TenantId,
        customer: Arc<Customer>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Customer>> {
        block_on(&self.runtime, "create", self.inner.create(tenant, customer, cancel))?
    }

    /// See [`CustomerRepository::update`].
    pub fn update(
        &self,
        tenant: &TenantId,
        customer: Arc<Customer>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Customer>> {
        block_on(&self.runtime, "update", self.inner.update(tenant, customer, cancel))?
    }

    /// See [`CustomerRepository::delete`].
    pub fn delete(&self, tenant: &TenantId, id: i64, cancel: &CancellationToken) -> Result<()> {
        block_on(&self.runtime, "delete", self.inner.delete(tenant, id, cancel))?
    }

    /// See [`CustomerRepository::push_remote`].
    pub fn push_remote(
        &self,
        tenant: &TenantId,
        customer: Arc<Customer>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Customer>> {
        block_on(&self.runtime, "push_remote", self.inner.push_remote(tenant, customer, cancel))?
    }

    /// Register a partner endpoint for `tenant` in the adapter's store.
    pub fn register_endpoint(
        &self,
        tenant: &TenantId,
        name: &str,
        base_url: &str,
        api_token: Option<&str>,
    ) -> Result<Arc<Endpoint>> {
        register_endpoint(&self.runtime, self.inner.persistence(), tenant, name, base_url, api_token)
    }

    /// Close the store.
    pub fn shutdown(&self) -> Result<()> {
        block_on(&self.runtime, "shutdown", self.inner.persistence().close())
    }
}

/// Blocking [`OrderRepository`].
pub struct BlockingOrderRepository {
    inner: OrderRepository,
    runtime: Runtime,
}

impl BlockingOrderRepository {
    /// Wrap an existing repository.
    pub fn new(inner: OrderRepository) -> Result<Self> {
        Ok(Self {
            inner,
            runtime: runtime("new")?,
        })
    }

    /// Build the store and transport from `config`.
    pub fn connect(config: &Config) -> Result<Self> {
        let runtime = runtime("connect")?;
        let (persistence, partner) = connect(&runtime, config)?;
        Ok(Self {
            inner: OrderRepository::new(persistence, partner, config.default_actor.clone()),
            runtime,
        })
    }

    /// See [`OrderRepository::get_by_id`].
    pub fn get_by_id(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Order>>> {
        block_on(&self.runtime, "get_by_id", self.inner.get_by_id(tenant, id, cancel))?
    }

    /// See [`OrderRepository::get_existing`].
    pub fn get_existing(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Arc<Order>> {
        block_on(&self.runtime, "get_existing", self.inner.get_existing(tenant, id, cancel))?
    }

    /// See [`OrderRepository::list_in_range`].
    pub fn list_in_range(
        &self,
        tenant: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<Order>>> {
        block_on(
            &self.runtime,
            "list_in_range",
            self.inner.list_in_range(tenant, from, to, cancel),
        )?
    }

    /// See [`OrderRepository::fetch_remote`].
    pub fn fetch_remote(
        &self,
        tenant: &TenantId,
        endpoint_id: i64,
        remote_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Order>>> {
        block_on(
            &self.runtime,
            "fetch_remote",
            self.inner.fetch_remote(tenant, endpoint_id, remote_id, cancel),
        )?
    }

    /// See [`OrderRepository::fetch_remote_in_range`].
    pub fn fetch_remote_in_range(
        &self,
        tenant: &TenantId,
        endpoint_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<Order>>> {
        block_on(
            &self.runtime,
            "fetch_remote_in_range",
            self.inner.fetch_remote_in_range(tenant, endpoint_id, from, to, cancel),
        )?
    }

    /// See [`OrderRepository::create`].
    pub fn create(
        &self,
        tenant: &TenantId,
        order: Arc<Order>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Order>> {
        block_on(&self.runtime, "create", self.inner.create(tenant, order, cancel))?
    }

    /// See [`OrderRepository::update`].
    pub fn update(
        &self,
        tenant: &TenantId,
        order: Arc<Order>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Order>> {
        block_on(&self.runtime, "update", self.inner.update(tenant, order, cancel))?
    }

    /// See [`OrderRepository::delete`].
    pub fn delete(&self, tenant: &TenantId, id: i64, cancel: &CancellationToken) -> Result<()> {
        block_on(&self.runtime, "delete", self.inner.delete(tenant, id, cancel))?
    }

    /// See [`OrderRepository::push_remote`].
    pub fn push_remote(
        &self,
        tenant: &TenantId,
        order: Arc<Order>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Order>> {
        block_on(&self.runtime, "push_remote", self.inner.push_remote(tenant, order, cancel))?
    }

    /// Register a partner endpoint for `tenant` in the adapter's store.
    pub fn register_endpoint(
        &self,
        tenant: &TenantId,
        name: &str,
        base_url: &str,
        api_token: Option<&str>,
    ) -> Result<Arc<Endpoint>> {
        register_endpoint(&self.runtime, self.inner.persistence(), tenant, name, base_url, api_token)
    }

    /// Close the store.
    pub fn shutdown(&self) -> Result<()> {
        block_on(&self.runtime, "shutdown", self.inner.persistence().close())
    }
}

/// Blocking [`TaxRateRepository`].
pub struct BlockingTaxRateRepository {
    inner: TaxRateRepository,
    runtime: Runtime,
}

impl BlockingTaxRateRepository {
    /// Wrap an existing repository.
    pub fn new(inner: TaxRateRepository) -> Result<Self> {
        Ok(Self {
            inner,
            runtime: runtime("new")?,
        })
    }

    /// Build the store and transport from `config`.
    pub fn connect(config: &Config) -> Result<Self> {
        let runtime = runtime("connect")?;
        let (persistence, partner) = connect(&runtime, config)?;
        Ok(Self {
            inner: TaxRateRepository::new(persistence, partner, config.default_actor.clone()),
            runtime,
        })
    }

    /// See [`TaxRateRepository::get_by_id`].
    pub fn get_by_id(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<TaxRate>>> {
        block_on(&self.runtime, "get_by_id", self.inner.get_by_id(tenant, id, cancel))?
    }

    /// See [`TaxRateRepository::get_existing`].
    pub fn get_existing(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Arc<TaxRate>> {
        block_on(&self.runtime, "get_existing", self.inner.get_existing(tenant, id, cancel))?
    }

    /// See [`TaxRateRepository::list_for_tenant`].
    pub fn list_for_tenant(
        &self,
        tenant: &TenantId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<TaxRate>>> {
        block_on(&self.runtime, "list_for_tenant", self.inner.list_for_tenant(tenant, cancel))?
    }

    /// See [`TaxRateRepository::fetch_remote_all`].
    pub fn fetch_remote_all(
        &self,
        tenant: &TenantId,
        endpoint_id: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<TaxRate>>> {
        block_on(
            &self.runtime,
            "fetch_remote_all",
            self.inner.fetch_remote_all(tenant, endpoint_id, cancel),
        )?
    }

    /// See [`TaxRateRepository::create`].
    pub fn create(
        &self,
        tenant: &TenantId,
        rate: Arc<TaxRate>,
        cancel: &CancellationToken,
    ) -> Result<Arc<TaxRate>> {
        block_on(&self.runtime, "create", self.inner.create(tenant, rate, cancel))?
    }

    /// See [`TaxRateRepository::update`].
    pub fn update(
        &self,
        tenant: &TenantId,
        rate: Arc<TaxRate>,
        cancel: &CancellationToken,
    ) -> Result<Arc<TaxRate>> {
        block_on(&self.runtime, "update", self.inner.update(tenant, rate, cancel))?
    }

    /// See [`TaxRateRepository::delete`].
    pub fn delete(&self, tenant: &TenantId, id: i64, cancel: &CancellationToken) -> Result<()> {
        block_on(&self.runtime, "delete", self.inner.delete(tenant, id, cancel))?
    }

    /// Register a partner endpoint for `tenant` in the adapter's store.
    pub fn register_endpoint(
        &self,
        tenant: &TenantId,
        name: &str,
        base_url: &str,
        api_token: Option<&str>,
    ) -> Result<Arc<Endpoint>> {
        register_endpoint(&self.runtime, self.inner.persistence(), tenant, name, base_url, api_token)
    }

    /// Close the store.
    pub fn shutdown(&self) -> Result<()> {
        block_on(&self.runtime, "shutdown", self.inner.persistence().close())
    }
}
