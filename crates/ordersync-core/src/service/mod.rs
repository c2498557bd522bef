// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service managers: one call surface per aggregate.
//!
//! Callers (UI, jobs) talk to a manager; the manager builds the request and
//! handler pair and returns an [`Outcome`](crate::envelope::Outcome). Handlers
//! are never exposed.

mod customer_manager;
mod order_manager;
mod tax_rate_manager;

pub use self::customer_manager::CustomerManager;
pub use self::order_manager::OrderManager;
pub use self::tax_rate_manager::TaxRateManager;

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::model::{Endpoint, TenantId};
use crate::partner::{HttpTransport, PartnerTransport};
use crate::persistence::{Persistence, SqlitePersistence};
use crate::repository::{CustomerRepository, OrderRepository, TaxRateRepository};

/// All managers over one store and one partner transport.
pub struct Services {
    persistence: Arc<dyn Persistence>,
    /// Customer operations.
    pub customers: CustomerManager,
    /// Order operations.
    pub orders: OrderManager,
    /// Tax rate operations.
    pub tax_rates: TaxRateManager,
}

impl Services {
    /// Open the configured store, check it, and build every manager.
    pub async fn connect(config: &Config) -> Result<Self> {
        info!("Connecting to local store...");
        let persistence = SqlitePersistence::connect(config).await?;
        persistence.health_check_db().await?;
        info!("Local store ready");

        let partner = HttpTransport::from_config(config)?;
        info!(
            timeout_ms = config.partner_timeout.as_millis() as u64,
            actor = %config.default_actor,
            "Partner transport configured"
        );

        Ok(Self::from_parts(
            Arc::new(persistence),
            Arc::new(partner),
            &config.default_actor,
        ))
    }

    /// Build every manager over the given collaborators.
    pub fn from_parts(
        persistence: Arc<dyn Persistence>,
        partner: Arc<dyn PartnerTransport>,
        actor: &str,
    ) -> Self {
        Self {
            customers: CustomerManager::new(CustomerRepository::new(
                persistence.clone(),
                partner.clone(),
                actor,
            )),
            orders: OrderManager::new(OrderRepository::new(
                persistence.clone(),
                partner.clone(),
                actor,
            )),
            tax_rates: TaxRateManager::new(TaxRateRepository::new(
                persistence.clone(),
                partner,
                actor,
            )),
            persistence,
        }
    }

    /// Register a partner endpoint for a tenant.
    pub async fn register_endpoint(
        &self,
        tenant: &TenantId,
        name: &str,
        base_url: &str,
        api_token: Option<&str>,
    ) -> Result<Arc<Endpoint>> {
        let record = self
            .persistence
            .save_endpoint(tenant, name, base_url, api_token)
            .await?;
        info!(endpoint_id = record.id, tenant_id = %tenant, name, "Endpoint registered");
        Ok(Arc::new(record.into_endpoint()?))
    }

    /// Close the shared store.
    pub async fn shutdown(&self) {
        info!("Shutting down services");
        self.persistence.close().await;
    }
}
