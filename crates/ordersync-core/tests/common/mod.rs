// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for ordersync-core integration tests.
//!
//! Provides TestContext: an in-memory store, a mock partner API and two
//! tenants with one endpoint each.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use wiremock::MockServer;

use ordersync_core::Services;
use ordersync_core::model::{
    AddressContract, AddressData, AuditInfo, Country, CountryContract, Customer, CustomerContract,
    CustomerData, DefaultAddress, Endpoint, EntityKey, Order, OrderData, OrderLine, OrderStatus,
    SalesChannel, TenantId,
};
use ordersync_core::partner::HttpTransport;
use ordersync_core::persistence::SqlitePersistence;

/// Test context with two isolated tenants sharing one store.
pub struct TestContext {
    pub services: Services,
    pub partner: MockServer,
    pub acme: TenantId,
    pub globex: TenantId,
    pub acme_shop: Arc<Endpoint>,
    pub globex_shop: Arc<Endpoint>,
}

impl TestContext {
    pub async fn new() -> Self {
        ordersync_core::telemetry::try_init_tracing();

        let partner = MockServer::start().await;
        let persistence = Arc::new(
            SqlitePersistence::in_memory()
                .await
                .expect("Failed to open in-memory store"),
        );
        let transport =
            Arc::new(HttpTransport::new(Duration::from_secs(5)).expect("Failed to build client"));
        let services = Services::from_parts(persistence, transport, "e2e");

        let acme = TenantId::new("acme").unwrap();
        let globex = TenantId::new("globex").unwrap();
        let acme_shop = services
            .register_endpoint(&acme, "acme-shop", &partner.uri(), Some("acme-token"))
            .await
            .expect("Failed to register acme endpoint");
        let globex_shop = services
            .register_endpoint(&globex, "globex-shop", &partner.uri(), Some("globex-token"))
            .await
            .expect("Failed to register globex endpoint");

        Self {
            services,
            partner,
            acme,
            globex,
            acme_shop,
            globex_shop,
        }
    }
}

/// A customer with a two-entry address book whose first entry is the default.
pub fn customer(endpoint: &Arc<Endpoint>, email: &str) -> Arc<Customer> {
    Customer::assemble(
        CustomerData {
            key: EntityKey::default(),
            endpoint: Some(endpoint.clone()),
            email: email.into(),
            first_name: "Marta".into(),
            last_name: "Lewandowska".into(),
            sales_channels: Some(vec![
                SalesChannel::new("website", "base"),
                SalesChannel::new("marketplace", "allegro"),
            ]),
            ..Default::default()
        },
        Some(vec![
            AddressData {
                key: EntityKey::remote("addr-1"),
                street: "Mariacka 2".into(),
                city: "Katowice".into(),
                postcode: "40-014".into(),
                telephone: Some("+48 32 000 00 00".into()),
                country: Some(Country::new("PL", "Poland")),
            },
            AddressData {
                key: EntityKey::remote("addr-2"),
                street: "Unter den Linden 1".into(),
                city: "Berlin".into(),
                postcode: "10117".into(),
                telephone: None,
                country: Some(Country::new("DE", "Germany")),
            },
        ]),
        DefaultAddress::Listed(0),
    )
    .expect("valid customer")
}

/// An order for `customer`, shipped to its default address.
pub fn order(
    endpoint: &Arc<Endpoint>,
    customer: Option<&Arc<Customer>>,
    number: &str,
    placed_at: DateTime<Utc>,
) -> Arc<Order> {
    Order::new(OrderData {
        endpoint: Some(endpoint.clone()),
        order_number: number.into(),
        placed_at,
        status: OrderStatus::Processing,
        currency: "PLN".into(),
        grand_total_minor: 15_998,
        sales_channel: Some(SalesChannel::new("website", "base")),
        customer: customer.cloned(),
        shipping_address: customer.and_then(|c| c.default_address().cloned()),
        lines: Some(vec![OrderLine {
            sku: "KUBEK-1".into(),
            name: "Kubek".into(),
            quantity: 2,
            unit_price_minor: 7_999,
        }]),
        ..Default::default()
    })
}

// ============================================================================
// A foreign, mutable, cyclic implementation of the contracts
// ============================================================================

/// Customer from an older integration: its address points back at it.
pub struct LegacyCustomer {
    pub endpoint: Arc<Endpoint>,
    pub email: String,
    pub default_address: Mutex<Option<Arc<LegacyAddress>>>,
    pub addresses: Mutex<Option<Vec<Arc<LegacyAddress>>>>,
}

/// Address of a [`LegacyCustomer`].
pub struct LegacyAddress {
    pub street: String,
    pub owner: Mutex<Option<Arc<LegacyCustomer>>>,
}

impl CustomerContract for LegacyCustomer {
    fn key(&self) -> EntityKey {
        EntityKey::remote("legacy-1")
    }
    fn audit(&self) -> AuditInfo {
        AuditInfo::default()
    }
    fn endpoint(&self) -> Option<Arc<Endpoint>> {
        Some(self.endpoint.clone())
    }
    fn email(&self) -> &str {
        &self.email
    }
    fn first_name(&self) -> &str {
        "Olek"
    }
    fn last_name(&self) -> &str {
        "Kamiński"
    }
    fn sales_channels(&self) -> Option<&[SalesChannel]> {
        None
    }
    fn default_address(&self) -> Option<Arc<dyn AddressContract>> {
        self.default_address
            .lock()
            .unwrap()
            .clone()
            .map(|a| a as Arc<dyn AddressContract>)
    }
    fn addresses(&self) -> Option<Vec<Arc<dyn AddressContract>>> {
        self.addresses.lock().unwrap().clone().map(|list| {
            list.into_iter()
                .map(|a| a as Arc<dyn AddressContract>)
                .collect()
        })
    }
}

impl AddressContract for LegacyAddress {
    fn key(&self) -> EntityKey {
        EntityKey::default()
    }
    fn customer_id(&self) -> Option<i64> {
        None
    }
    fn customer(&self) -> Option<Arc<dyn CustomerContract>> {
        self.owner
            .lock()
            .unwrap()
            .clone()
            .map(|c| c as Arc<dyn CustomerContract>)
    }
    fn street(&self) -> &str {
        &self.street
    }
    fn city(&self) -> &str {
        "Poznań"
    }
    fn postcode(&self) -> &str {
        "61-001"
    }
    fn telephone(&self) -> Option<&str> {
        None
    }
    fn country(&self) -> Option<Arc<dyn CountryContract>> {
        Some(Country::new("PL", "Poland"))
    }
}

/// Build a legacy customer whose only address is also its default and
/// points back at it. Call [`break_cycle`] when done.
pub fn legacy_customer(endpoint: &Arc<Endpoint>, email: &str) -> Arc<LegacyCustomer> {
    let customer = Arc::new(LegacyCustomer {
        endpoint: endpoint.clone(),
        email: email.into(),
        default_address: Mutex::new(None),
        addresses: Mutex::new(None),
    });
    let address = Arc::new(LegacyAddress {
        street: "Półwiejska 2".into(),
        owner: Mutex::new(Some(customer.clone())),
    });
    *customer.default_address.lock().unwrap() = Some(address.clone());
    *customer.addresses.lock().unwrap() = Some(vec![address]);
    customer
}

pub fn break_cycle(customer: &LegacyCustomer) {
    customer.default_address.lock().unwrap().take();
    customer.addresses.lock().unwrap().take();
}
