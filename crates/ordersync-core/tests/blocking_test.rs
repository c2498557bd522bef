// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Blocking adapter tests.
//!
//! The blocking repositories own their runtime, so these are plain `#[test]`
//! functions. They verify:
//! - A full write/read cycle through a configured store
//! - Tax rates can be created, replaced, listed and deleted without async code
//! - Partner reads and pushes go through the same code as the async path
//! - A closed store reports a database failure instead of panicking
//!
//! The mock partner needs a runtime of its own to be started and configured;
//! the adapters are always called outside of it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ordersync_core::Config;
use ordersync_core::model::{
    Country, CountryContract, Customer, CustomerData, Endpoint, Order, OrderContract, OrderStatus,
    TaxRate, TaxRateContract, TaxRateData, TenantId,
};
use ordersync_core::repository::blocking::{
    BlockingCustomerRepository, BlockingOrderRepository, BlockingTaxRateRepository,
};

fn config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        max_connections: 1,
        partner_timeout: Duration::from_secs(1),
        default_actor: "blocking-test".to_string(),
    }
}

fn mock_runtime() -> Runtime {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build mock runtime")
}

#[test]
fn test_unknown_endpoint_is_tenant_isolation() {
    let repo = BlockingCustomerRepository::connect(&config()).unwrap();
    let tenant = TenantId::new("acme").unwrap();
    let endpoint = Arc::new(Endpoint {
        id: 1,
        tenant_id: TenantId::new("globex").unwrap(),
        name: "shop".into(),
        base_url: "http://unused.test".into(),
        api_token: None,
    });

    let err = repo
        .create(
            &tenant,
            Customer::new(CustomerData {
                endpoint: Some(endpoint),
                email: "x@example.com".into(),
                ..Default::default()
            }),
            &CancellationToken::new(),
        )
        .unwrap_err();
    assert_eq!(err.error_code(), "TENANT_ISOLATION");

    repo.shutdown().unwrap();
}

#[test]
fn test_reads_after_shutdown_fail_cleanly() {
    let repo = BlockingCustomerRepository::connect(&config()).unwrap();
    let tenant = TenantId::new("acme").unwrap();
    let cancel = CancellationToken::new();

    assert!(repo.list_for_tenant(&tenant, &cancel).unwrap().is_empty());
    repo.shutdown().unwrap();

    let err = repo.get_by_id(&tenant, 1, &cancel).unwrap_err();
    assert_eq!(err.error_code(), "DATABASE_ERROR");
}

#[test]
fn test_tax_rate_lifecycle() {
    let repo = BlockingTaxRateRepository::connect(&config()).unwrap();
    let acme = TenantId::new("acme").unwrap();
    let globex = TenantId::new("globex").unwrap();
    let cancel = CancellationToken::new();
    let shop = repo
        .register_endpoint(&acme, "shop", "http://unused.test", None)
        .unwrap();

    let created = repo
        .create(
            &acme,
            TaxRate::new(TaxRateData {
                endpoint: Some(shop),
                code: "CZ-DPH-21".into(),
                rate_basis_points: 2100,
                country: Some(Country::new("cz", "Czechia")),
                ..Default::default()
            })
            .unwrap(),
            &cancel,
        )
        .unwrap();
    let id = created.local_id().unwrap();
    assert_eq!(created.country().unwrap().iso_code(), "CZ");
    assert!(repo.get_by_id(&globex, id, &cancel).unwrap().is_none());

    let mut revised = created.data();
    revised.rate_basis_points = 1200;
    let updated = repo
        .update(&acme, TaxRate::new(revised).unwrap(), &cancel)
        .unwrap();
    assert_eq!(updated.rate_basis_points(), 1200);
    assert_eq!(repo.get_existing(&acme, id, &cancel).unwrap().rate_basis_points(), 1200);
    assert_eq!(repo.list_for_tenant(&acme, &cancel).unwrap().len(), 1);

    repo.delete(&acme, id, &cancel).unwrap();
    assert!(repo.list_for_tenant(&acme, &cancel).unwrap().is_empty());
    assert_eq!(
        repo.get_existing(&acme, id, &cancel).unwrap_err().error_code(),
        "OBJECT_NOT_FOUND"
    );
    repo.shutdown().unwrap();
}

#[test]
fn test_tax_rates_fetched_from_partner() {
    let mocks = mock_runtime();
    let server = mocks.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/taxRates"))
            .and(header("authorization", "Bearer acme-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "1", "code": "CZ-DPH-21", "rate": 21,
                     "tax_country": {"id": "CZ", "full_name_english": "Czechia"}},
                    {"id": "2", "code": "CZ-DPH-12", "rate": 12}
                ],
                "total_count": 2
            })))
            .expect(1)
            .mount(&server)
            .await;
        server
    });

    let repo = BlockingTaxRateRepository::connect(&config()).unwrap();
    let acme = TenantId::new("acme").unwrap();
    let shop = repo
        .register_endpoint(&acme, "shop", &server.uri(), Some("acme-token"))
        .unwrap();

    let rates = repo
        .fetch_remote_all(&acme, shop.id, &CancellationToken::new())
        .unwrap();
    let codes: Vec<&str> = rates.iter().map(|r| r.code()).collect();
    assert_eq!(codes, vec!["CZ-DPH-21", "CZ-DPH-12"]);
    assert_eq!(rates[0].rate_basis_points(), 2100);
    assert!(rates.iter().all(|r| r.local_id().is_none()));
}

#[test]
fn test_orders_fetched_in_range_and_pushed() {
    let mocks = mock_runtime();
    let server = mocks.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders"))
            .and(query_param("created_from", "2025-03-01T00:00:00Z"))
            .and(query_param("created_to", "2025-04-01T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "id": "301",
                    "increment_id": "000000301",
                    "created_at": "2025-03-10T08:00:00Z",
                    "status": "processing",
                    "order_currency_code": "CZK",
                    "grand_total": 99000
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/orders/301"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "301",
                "increment_id": "000000301",
                "created_at": "2025-03-10T08:00:00Z",
                "status": "complete",
                "order_currency_code": "CZK",
                "grand_total": 99000
            })))
            .expect(1)
            .mount(&server)
            .await;
        server
    });

    let repo = BlockingOrderRepository::connect(&config()).unwrap();
    let acme = TenantId::new("acme").unwrap();
    let cancel = CancellationToken::new();
    let shop = repo
        .register_endpoint(&acme, "shop", &server.uri(), None)
        .unwrap();

    let fetched = repo
        .fetch_remote_in_range(
            &acme,
            shop.id,
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
            &cancel,
        )
        .unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].order_number(), "000000301");

    let mut completed = fetched[0].data();
    completed.status = OrderStatus::Complete;
    let pushed = repo
        .push_remote(&acme, Order::new(completed), &cancel)
        .unwrap();
    assert_eq!(pushed.status(), OrderStatus::Complete);
    assert_eq!(pushed.remote_id(), Some("301"));

    // Nothing was written locally
    let stored = repo
        .list_in_range(
            &acme,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            &cancel,
        )
        .unwrap();
    assert!(stored.is_empty());
}
