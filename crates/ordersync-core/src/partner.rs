// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Partner REST transport.
//!
//! The repositories only need three verbs against a partner resource:
//!
//! | Verb | Request | Result |
//! |------|---------|--------|
//! | get | `GET {base}/{resource}/{id}` | body, or `None` on 404 |
//! | list | `GET {base}/{resource}?{query}` | `items` of every [`ListEnvelope`] page |
//! | upsert | `PUT {base}/{resource}/{id}` or `POST {base}/{resource}` | body |
//!
//! Lists are read page by page (`searchCriteria[currentPage]`, 1-based) until
//! the partner's `total_count` is reached or a page comes back empty. A
//! partner that reports no `total_count` is read as a single page.
//!
//! Any other non-2xx status becomes [`SyncError::Partner`] with the response
//! body verbatim. Nothing is retried here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::dto::ListEnvelope;
use crate::error::{Result, SyncError};
use crate::model::Endpoint;

/// Resource paths of the partner API.
pub mod resources {
    /// Customers.
    pub const CUSTOMERS: &str = "customers";
    /// Orders.
    pub const ORDERS: &str = "orders";
    /// Tax rates.
    pub const TAX_RATES: &str = "taxRates";
}

/// Items requested per list page.
pub const PAGE_SIZE: u32 = 100;

/// Pages read before a list is abandoned as runaway.
pub const MAX_PAGES: u32 = 1_000;

/// Untyped access to a partner REST API.
#[async_trait]
pub trait PartnerTransport: Send + Sync {
    /// Fetch one resource. `Ok(None)` when the partner answers 404.
    async fn get(&self, endpoint: &Endpoint, resource: &str, id: &str) -> Result<Option<Value>>;

    /// List every resource matching `query`, across all pages.
    async fn list(
        &self,
        endpoint: &Endpoint,
        resource: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Value>>;

    /// Create (no id) or replace (with id) a resource, returning the
    /// partner's representation of it.
    async fn upsert(
        &self,
        endpoint: &Endpoint,
        resource: &str,
        remote_id: Option<&str>,
        body: &Value,
    ) -> Result<Value>;
}

/// [`PartnerTransport`] over HTTPS with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Build a transport using the configured partner timeout.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.partner_timeout)
    }

    fn url(endpoint: &Endpoint, resource: &str, id: Option<&str>) -> String {
        let base = endpoint.base_url.trim_end_matches('/');
        match id {
            Some(id) => format!("{}/{}/{}", base, resource, urlencoding::encode(id)),
            None => format!("{}/{}", base, resource),
        }
    }

    fn request(&self, method: Method, endpoint: &Endpoint, url: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match &endpoint.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::Partner {
                status: status.as_u16(),
                detail: body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| SyncError::Transport(format!("Unreadable partner response: {}", e)))
    }
}

#[async_trait]
impl PartnerTransport for HttpTransport {
    async fn get(&self, endpoint: &Endpoint, resource: &str, id: &str) -> Result<Option<Value>> {
        let url = Self::url(endpoint, resource, Some(id));
        debug!(endpoint_id = endpoint.id, %url, "Partner GET");

        let response = self.request(Method::GET, endpoint, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::read_json(response).await.map(Some)
    }

    async fn list(
        &self,
        endpoint: &Endpoint,
        resource: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Value>> {
        let url = Self::url(endpoint, resource, None);
        let mut items = Vec::new();

        for current in 1..=MAX_PAGES {
            debug!(endpoint_id = endpoint.id, %url, page = current, "Partner LIST");
            let response = self
                .request(Method::GET, endpoint, &url)
                .query(query)
                .query(&[
                    ("searchCriteria[currentPage]", current),
                    ("searchCriteria[pageSize]", PAGE_SIZE),
                ])
                .send()
                .await?;
            let page: ListEnvelope<Value> =
                serde_json::from_value(Self::read_json(response).await?).map_err(|e| {
                    SyncError::Transport(format!("Unreadable partner list: {}", e))
                })?;

            let received = page.items.len();
            items.extend(page.items);
            let more = match page.total_count {
                Some(total) => received > 0 && (items.len() as u64) < total,
                None => false,
            };
            if !more {
                return Ok(items);
            }
        }

        Err(SyncError::Transport(format!(
            "Partner list of {} did not end within {} pages",
            resource, MAX_PAGES
        )))
    }

    async fn upsert(
        &self,
        endpoint: &Endpoint,
        resource: &str,
        remote_id: Option<&str>,
        body: &Value,
    ) -> Result<Value> {
        let (method, url) = match remote_id {
            Some(id) => (Method::PUT, Self::url(endpoint, resource, Some(id))),
            None => (Method::POST, Self::url(endpoint, resource, None)),
        };
        debug!(endpoint_id = endpoint.id, %method, %url, "Partner upsert");

        let response = self
            .request(method, endpoint, &url)
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }
}

fn decode<T: DeserializeOwned>(value: Value, resource: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        SyncError::Transport(format!("Unexpected {} payload from partner: {}", resource, e))
    })
}

/// [`PartnerTransport::get`] decoded into a DTO.
pub async fn get_typed<T: DeserializeOwned>(
    transport: &dyn PartnerTransport,
    endpoint: &Endpoint,
    resource: &str,
    id: &str,
) -> Result<Option<T>> {
    transport
        .get(endpoint, resource, id)
        .await?
        .map(|v| decode(v, resource))
        .transpose()
}

/// [`PartnerTransport::list`] decoded into DTOs.
pub async fn list_typed<T: DeserializeOwned>(
    transport: &dyn PartnerTransport,
    endpoint: &Endpoint,
    resource: &str,
    query: &[(&str, String)],
) -> Result<Vec<T>> {
    transport
        .list(endpoint, resource, query)
        .await?
        .into_iter()
        .map(|v| decode(v, resource))
        .collect()
}

/// [`PartnerTransport::upsert`] with a DTO body and decoded response.
pub async fn upsert_typed<B: Serialize + Sync, T: DeserializeOwned>(
    transport: &dyn PartnerTransport,
    endpoint: &Endpoint,
    resource: &str,
    remote_id: Option<&str>,
    body: &B,
) -> Result<T> {
    let body = serde_json::to_value(body)
        .map_err(|e| SyncError::Transport(format!("Cannot encode {} body: {}", resource, e)))?;
    let value = transport.upsert(endpoint, resource, remote_id, &body).await?;
    decode(value, resource)
}
