// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::dto::TaxRateDto;
use crate::error::{Result, SyncError};
use crate::model::{TaxRate, TenantId};
use crate::partner::{self, PartnerTransport, resources};
use crate::persistence::{Persistence, TaxRateWrite};

use super::{cancellable, check_owner, require_local_id, stored_endpoint};

/// Tax rates of one store, local and partner-side.
#[derive(Clone)]
pub struct TaxRateRepository {
    persistence: Arc<dyn Persistence>,
    partner: Arc<dyn PartnerTransport>,
    actor: String,
}

impl TaxRateRepository {
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

    /// Local copy of one rate.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn get_by_id(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<TaxRate>>> {
        let graph = cancellable(cancel, self.persistence.get_tax_rate(tenant, id)).await?;
        graph.map(|g| g.into_entity()).transpose()
    }

    /// Like [`get_by_id`](Self::get_by_id) but absence is an error.
    pub async fn get_existing(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Arc<TaxRate>> {
        self.get_by_id(tenant, id, cancel)
            .await?
            .ok_or_else(|| SyncError::not_found("TaxRate", id))
    }

    /// Stored rates of the tenant.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn list_for_tenant(
        &self,
        tenant: &TenantId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<TaxRate>>> {
        let graphs = cancellable(cancel, self.persistence.list_tax_rates(tenant)).await?;
        graphs.into_iter().map(|g| g.into_entity()).collect()
    }

    /// Every rate the partner currently defines.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn fetch_remote_all(
        &self,
        tenant: &TenantId,
        endpoint_id: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<TaxRate>>> {
        cancellable(cancel, async {
            let endpoint = stored_endpoint(self.persistence.as_ref(), tenant, endpoint_id).await?;
            let dtos: Vec<TaxRateDto> =
                partner::list_typed(self.partner.as_ref(), &endpoint, resources::TAX_RATES, &[])
                    .await?;
            debug!(count = dtos.len(), "Fetched partner tax rates");
            dtos.iter()
                .map(|dto| TaxRate::from_dto(dto, Some(endpoint.clone())))
                .collect()
        })
        .await
    }

    /// Store a new rate and return it as stored.
    #[instrument(skip(self, rate, cancel), fields(tenant_id = %tenant))]
    pub async fn create(
        &self,
        tenant: &TenantId,
        rate: Arc<TaxRate>,
        cancel: &CancellationToken,
    ) -> Result<Arc<TaxRate>> {
        check_owner(rate.endpoint(), tenant, "TaxRate")?;
        if let Some(id) = rate.local_id() {
            return Err(SyncError::validation(
                "local_id",
                format!("tax rate {} is already stored", id),
            ));
        }
        let write = TaxRateWrite::from_entity(&rate)?;

        let id = cancellable(
            cancel,
            self.persistence.insert_tax_rate(tenant, &write, &self.actor),
        )
        .await?;
        info!(tax_rate_id = id, code = %write.code, "Tax rate created");
        self.reload(tenant, id).await
    }

    /// Replace a stored rate.
    #[instrument(skip(self, rate, cancel), fields(tenant_id = %tenant))]
    pub async fn update(
        &self,
        tenant: &TenantId,
        rate: Arc<TaxRate>,
        cancel: &CancellationToken,
    ) -> Result<Arc<TaxRate>> {
        check_owner(rate.endpoint(), tenant, "TaxRate")?;
        let id = require_local_id(rate.local_id())?;
        let write = TaxRateWrite::from_entity(&rate)?;

        let updated = cancellable(
            cancel,
            self.persistence.update_tax_rate(tenant, id, &write, &self.actor),
        )
        .await?;
        if !updated {
            return Err(SyncError::not_found("TaxRate", id));
        }
        info!(tax_rate_id = id, "Tax rate updated");
        self.reload(tenant, id).await
    }

    /// Soft-delete a rate.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant))]
    pub async fn delete(
        &self,
        tenant: &TenantId,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let deleted = cancellable(
            cancel,
            self.persistence.soft_delete_tax_rate(tenant, id, &self.actor),
        )
        .await?;
        if !deleted {
            return Err(SyncError::not_found("TaxRate", id));
        }
        info!(tax_rate_id = id, "Tax rate deleted");
        Ok(())
    }

    async fn reload(&self, tenant: &TenantId, id: i64) -> Result<Arc<TaxRate>> {
        match self.persistence.get_tax_rate(tenant, id).await? {
            Some(graph) => graph.into_entity(),
            None => Err(SyncError::Invariant(format!(
                "tax rate {} vanished after write",
                id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::model::{Country, CountryContract, Endpoint, TaxRateContract, TaxRateData};
    use crate::partner::HttpTransport;
    use crate::persistence::SqlitePersistence;

    async fn setup(base_url: &str) -> (TaxRateRepository, Arc<SqlitePersistence>, Arc<Endpoint>) {
        let persistence = Arc::new(SqlitePersistence::in_memory().await.unwrap());
        let endpoint = persistence
            .save_endpoint(&TenantId::new("acme").unwrap(), "shop", base_url, Some("t0k"))
            .await
            .unwrap()
            .into_endpoint()
            .unwrap();
        let transport = HttpTransport::new(std::time::Duration::from_secs(5)).unwrap();
        let repo = TaxRateRepository::new(persistence.clone(), Arc::new(transport), "tester");
        (repo, persistence, Arc::new(endpoint))
    }

    fn vat(endpoint: &Arc<Endpoint>) -> Arc<TaxRate> {
        TaxRate::new(TaxRateData {
            endpoint: Some(endpoint.clone()),
            code: "PL-VAT-23".into(),
            rate_basis_points: 2300,
            country: Some(Country::new("pl", "Poland")),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_rates_are_scoped_to_tenant() {
        let (repo, persistence, endpoint) = setup("http://unused.test").await;
        let acme = TenantId::new("acme").unwrap();
        let globex = TenantId::new("globex").unwrap();
        persistence
            .save_endpoint(&globex, "other", "http://other.test", None)
            .await
            .unwrap();
        let cancel = CancellationToken::new();

        let stored = repo.create(&acme, vat(&endpoint), &cancel).await.unwrap();
        assert_eq!(stored.country().unwrap().iso_code(), "PL");

        assert_eq!(repo.list_for_tenant(&acme, &cancel).await.unwrap().len(), 1);
        assert!(repo.list_for_tenant(&globex, &cancel).await.unwrap().is_empty());

        let err = repo.create(&globex, vat(&endpoint), &cancel).await.unwrap_err();
        assert_eq!(err.error_code(), "TENANT_ISOLATION");
    }

    #[tokio::test]
    async fn test_update_then_delete() {
        let (repo, _, endpoint) = setup("http://unused.test").await;
        let acme = TenantId::new("acme").unwrap();
        let globex = TenantId::new("globex").unwrap();
        let cancel = CancellationToken::new();

        let stored = repo.create(&acme, vat(&endpoint), &cancel).await.unwrap();
        let id = stored.local_id().unwrap();
        let mut data = stored.data();
        data.rate_basis_points = 800;
        data.code = "PL-VAT-8".into();

        let updated = repo
            .update(&acme, TaxRate::new(data.clone()).unwrap(), &cancel)
            .await
            .unwrap();
        assert_eq!(updated.local_id(), Some(id));
        assert_eq!(updated.rate_basis_points(), 800);
        assert_eq!(updated.code(), "PL-VAT-8");

        // Another tenant can neither see nor remove the row
        let err = repo.delete(&globex, id, &cancel).await.unwrap_err();
        assert_eq!(err, SyncError::not_found("TaxRate", id));

        repo.delete(&acme, id, &cancel).await.unwrap();
        assert!(repo.get_by_id(&acme, id, &cancel).await.unwrap().is_none());
        let err = repo
            .update(&acme, TaxRate::new(data).unwrap(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::not_found("TaxRate", id));
    }

    #[tokio::test]
    async fn test_update_without_local_id_is_rejected() {
        let (repo, _, endpoint) = setup("http://unused.test").await;
        let err = repo
            .update(&TenantId::new("acme").unwrap(), vat(&endpoint), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_fetch_remote_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/taxRates"))
            .and(header("Authorization", "Bearer t0k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "1", "code": "PL-VAT-23", "rate": 23.0,
                     "tax_country": {"id": "PL", "full_name_english": "Poland"}},
                    {"id": "2", "code": "PL-VAT-8", "rate": 8}
                ]
            })))
            .mount(&server)
            .await;

        let (repo, _, endpoint) = setup(&server.uri()).await;
        let rates = repo
            .fetch_remote_all(&TenantId::new("acme").unwrap(), endpoint.id, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(*rates[0], *vat(&endpoint));
    }
}
