// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Customer queries and commands.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::envelope::{CommandResult, Outcome, QueryResult};
use crate::error::{Result, SyncError};
use crate::model::{Customer, CustomerContract, TenantId};
use crate::repository::CustomerRepository;

use super::{
    Command, CommandHandler, Query, QueryHandler, admit_command, admit_query, canonical,
    non_blank, positive_id, present,
};

// ============================================================================
// Requests
// ============================================================================

/// Read one stored customer.
#[derive(Debug, Clone)]
pub struct GetCustomerById {
    tenant: TenantId,
    id: i64,
    must_exist: bool,
}

impl GetCustomerById {
    /// Absence is an empty success.
    pub fn new(tenant: TenantId, id: i64) -> Self {
        Self {
            tenant,
            id,
            must_exist: false,
        }
    }

    /// Absence is a failure with [`SyncError::NotFound`].
    pub fn must_exist(mut self) -> Self {
        self.must_exist = true;
        self
    }

    /// Caller's tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Local id.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Whether absence is reported as a failure.
    pub fn requires_existence(&self) -> bool {
        self.must_exist
    }
}

impl Query for GetCustomerById {
    const NAME: &'static str = "GetCustomerById";
    type Output = Arc<Customer>;

    fn parameters(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("tenant_id", json!(self.tenant.as_str())),
            ("id", json!(self.id)),
            ("must_exist", json!(self.must_exist)),
        ])
    }

    fn validate(&self) -> Result<()> {
        positive_id("id", self.id)
    }
}

/// Every stored customer of a tenant.
#[derive(Debug, Clone)]
pub struct ListCustomersForTenant {
    tenant: TenantId,
}

impl ListCustomersForTenant {
    /// List for `tenant`.
    pub fn new(tenant: TenantId) -> Self {
        Self { tenant }
    }

    /// Caller's tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }
}

impl Query for ListCustomersForTenant {
    const NAME: &'static str = "ListCustomersForTenant";
    type Output = Vec<Arc<Customer>>;

    fn parameters(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("tenant_id", json!(self.tenant.as_str()))])
    }
}

/// Read a customer straight from the partner.
#[derive(Debug, Clone)]
pub struct FetchPartnerCustomer {
    tenant: TenantId,
    endpoint_id: i64,
    remote_id: String,
}

impl FetchPartnerCustomer {
    /// Ask endpoint `endpoint_id` for partner customer `remote_id`.
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

impl Query for FetchPartnerCustomer {
    const NAME: &'static str = "FetchPartnerCustomer";
    type Output = Arc<Customer>;

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

/// Store a customer: insert when it has no local id, replace otherwise.
/// Any [`CustomerContract`] implementation is accepted and normalized.
#[derive(Clone)]
pub struct SaveCustomer {
    tenant: TenantId,
    customer: Option<Arc<dyn CustomerContract>>,
}

impl SaveCustomer {
    /// Store `customer` for `tenant`. `None` fails validation.
    pub fn new(tenant: TenantId, customer: Option<Arc<dyn CustomerContract>>) -> Self {
        Self { tenant, customer }
    }

    /// Caller's tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// The customer to store.
    pub fn customer(&self) -> Option<&Arc<dyn CustomerContract>> {
        self.customer.as_ref()
    }
}

impl Command for SaveCustomer {
    const NAME: &'static str = "SaveCustomer";
    type Output = Arc<Customer>;

    fn parameters(&self) -> BTreeMap<&'static str, Value> {
        let key = self.customer.as_ref().map(|c| c.key());
        BTreeMap::from([
            ("tenant_id", json!(self.tenant.as_str())),
            ("local_id", json!(key.as_ref().and_then(|k| k.local_id))),
            ("remote_id", json!(key.and_then(|k| k.remote_id))),
        ])
    }

    fn validate(&self) -> Result<()> {
        present("customer", self.customer.as_ref())
    }
}

/// Soft-delete a stored customer.
#[derive(Debug, Clone)]
pub struct DeleteCustomer {
    tenant: TenantId,
    id: i64,
}

impl DeleteCustomer {
    /// Delete customer `id` of `tenant`.
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

impl Command for DeleteCustomer {
    const NAME: &'static str = "DeleteCustomer";
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

/// Send a customer to its partner endpoint.
#[derive(Clone)]
pub struct PushCustomerToPartner {
    tenant: TenantId,
    customer: Option<Arc<dyn CustomerContract>>,
}

impl PushCustomerToPartner {
    /// Send `customer` through `tenant`'s endpoint. `None` fails validation.
    pub fn new(tenant: TenantId, customer: Option<Arc<dyn CustomerContract>>) -> Self {
        Self { tenant, customer }
    }

    /// Caller's tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// The customer to send.
    pub fn customer(&self) -> Option<&Arc<dyn CustomerContract>> {
        self.customer.as_ref()
    }
}

impl Command for PushCustomerToPartner {
    const NAME: &'static str = "PushCustomerToPartner";
    type Output = Arc<Customer>;

    fn parameters(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("tenant_id", json!(self.tenant.as_str())),
            (
                "remote_id",
                json!(self.customer.as_ref().and_then(|c| c.key().remote_id)),
            ),
        ])
    }

    fn validate(&self) -> Result<()> {
        present("customer", self.customer.as_ref())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Handles [`GetCustomerById`].
pub struct GetCustomerByIdHandler {
    repository: CustomerRepository,
}

impl GetCustomerByIdHandler {
    pub(crate) fn new(repository: CustomerRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl QueryHandler<GetCustomerById> for GetCustomerByIdHandler {
    async fn handle(
        &self,
        query: GetCustomerById,
        cancel: &CancellationToken,
    ) -> QueryResult<Arc<Customer>> {
        if let Err(rejected) = admit_query(&query) {
            return rejected;
        }
        let result = self.repository.get_by_id(&query.tenant, query.id, cancel).await;
        if query.must_exist {
            Outcome::from_result(
                result.and_then(|c| c.ok_or_else(|| SyncError::not_found("Customer", query.id))),
            )
        } else {
            Outcome::from_optional(result)
        }
    }
}

/// Handles [`ListCustomersForTenant`].
pub struct ListCustomersForTenantHandler {
    repository: CustomerRepository,
}

impl ListCustomersForTenantHandler {
    pub(crate) fn new(repository: CustomerRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl QueryHandler<ListCustomersForTenant> for ListCustomersForTenantHandler {
    async fn handle(
        &self,
        query: ListCustomersForTenant,
        cancel: &CancellationToken,
    ) -> QueryResult<Vec<Arc<Customer>>> {
        if let Err(rejected) = admit_query(&query) {
            return rejected;
        }
        Outcome::from_result(self.repository.list_for_tenant(&query.tenant, cancel).await)
    }
}

/// Handles [`FetchPartnerCustomer`]. A partner 404 is an empty success.
pub struct FetchPartnerCustomerHandler {
    repository: CustomerRepository,
}

impl FetchPartnerCustomerHandler {
    pub(crate) fn new(repository: CustomerRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl QueryHandler<FetchPartnerCustomer> for FetchPartnerCustomerHandler {
    async fn handle(
        &self,
        query: FetchPartnerCustomer,
        cancel: &CancellationToken,
    ) -> QueryResult<Arc<Customer>> {
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

/// Handles [`SaveCustomer`].
pub struct SaveCustomerHandler {
    repository: CustomerRepository,
}

impl SaveCustomerHandler {
    pub(crate) fn new(repository: CustomerRepository) -> Self {
        Self { repository }
    }

    async fn save(&self, command: &SaveCustomer, cancel: &CancellationToken) -> Result<Arc<Customer>> {
        let customer = canonical::<Customer>("customer", command.customer.as_ref())?;
        if customer.local_id().is_some() {
            self.repository.update(&command.tenant, customer, cancel).await
        } else {
            self.repository.create(&command.tenant, customer, cancel).await
        }
    }
}

#[async_trait]
impl CommandHandler<SaveCustomer> for SaveCustomerHandler {
    async fn handle(
        &self,
        command: SaveCustomer,
        cancel: &CancellationToken,
    ) -> CommandResult<Arc<Customer>> {
        if let Err(rejected) = admit_command(&command) {
            return rejected;
        }
        Outcome::from_result(self.save(&command, cancel).await)
    }
}

/// Handles [`DeleteCustomer`].
pub struct DeleteCustomerHandler {
    repository: CustomerRepository,
}

impl DeleteCustomerHandler {
    pub(crate) fn new(repository: CustomerRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CommandHandler<DeleteCustomer> for DeleteCustomerHandler {
    async fn handle(&self, command: DeleteCustomer, cancel: &CancellationToken) -> CommandResult {
        if let Err(rejected) = admit_command(&command) {
            return rejected;
        }
        Outcome::from_result(self.repository.delete(&command.tenant, command.id, cancel).await)
    }
}

/// Handles [`PushCustomerToPartner`].
pub struct PushCustomerToPartnerHandler {
    repository: CustomerRepository,
}

impl PushCustomerToPartnerHandler {
    pub(crate) fn new(repository: CustomerRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CommandHandler<PushCustomerToPartner> for PushCustomerToPartnerHandler {
    async fn handle(
        &self,
        command: PushCustomerToPartner,
        cancel: &CancellationToken,
    ) -> CommandResult<Arc<Customer>> {
        if let Err(rejected) = admit_command(&command) {
            return rejected;
        }
        let result = match canonical::<Customer>("customer", command.customer.as_ref()) {
            Ok(customer) => self.repository.push_remote(&command.tenant, customer, cancel).await,
            Err(e) => Err(e),
        };
        Outcome::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{AddressContract, AuditInfo, Endpoint, EntityKey, SalesChannel};
    use crate::partner::HttpTransport;
    use crate::persistence::{Persistence, SqlitePersistence};

    /// A customer read from some other system.
    struct ImportedCustomer {
        endpoint: Arc<Endpoint>,
    }

    impl CustomerContract for ImportedCustomer {
        fn key(&self) -> EntityKey {
            EntityKey::remote("imp-1")
        }
        fn audit(&self) -> AuditInfo {
            AuditInfo::default()
        }
        fn endpoint(&self) -> Option<Arc<Endpoint>> {
            Some(self.endpoint.clone())
        }
        fn email(&self) -> &str {
            "imported@example.com"
        }
        fn first_name(&self) -> &str {
            "Iga"
        }
        fn last_name(&self) -> &str {
            "Zając"
        }
        fn sales_channels(&self) -> Option<&[SalesChannel]> {
            None
        }
        fn default_address(&self) -> Option<Arc<dyn AddressContract>> {
            None
        }
        fn addresses(&self) -> Option<Vec<Arc<dyn AddressContract>>> {
            Some(Vec::new())
        }
    }

    async fn setup() -> (CustomerRepository, TenantId, Arc<Endpoint>) {
        let persistence = Arc::new(SqlitePersistence::in_memory().await.unwrap());
        let tenant = TenantId::new("acme").unwrap();
        let endpoint = persistence
            .save_endpoint(&tenant, "shop", "http://unused.test", None)
            .await
            .unwrap()
            .into_endpoint()
            .unwrap();
        let transport = Arc::new(HttpTransport::new(std::time::Duration::from_secs(1)).unwrap());
        (
            CustomerRepository::new(persistence, transport, "handler-test"),
            tenant,
            Arc::new(endpoint),
        )
    }

    #[tokio::test]
    async fn test_save_normalizes_foreign_implementation() {
        let (repo, tenant, endpoint) = setup().await;
        let handler = SaveCustomerHandler::new(repo.clone());
        let cancel = CancellationToken::new();

        let outcome = handler
            .handle(
                SaveCustomer::new(tenant.clone(), Some(Arc::new(ImportedCustomer { endpoint }))),
                &cancel,
            )
            .await;
        assert!(outcome.is_success(), "{:?}", outcome.error());
        let saved = outcome.into_payload().unwrap();
        assert_eq!(saved.remote_id(), Some("imp-1"));
        assert_eq!(saved.addresses().map(<[_]>::len), Some(0));

        let get = GetCustomerByIdHandler::new(repo);
        let found = get
            .handle(GetCustomerById::new(tenant, saved.local_id().unwrap()), &cancel)
            .await;
        assert_eq!(found.payload().map(|c| c.email()), Some("imported@example.com"));
    }

    #[tokio::test]
    async fn test_save_without_payload_fails_before_io() {
        let (repo, tenant, _) = setup().await;
        repo.persistence().close().await;

        let outcome = SaveCustomerHandler::new(repo)
            .handle(
                SaveCustomer::new(tenant, None),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(outcome.error().unwrap().error_code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_get_absent_vs_must_exist() {
        let (repo, tenant, _) = setup().await;
        let handler = GetCustomerByIdHandler::new(repo);
        let cancel = CancellationToken::new();

        let absent = handler.handle(GetCustomerById::new(tenant.clone(), 9), &cancel).await;
        assert!(absent.is_success());
        assert!(absent.payload().is_none());

        let required = handler
            .handle(GetCustomerById::new(tenant, 9).must_exist(), &cancel)
            .await;
        assert_eq!(required.error(), Some(&SyncError::not_found("Customer", 9)));
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let (repo, tenant, _) = setup().await;
        let cancel = CancellationToken::new();

        let bad_id = GetCustomerByIdHandler::new(repo.clone())
            .handle(GetCustomerById::new(tenant.clone(), 0), &cancel)
            .await;
        assert_eq!(bad_id.error().unwrap().error_code(), "VALIDATION_ERROR");

        let blank = FetchPartnerCustomerHandler::new(repo.clone())
            .handle(
                FetchPartnerCustomer::new(tenant.clone(), 1, "   "),
                &cancel,
            )
            .await;
        assert_eq!(blank.error().unwrap().error_code(), "VALIDATION_ERROR");

        let delete = DeleteCustomerHandler::new(repo)
            .handle(DeleteCustomer::new(tenant, -3), &cancel)
            .await;
        assert!(!delete.is_success());
    }

    #[tokio::test]
    async fn test_repository_errors_become_failed_outcomes() {
        let (repo, tenant, _) = setup().await;
        let outcome = DeleteCustomerHandler::new(repo)
            .handle(DeleteCustomer::new(tenant, 77), &CancellationToken::new())
            .await;
        assert_eq!(outcome.error(), Some(&SyncError::not_found("Customer", 77)));
    }

    #[test]
    fn test_parameters() {
        let query = GetCustomerById::new(TenantId::new("acme").unwrap(), 5).must_exist();
        let params = query.parameters();
        assert_eq!(params["tenant_id"], "acme");
        assert_eq!(params["id"], 5);
        assert_eq!(params["must_exist"], true);
        assert!(query.requires_existence());
        assert_eq!(query.tenant().as_str(), "acme");
        assert_eq!(query.id(), 5);
    }
}
