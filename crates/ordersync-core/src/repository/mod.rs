// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tenant-scoped repositories.
//!
//! Every operation takes the caller's [`TenantId`] and a
//! [`CancellationToken`]. Sources per operation:
//!
//! | Operation | Source | Consistency |
//! |-----------|--------|-------------|
//! | `get_by_id`, `get_existing`, `list_*` | local store | eventually consistent snapshot |
//! | `fetch_remote*` | partner REST API | authoritative |
//! | `create`, `update`, `delete` | local store | one transaction |
//! | `push_remote` | partner REST API | partner decides |
//!
//! Writes accept only canonical `Arc<T>` entities, so an un-normalized graph
//! cannot reach the store. A cancelled call returns [`SyncError::Cancelled`];
//! an interrupted write transaction is dropped and rolled back.

pub mod blocking;
mod customer;
mod order;
mod tax_rate;

pub use self::customer::CustomerRepository;
pub use self::order::OrderRepository;
pub use self::tax_rate::TaxRateRepository;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{Result, SyncError};
use crate::model::{Endpoint, TenantId};
use crate::persistence::Persistence;

/// Run `op` unless `cancel` fires first. Dropping `op` releases its
/// connection and rolls back any open transaction.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    op: impl Future<Output = Result<T>>,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        result = op => result,
    }
}

/// Refuse entities with no endpoint or with an endpoint of another tenant.
pub(crate) fn check_owner(
    endpoint: Option<&Arc<Endpoint>>,
    tenant: &TenantId,
    entity: &'static str,
) -> Result<()> {
    match endpoint {
        None => Err(SyncError::TenantIsolation {
            entity,
            reason: "entity has no endpoint and therefore no tenant".to_string(),
        }),
        Some(endpoint) if !endpoint.is_owned_by(tenant) => Err(SyncError::TenantIsolation {
            entity,
            reason: format!(
                "endpoint {} belongs to tenant '{}', not '{}'",
                endpoint.id, endpoint.tenant_id, tenant
            ),
        }),
        Some(_) => Ok(()),
    }
}

/// Load the stored endpoint of `tenant`. Partner calls always use the stored
/// base URL and token, never the copy carried by an entity.
pub(crate) async fn stored_endpoint(
    persistence: &dyn Persistence,
    tenant: &TenantId,
    endpoint_id: i64,
) -> Result<Arc<Endpoint>> {
    match persistence.get_endpoint(tenant, endpoint_id).await? {
        Some(record) => Ok(Arc::new(record.into_endpoint()?)),
        None => Err(SyncError::not_found("Endpoint", endpoint_id)),
    }
}

/// The local id an update or delete targets.
pub(crate) fn require_local_id(local_id: Option<i64>) -> Result<i64> {
    local_id.ok_or_else(|| SyncError::validation("local_id", "entity has not been stored yet"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn endpoint(tenant: &str) -> Arc<Endpoint> {
        Arc::new(Endpoint {
            id: 3,
            tenant_id: TenantId::new(tenant).unwrap(),
            name: "shop".into(),
            base_url: "http://localhost".into(),
            api_token: None,
        })
    }

    #[test]
    fn test_check_owner() {
        let acme = TenantId::new("acme").unwrap();
        assert!(check_owner(Some(&endpoint("acme")), &acme, "Customer").is_ok());

        let err = check_owner(Some(&endpoint("globex")), &acme, "Customer").unwrap_err();
        assert_eq!(err.error_code(), "TENANT_ISOLATION");

        let err = check_owner(None, &acme, "Order").unwrap_err();
        assert!(matches!(err, SyncError::TenantIsolation { entity: "Order", .. }));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = cancellable(&cancel, async { Ok(1) }).await;
        assert_eq!(result, Err(SyncError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pending_operation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = cancellable(&cancel, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(SyncError::Cancelled));
    }

    #[tokio::test]
    async fn test_uncancelled_operation_completes() {
        let cancel = CancellationToken::new();
        assert_eq!(cancellable(&cancel, async { Ok("done") }).await, Ok("done"));
    }
}
