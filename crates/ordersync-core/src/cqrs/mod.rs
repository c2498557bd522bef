// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Queries, commands and their handlers.
//!
//! A request is an immutable value naming what to read or write. Its handler
//! validates it before any I/O, normalizes contract payloads into canonical
//! entities, calls the repository and wraps the result (or error) in an
//! [`Outcome`]. Handlers are built by the service managers only.

pub mod customer;
pub mod order;
pub mod tax_rate;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::envelope::{CommandResult, Outcome, QueryResult};
use crate::error::{Result, SyncError};
use crate::normalize::{Canonical, normalize};

pub use self::customer::{
    DeleteCustomer, FetchPartnerCustomer, GetCustomerById, ListCustomersForTenant,
    PushCustomerToPartner, SaveCustomer,
};
pub use self::order::{
    DeleteOrder, FetchPartnerOrder, GetOrderById, GetOrdersInDateRange, PushOrderToPartner,
    SaveOrder,
};
pub use self::tax_rate::{DeleteTaxRate, ListTaxRatesForTenant, SaveTaxRate};

/// A read request.
pub trait Query: Send + Sync {
    /// Request name used in logs.
    const NAME: &'static str;
    /// Payload of a successful outcome.
    type Output: Send;

    /// Request parameters, for logs and job records.
    fn parameters(&self) -> BTreeMap<&'static str, Value>;

    /// Check the request before any I/O.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// A write request.
pub trait Command: Send + Sync {
    /// Request name used in logs.
    const NAME: &'static str;
    /// Payload of a successful outcome.
    type Output: Send;

    /// Request parameters, for logs and job records.
    fn parameters(&self) -> BTreeMap<&'static str, Value>;

    /// Check the request before any I/O.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Executes one query type.
#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    /// Validate and run `query`. Never panics on repository failure; every
    /// error is returned inside the outcome.
    async fn handle(&self, query: Q, cancel: &CancellationToken) -> QueryResult<Q::Output>;
}

/// Executes one command type.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    /// Validate and run `command`.
    async fn handle(&self, command: C, cancel: &CancellationToken) -> CommandResult<C::Output>;
}

/// Log and validate a query. `Err` holds the failed outcome to return.
pub(crate) fn admit_query<Q: Query>(query: &Q) -> std::result::Result<(), QueryResult<Q::Output>> {
    debug!(query = Q::NAME, parameters = ?query.parameters(), "Handling query");
    query.validate().map_err(Outcome::failed)
}

/// Log and validate a command. `Err` holds the failed outcome to return.
pub(crate) fn admit_command<C: Command>(
    command: &C,
) -> std::result::Result<(), CommandResult<C::Output>> {
    debug!(command = C::NAME, parameters = ?command.parameters(), "Handling command");
    command.validate().map_err(Outcome::failed)
}

pub(crate) fn positive_id(argument: &'static str, id: i64) -> Result<()> {
    if id <= 0 {
        return Err(SyncError::validation(argument, format!("must be positive, got {}", id)));
    }
    Ok(())
}

pub(crate) fn non_blank(argument: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SyncError::validation(argument, "must not be empty"));
    }
    Ok(())
}

pub(crate) fn present<T: ?Sized>(argument: &'static str, value: Option<&Arc<T>>) -> Result<()> {
    if value.is_none() {
        return Err(SyncError::InvalidArgument {
            argument,
            message: "must not be None".to_string(),
        });
    }
    Ok(())
}

/// Normalize a validated, present payload.
pub(crate) fn canonical<T: Canonical>(
    argument: &'static str,
    payload: Option<&Arc<T::Contract>>,
) -> Result<Arc<T>> {
    normalize::<T>(payload)?.ok_or(SyncError::InvalidArgument {
        argument,
        message: "must not be None".to_string(),
    })
}
