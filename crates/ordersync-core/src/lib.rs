// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ordersync core - entity normalization and tenant-scoped repositories
//!
//! Every business entity (customer, address, order, tax rate) exists in three
//! shapes: a row in the local SQLite store, a canonical in-process object, and
//! a wire DTO exchanged with a partner's REST API. This crate keeps those
//! shapes consistent and exposes them through one CQRS-style surface.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Callers (UI, scheduled jobs)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Service Managers (service)                            │
//! │        CustomerManager · OrderManager · TaxRateManager → Outcome         │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │ Query / Command + Handler (cqrs)
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Tenant-scoped Repositories (repository)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                                              │
//!           │ local snapshot                               │ authoritative
//!           ▼                                              ▼
//! ┌───────────────────────┐                    ┌─────────────────────────────┐
//! │  SQLite (persistence) │                    │  Partner REST (partner)     │
//! └───────────────────────┘                    └─────────────────────────────┘
//!                                                          │ DTO (dto)
//!                                                          ▼
//!                                              ┌─────────────────────────────┐
//!                                              │  normalize → canonical      │
//!                                              │  entity (model)             │
//!                                              └─────────────────────────────┘
//! ```
//!
//! # Normalization
//!
//! Any implementation of an entity's contract trait (for example
//! [`model::CustomerContract`]) can be handed to a command. The handler runs
//! [`normalize::normalize`], which returns a canonical object unchanged and
//! deep-copies anything else exactly once per source object, even when the
//! source graph is cyclic (address → owning customer → default address).
//! Repositories accept only canonical `Arc<T>` values.
//!
//! # Result semantics
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | Found | success, payload |
//! | Not found | success, no payload (failure with `OBJECT_NOT_FOUND` when must-exist) |
//! | Invalid request | failure, `VALIDATION_ERROR` / `INVALID_ARGUMENT`, no I/O performed |
//! | Other tenant's data | invisible to reads; writes fail with `TENANT_ISOLATION` |
//! | Partner rejected | failure, `PARTNER_ERROR` with the partner's body verbatim |
//! | Cancelled | failure, `CANCELLED`, nothing committed |
//!
//! Nothing in this crate retries. [`error::SyncError::is_retryable`] tells the
//! caller whether a retry makes sense.
//!
//! # Configuration
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `ORDERSYNC_DATABASE_URL` | Yes | - | SQLite connection string |
//! | `ORDERSYNC_DB_MAX_CONNECTIONS` | No | `5` | Store pool size |
//! | `ORDERSYNC_PARTNER_TIMEOUT_MS` | No | `30000` | Partner request timeout |
//! | `ORDERSYNC_ACTOR` | No | `ordersync` | Audit actor for writes |

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Wire DTOs exchanged with partner REST APIs.
pub mod dto;

/// Result envelope returned to callers.
pub mod envelope;

/// Equality and hashing helpers behind the entity equality contract.
pub mod equality;

/// Error taxonomy with stable error codes.
pub mod error;

/// Canonical entities and their contract traits.
pub mod model;

/// Cycle-safe, identity-preserving normalization into canonical entities.
pub mod normalize;

/// Partner REST transport.
pub mod partner;

/// Local SQLite store.
pub mod persistence;

/// Tenant-scoped repositories and their blocking adapters.
pub mod repository;

/// Queries, commands and handlers.
pub mod cqrs;

/// Per-aggregate service managers.
pub mod service;

/// Tracing subscriber setup.
pub mod telemetry;

pub use config::Config;
pub use envelope::{CommandResult, Outcome, QueryResult};
pub use error::{Result, SyncError};
pub use service::{CustomerManager, OrderManager, Services, TaxRateManager};
