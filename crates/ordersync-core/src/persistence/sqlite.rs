// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed persistence implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::model::{Endpoint, TenantId};

use super::{
    AddressRecord, AddressWrite, CountryWrite, CustomerGraph, CustomerRecord, CustomerWrite,
    EndpointRecord, OrderGraph, OrderLineRecord, OrderLineWrite, OrderRecord, OrderWrite,
    Persistence, TaxRateGraph, TaxRateRecord, TaxRateWrite, endpoint_index,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Wrap an existing, already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect using [`Config`] and run migrations.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| SyncError::Database {
                operation: "connect".to_string(),
                details: e.to_string(),
            })?;
        Self::migrated(pool).await
    }

    /// Open (creating if needed) a database file and run migrations.
    ///
    /// ```ignore
    /// let persistence = SqlitePersistence::from_path(".data/ordersync.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::Database {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| SyncError::Database {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {:?}: {}", path, e),
            })?;
        Self::migrated(pool).await
    }

    /// A private in-memory database. One connection, so every caller sees
    /// the same data.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self> {
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }
}

// ============================================================================
// Connection-level helpers (shared by reads and writes inside one transaction)
// ============================================================================

async fn tenant_endpoints(
    conn: &mut SqliteConnection,
    tenant: &TenantId,
) -> Result<HashMap<i64, Arc<Endpoint>>> {
    let records = sqlx::query_as::<_, EndpointRecord>(
        r#"
        SELECT id, tenant_id, name, base_url, api_token
        FROM endpoints
        WHERE tenant_id = ?
        "#,
    )
    .bind(tenant.as_str())
    .fetch_all(&mut *conn)
    .await?;

    endpoint_index(records)
}

fn endpoint_for(
    endpoints: &HashMap<i64, Arc<Endpoint>>,
    endpoint_id: i64,
    entity: &'static str,
) -> Result<Arc<Endpoint>> {
    endpoints.get(&endpoint_id).cloned().ok_or_else(|| {
        SyncError::Invariant(format!(
            "{} row references endpoint {} outside the tenant",
            entity, endpoint_id
        ))
    })
}

async fn ensure_endpoint(
    conn: &mut SqliteConnection,
    tenant: &TenantId,
    endpoint_id: i64,
    entity: &'static str,
) -> Result<()> {
    let owned: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM endpoints
        WHERE id = ? AND tenant_id = ?
        "#,
    )
    .bind(endpoint_id)
    .bind(tenant.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    match owned {
        Some(_) => Ok(()),
        None => Err(SyncError::TenantIsolation {
            entity,
            reason: format!(
                "endpoint {} does not belong to tenant '{}'",
                endpoint_id, tenant
            ),
        }),
    }
}

async fn ensure_customer(
    conn: &mut SqliteConnection,
    tenant: &TenantId,
    customer_id: i64,
) -> Result<()> {
    let owned: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT c.id
        FROM customers c
        JOIN endpoints e ON e.id = c.endpoint_id
        WHERE c.id = ? AND e.tenant_id = ?
        "#,
    )
    .bind(customer_id)
    .bind(tenant.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    match owned {
        Some(_) => Ok(()),
        None => Err(SyncError::TenantIsolation {
            entity: "Order",
            reason: format!(
                "customer {} does not belong to tenant '{}'",
                customer_id, tenant
            ),
        }),
    }
}

/// Register the ISO code once. An existing row is left untouched: the name
/// that callers read back is the snapshot on their own row.
async fn register_country(conn: &mut SqliteConnection, country: &CountryWrite) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO countries (iso_code, name)
        VALUES (?, ?)
        ON CONFLICT(iso_code) DO NOTHING
        "#,
    )
    .bind(&country.iso_code)
    .bind(&country.name)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn customer_row(
    conn: &mut SqliteConnection,
    tenant: &TenantId,
    id: i64,
    include_deleted: bool,
) -> Result<Option<CustomerRecord>> {
    let record = sqlx::query_as::<_, CustomerRecord>(
        r#"
        SELECT c.id, c.remote_id, c.endpoint_id, c.email, c.first_name, c.last_name,
               c.sales_channels, c.has_address_book,
               c.created_at, c.created_by, c.modified_at, c.modified_by
        FROM customers c
        JOIN endpoints e ON e.id = c.endpoint_id
        WHERE c.id = ? AND e.tenant_id = ? AND (c.is_deleted = 0 OR ?)
        "#,
    )
    .bind(id)
    .bind(tenant.as_str())
    .bind(include_deleted)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(record)
}

async fn addresses_of(conn: &mut SqliteConnection, customer_id: i64) -> Result<Vec<AddressRecord>> {
    let records = sqlx::query_as::<_, AddressRecord>(
        r#"
        SELECT a.id, a.customer_id, a.remote_id, a.position, a.in_book, a.is_default,
               a.street, a.city, a.postcode, a.telephone, a.country_code, a.country_name
        FROM addresses a
        WHERE a.customer_id = ?
        ORDER BY a.position
        "#,
    )
    .bind(customer_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(records)
}

async fn load_customer(
    conn: &mut SqliteConnection,
    tenant: &TenantId,
    endpoints: &HashMap<i64, Arc<Endpoint>>,
    id: i64,
    include_deleted: bool,
) -> Result<Option<CustomerGraph>> {
    let Some(customer) = customer_row(conn, tenant, id, include_deleted).await? else {
        return Ok(None);
    };
    let endpoint = endpoint_for(endpoints, customer.endpoint_id, "Customer")?;
    let addresses = addresses_of(conn, customer.id).await?;
    Ok(Some(CustomerGraph {
        endpoint,
        customer,
        addresses,
    }))
}

async fn write_addresses(
    conn: &mut SqliteConnection,
    customer_id: i64,
    addresses: &[AddressWrite],
) -> Result<()> {
    sqlx::query("DELETE FROM addresses WHERE customer_id = ?")
        .bind(customer_id)
        .execute(&mut *conn)
        .await?;

    for address in addresses {
        if let Some(country) = &address.country {
            register_country(conn, country).await?;
        }
        sqlx::query(
            r#"
            INSERT INTO addresses (customer_id, remote_id, position, in_book, is_default,
                                   street, city, postcode, telephone, country_code,
                                   country_name)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(customer_id)
        .bind(&address.remote_id)
        .bind(address.position)
        .bind(address.in_book)
        .bind(address.is_default)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.postcode)
        .bind(&address.telephone)
        .bind(address.country.as_ref().map(|c| c.iso_code.as_str()))
        .bind(address.country.as_ref().map(|c| c.name.as_str()))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn write_lines(
    conn: &mut SqliteConnection,
    order_id: i64,
    lines: &[OrderLineWrite],
) -> Result<()> {
    sqlx::query("DELETE FROM order_lines WHERE order_id = ?")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    for (position, line) in lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_lines (order_id, position, sku, name, quantity, unit_price_minor)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order_id)
        .bind(position as i64)
        .bind(&line.sku)
        .bind(&line.name)
        .bind(line.quantity)
        .bind(line.unit_price_minor)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn lines_of(conn: &mut SqliteConnection, order_id: i64) -> Result<Vec<OrderLineRecord>> {
    let records = sqlx::query_as::<_, OrderLineRecord>(
        r#"
        SELECT order_id, position, sku, name, quantity, unit_price_minor
        FROM order_lines
        WHERE order_id = ?
        ORDER BY position
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(records)
}

async fn order_graph(
    conn: &mut SqliteConnection,
    tenant: &TenantId,
    endpoints: &HashMap<i64, Arc<Endpoint>>,
    order: OrderRecord,
) -> Result<OrderGraph> {
    let endpoint = endpoint_for(endpoints, order.endpoint_id, "Order")?;
    let lines = lines_of(conn, order.id).await?;
    // A soft-deleted customer still belongs to its historical orders
    let customer = match order.customer_id {
        Some(id) => load_customer(conn, tenant, endpoints, id, true).await?,
        None => None,
    };
    Ok(OrderGraph {
        endpoint,
        order,
        lines,
        customer,
    })
}

fn ship_country(order: &OrderWrite) -> Option<&CountryWrite> {
    order.shipping.as_ref().and_then(|s| s.country.as_ref())
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn save_endpoint(
        &self,
        tenant: &TenantId,
        name: &str,
        base_url: &str,
        api_token: Option<&str>,
    ) -> Result<EndpointRecord> {
        let record = sqlx::query_as::<_, EndpointRecord>(
            r#"
            INSERT INTO endpoints (tenant_id, name, base_url, api_token)
            VALUES (?, ?, ?, ?)
            RETURNING id, tenant_id, name, base_url, api_token
            "#,
        )
        .bind(tenant.as_str())
        .bind(name)
        .bind(base_url.trim_end_matches('/'))
        .bind(api_token)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_endpoint(&self, tenant: &TenantId, id: i64) -> Result<Option<EndpointRecord>> {
        let record = sqlx::query_as::<_, EndpointRecord>(
            r#"
            SELECT id, tenant_id, name, base_url, api_token
            FROM endpoints
            WHERE id = ? AND tenant_id = ?
            "#,
        )
        .bind(id)
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_customer(&self, tenant: &TenantId, id: i64) -> Result<Option<CustomerGraph>> {
        let mut tx = self.pool.begin().await?;
        let endpoints = tenant_endpoints(&mut tx, tenant).await?;
        let graph = load_customer(&mut tx, tenant, &endpoints, id, false).await?;
        tx.commit().await?;
        Ok(graph)
    }

    async fn list_customers(&self, tenant: &TenantId) -> Result<Vec<CustomerGraph>> {
        let mut tx = self.pool.begin().await?;
        let endpoints = tenant_endpoints(&mut tx, tenant).await?;

        let customers = sqlx::query_as::<_, CustomerRecord>(
            r#"
            SELECT c.id, c.remote_id, c.endpoint_id, c.email, c.first_name, c.last_name,
                   c.sales_channels, c.has_address_book,
                   c.created_at, c.created_by, c.modified_at, c.modified_by
            FROM customers c
            JOIN endpoints e ON e.id = c.endpoint_id
            WHERE e.tenant_id = ? AND c.is_deleted = 0
            ORDER BY c.id
            "#,
        )
        .bind(tenant.as_str())
        .fetch_all(&mut *tx)
        .await?;

        let addresses = sqlx::query_as::<_, AddressRecord>(
            r#"
            SELECT a.id, a.customer_id, a.remote_id, a.position, a.in_book, a.is_default,
                   a.street, a.city, a.postcode, a.telephone, a.country_code, a.country_name
            FROM addresses a
            JOIN customers c ON c.id = a.customer_id
            JOIN endpoints e ON e.id = c.endpoint_id
            WHERE e.tenant_id = ? AND c.is_deleted = 0
            ORDER BY a.customer_id, a.position
            "#,
        )
        .bind(tenant.as_str())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut by_customer: HashMap<i64, Vec<AddressRecord>> = HashMap::new();
        for address in addresses {
            by_customer.entry(address.customer_id).or_default().push(address);
        }

        let mut graphs = Vec::with_capacity(customers.len());
        for customer in customers {
            graphs.push(CustomerGraph {
                endpoint: endpoint_for(&endpoints, customer.endpoint_id, "Customer")?,
                addresses: by_customer.remove(&customer.id).unwrap_or_default(),
                customer,
            });
        }
        debug!(tenant_id = %tenant, count = graphs.len(), "Listed customers");
        Ok(graphs)
    }

    async fn insert_customer(
        &self,
        tenant: &TenantId,
        customer: &CustomerWrite,
        actor: &str,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        ensure_endpoint(&mut tx, tenant, customer.endpoint_id, "Customer").await?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO customers (remote_id, endpoint_id, email, first_name, last_name,
                                   sales_channels, has_address_book,
                                   created_at, created_by, modified_at, modified_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&customer.remote_id)
        .bind(customer.endpoint_id)
        .bind(&customer.email)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.sales_channels)
        .bind(customer.has_address_book)
        .bind(now)
        .bind(actor)
        .bind(now)
        .bind(actor)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        write_addresses(&mut tx, id, &customer.addresses).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn update_customer(
        &self,
        tenant: &TenantId,
        id: i64,
        customer: &CustomerWrite,
        actor: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        ensure_endpoint(&mut tx, tenant, customer.endpoint_id, "Customer").await?;

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET remote_id = ?, endpoint_id = ?, email = ?, first_name = ?, last_name = ?,
                sales_channels = ?, has_address_book = ?, modified_at = ?, modified_by = ?
            WHERE id = ? AND is_deleted = 0
              AND endpoint_id IN (SELECT id FROM endpoints WHERE tenant_id = ?)
            "#,
        )
        .bind(&customer.remote_id)
        .bind(customer.endpoint_id)
        .bind(&customer.email)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.sales_channels)
        .bind(customer.has_address_book)
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .bind(tenant.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        write_addresses(&mut tx, id, &customer.addresses).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn soft_delete_customer(&self, tenant: &TenantId, id: i64, actor: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET is_deleted = 1, modified_at = ?, modified_by = ?
            WHERE id = ? AND is_deleted = 0
              AND endpoint_id IN (SELECT id FROM endpoints WHERE tenant_id = ?)
            "#,
        )
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .bind(tenant.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_order(&self, tenant: &TenantId, id: i64) -> Result<Option<OrderGraph>> {
        let mut tx = self.pool.begin().await?;
        let endpoints = tenant_endpoints(&mut tx, tenant).await?;

        let record = sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT o.id, o.remote_id, o.endpoint_id, o.customer_id, o.order_number, o.placed_at,
                   o.status, o.currency, o.grand_total_minor, o.channel_type, o.channel_code,
                   o.ship_remote_id, o.ship_street, o.ship_city, o.ship_postcode,
                   o.ship_telephone, o.ship_country_code, o.ship_country_name,
                   o.has_lines, o.created_at, o.created_by, o.modified_at, o.modified_by
            FROM orders o
            JOIN endpoints e ON e.id = o.endpoint_id
            WHERE o.id = ? AND e.tenant_id = ? AND o.is_deleted = 0
            "#,
        )
        .bind(id)
        .bind(tenant.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let graph = match record {
            Some(order) => Some(order_graph(&mut tx, tenant, &endpoints, order).await?),
            None => None,
        };
        tx.commit().await?;
        Ok(graph)
    }

    async fn list_orders_in_range(
        &self,
        tenant: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OrderGraph>> {
        let mut tx = self.pool.begin().await?;
        let endpoints = tenant_endpoints(&mut tx, tenant).await?;

        let records = sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT o.id, o.remote_id, o.endpoint_id, o.customer_id, o.order_number, o.placed_at,
                   o.status, o.currency, o.grand_total_minor, o.channel_type, o.channel_code,
                   o.ship_remote_id, o.ship_street, o.ship_city, o.ship_postcode,
                   o.ship_telephone, o.ship_country_code, o.ship_country_name,
                   o.has_lines, o.created_at, o.created_by, o.modified_at, o.modified_by
            FROM orders o
            JOIN endpoints e ON e.id = o.endpoint_id
            WHERE e.tenant_id = ? AND o.is_deleted = 0
              AND o.placed_at >= ? AND o.placed_at < ?
            ORDER BY o.placed_at, o.id
            "#,
        )
        .bind(tenant.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(&mut *tx)
        .await?;

        let mut graphs = Vec::with_capacity(records.len());
        for order in records {
            graphs.push(order_graph(&mut tx, tenant, &endpoints, order).await?);
        }
        tx.commit().await?;

        debug!(tenant_id = %tenant, count = graphs.len(), "Listed orders in range");
        Ok(graphs)
    }

    async fn insert_order(
        &self,
        tenant: &TenantId,
        order: &OrderWrite,
        actor: &str,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        ensure_endpoint(&mut tx, tenant, order.endpoint_id, "Order").await?;
        if let Some(customer_id) = order.customer_id {
            ensure_customer(&mut tx, tenant, customer_id).await?;
        }
        if let Some(country) = ship_country(order) {
            register_country(&mut tx, country).await?;
        }

        let now = Utc::now();
        let shipping = order.shipping.as_ref();
        let result = sqlx::query(
            r#"
            INSERT INTO orders (remote_id, endpoint_id, customer_id, order_number, placed_at,
                                status, currency, grand_total_minor, channel_type, channel_code,
                                ship_remote_id, ship_street, ship_city, ship_postcode,
                                ship_telephone, ship_country_code, ship_country_name,
                                has_lines, created_at, created_by, modified_at, modified_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.remote_id)
        .bind(order.endpoint_id)
        .bind(order.customer_id)
        .bind(&order.order_number)
        .bind(order.placed_at)
        .bind(&order.status)
        .bind(&order.currency)
        .bind(order.grand_total_minor)
        .bind(&order.channel_type)
        .bind(&order.channel_code)
        .bind(shipping.and_then(|s| s.remote_id.as_deref()))
        .bind(shipping.map(|s| s.street.as_str()))
        .bind(shipping.map(|s| s.city.as_str()))
        .bind(shipping.map(|s| s.postcode.as_str()))
        .bind(shipping.and_then(|s| s.telephone.as_deref()))
        .bind(ship_country(order).map(|c| c.iso_code.as_str()))
        .bind(ship_country(order).map(|c| c.name.as_str()))
        .bind(order.has_lines)
        .bind(now)
        .bind(actor)
        .bind(now)
        .bind(actor)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        write_lines(&mut tx, id, &order.lines).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn update_order(
        &self,
        tenant: &TenantId,
        id: i64,
        order: &OrderWrite,
        actor: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        ensure_endpoint(&mut tx, tenant, order.endpoint_id, "Order").await?;
        if let Some(customer_id) = order.customer_id {
            ensure_customer(&mut tx, tenant, customer_id).await?;
        }
        if let Some(country) = ship_country(order) {
            register_country(&mut tx, country).await?;
        }

        let shipping = order.shipping.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET remote_id = ?, endpoint_id = ?, customer_id = ?, order_number = ?,
                placed_at = ?, status = ?, currency = ?, grand_total_minor = ?,
                channel_type = ?, channel_code = ?,
                ship_remote_id = ?, ship_street = ?, ship_city = ?, ship_postcode = ?,
                ship_telephone = ?, ship_country_code = ?, ship_country_name = ?,
                has_lines = ?,
                modified_at = ?, modified_by = ?
            WHERE id = ? AND is_deleted = 0
              AND endpoint_id IN (SELECT id FROM endpoints WHERE tenant_id = ?)
            "#,
        )
        .bind(&order.remote_id)
        .bind(order.endpoint_id)
        .bind(order.customer_id)
        .bind(&order.order_number)
        .bind(order.placed_at)
        .bind(&order.status)
        .bind(&order.currency)
        .bind(order.grand_total_minor)
        .bind(&order.channel_type)
        .bind(&order.channel_code)
        .bind(shipping.and_then(|s| s.remote_id.as_deref()))
        .bind(shipping.map(|s| s.street.as_str()))
        .bind(shipping.map(|s| s.city.as_str()))
        .bind(shipping.map(|s| s.postcode.as_str()))
        .bind(shipping.and_then(|s| s.telephone.as_deref()))
        .bind(ship_country(order).map(|c| c.iso_code.as_str()))
        .bind(ship_country(order).map(|c| c.name.as_str()))
        .bind(order.has_lines)
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .bind(tenant.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        write_lines(&mut tx, id, &order.lines).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn soft_delete_order(&self, tenant: &TenantId, id: i64, actor: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET is_deleted = 1, modified_at = ?, modified_by = ?
            WHERE id = ? AND is_deleted = 0
              AND endpoint_id IN (SELECT id FROM endpoints WHERE tenant_id = ?)
            "#,
        )
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .bind(tenant.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_tax_rate(&self, tenant: &TenantId, id: i64) -> Result<Option<TaxRateGraph>> {
        let mut tx = self.pool.begin().await?;
        let endpoints = tenant_endpoints(&mut tx, tenant).await?;

        let record = sqlx::query_as::<_, TaxRateRecord>(
            r#"
            SELECT t.id, t.remote_id, t.endpoint_id, t.code, t.rate_basis_points,
                   t.country_code, t.country_name,
                   t.created_at, t.created_by, t.modified_at, t.modified_by
            FROM tax_rates t
            JOIN endpoints e ON e.id = t.endpoint_id
            WHERE t.id = ? AND e.tenant_id = ? AND t.is_deleted = 0
            "#,
        )
        .bind(id)
        .bind(tenant.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        record
            .map(|rate| {
                Ok::<_, SyncError>(TaxRateGraph {
                    endpoint: endpoint_for(&endpoints, rate.endpoint_id, "TaxRate")?,
                    rate,
                })
            })
            .transpose()
    }

    async fn list_tax_rates(&self, tenant: &TenantId) -> Result<Vec<TaxRateGraph>> {
        let mut tx = self.pool.begin().await?;
        let endpoints = tenant_endpoints(&mut tx, tenant).await?;

        let records = sqlx::query_as::<_, TaxRateRecord>(
            r#"
            SELECT t.id, t.remote_id, t.endpoint_id, t.code, t.rate_basis_points,
                   t.country_code, t.country_name,
                   t.created_at, t.created_by, t.modified_at, t.modified_by
            FROM tax_rates t
            JOIN endpoints e ON e.id = t.endpoint_id
            WHERE e.tenant_id = ? AND t.is_deleted = 0
            ORDER BY t.code, t.id
            "#,
        )
        .bind(tenant.as_str())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        records
            .into_iter()
            .map(|rate| {
                Ok::<_, SyncError>(TaxRateGraph {
                    endpoint: endpoint_for(&endpoints, rate.endpoint_id, "TaxRate")?,
                    rate,
                })
            })
            .collect()
    }

    async fn insert_tax_rate(
        &self,
        tenant: &TenantId,
        rate: &TaxRateWrite,
        actor: &str,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        ensure_endpoint(&mut tx, tenant, rate.endpoint_id, "TaxRate").await?;
        if let Some(country) = &rate.country {
            register_country(&mut tx, country).await?;
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO tax_rates (remote_id, endpoint_id, code, rate_basis_points, country_code,
                                   country_name, created_at, created_by, modified_at,
                                   modified_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&rate.remote_id)
        .bind(rate.endpoint_id)
        .bind(&rate.code)
        .bind(rate.rate_basis_points)
        .bind(rate.country.as_ref().map(|c| c.iso_code.as_str()))
        .bind(rate.country.as_ref().map(|c| c.name.as_str()))
        .bind(now)
        .bind(actor)
        .bind(now)
        .bind(actor)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        tx.commit().await?;
        Ok(id)
    }

    async fn update_tax_rate(
        &self,
        tenant: &TenantId,
        id: i64,
        rate: &TaxRateWrite,
        actor: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        ensure_endpoint(&mut tx, tenant, rate.endpoint_id, "TaxRate").await?;
        if let Some(country) = &rate.country {
            register_country(&mut tx, country).await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE tax_rates
            SET remote_id = ?, endpoint_id = ?, code = ?, rate_basis_points = ?,
                country_code = ?, country_name = ?,
                modified_at = ?, modified_by = ?
            WHERE id = ? AND is_deleted = 0
              AND endpoint_id IN (SELECT id FROM endpoints WHERE tenant_id = ?)
            "#,
        )
        .bind(&rate.remote_id)
        .bind(rate.endpoint_id)
        .bind(&rate.code)
        .bind(rate.rate_basis_points)
        .bind(rate.country.as_ref().map(|c| c.iso_code.as_str()))
        .bind(rate.country.as_ref().map(|c| c.name.as_str()))
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .bind(tenant.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn soft_delete_tax_rate(&self, tenant: &TenantId, id: i64, actor: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE tax_rates
            SET is_deleted = 1, modified_at = ?, modified_by = ?
            WHERE id = ? AND is_deleted = 0
              AND endpoint_id IN (SELECT id FROM endpoints WHERE tenant_id = ?)
            "#,
        )
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .bind(tenant.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check_db(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::model::{
        AddressData, Country, CountryContract, Customer, CustomerData, DefaultAddress, EntityKey, Order, OrderData,
        OrderLine, OrderStatus, SalesChannel, TaxRate, TaxRateData,
    };

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");

        MIGRATOR.run(&pool).await.expect("Failed to run migrations");

        pool
    }

    async fn endpoint(p: &SqlitePersistence, tenant: &str) -> Arc<Endpoint> {
        let tenant = TenantId::new(tenant).unwrap();
        let record = p
            .save_endpoint(&tenant, "shop", "http://shop.test/", Some("token"))
            .await
            .unwrap();
        Arc::new(record.into_endpoint().unwrap())
    }

    fn tenant(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    fn customer(endpoint: &Arc<Endpoint>, email: &str) -> Arc<Customer> {
        Customer::assemble(
            CustomerData {
                key: EntityKey::remote("c-1"),
                endpoint: Some(endpoint.clone()),
                email: email.into(),
                first_name: "Anna".into(),
                last_name: "Nowak".into(),
                sales_channels: Some(vec![SalesChannel::new("website", "base")]),
                ..Default::default()
            },
            Some(vec![
                AddressData {
                    key: EntityKey::remote("a-1"),
                    street: "Długa 1".into(),
                    city: "Gdańsk".into(),
                    postcode: "80-001".into(),
                    telephone: None,
                    country: Some(Country::new("pl", "Poland")),
                },
                AddressData {
                    street: "Piotrkowska 10".into(),
                    city: "Łódź".into(),
                    postcode: "90-001".into(),
                    ..Default::default()
                },
            ]),
            DefaultAddress::Listed(0),
        )
        .unwrap()
    }

    fn order(endpoint: &Arc<Endpoint>, number: &str, placed_at: DateTime<Utc>) -> Arc<Order> {
        Order::new(OrderData {
            endpoint: Some(endpoint.clone()),
            order_number: number.into(),
            placed_at,
            status: OrderStatus::Pending,
            currency: "PLN".into(),
            grand_total_minor: 1_000,
            lines: Some(vec![OrderLine {
                sku: "MUG-01".into(),
                name: "Mug".into(),
                quantity: 1,
                unit_price_minor: 1_000,
            }]),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_endpoint_is_tenant_scoped() {
        let p = SqlitePersistence::new(test_pool().await);
        let ep = endpoint(&p, "acme").await;

        assert_eq!(ep.base_url, "http://shop.test");
        assert!(p.get_endpoint(&tenant("acme"), ep.id).await.unwrap().is_some());
        assert!(p.get_endpoint(&tenant("globex"), ep.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_customer_round_trip() {
        let p = SqlitePersistence::new(test_pool().await);
        let ep = endpoint(&p, "acme").await;
        let original = customer(&ep, "anna@example.com");

        let write = CustomerWrite::from_entity(&original).unwrap();
        let id = p.insert_customer(&tenant("acme"), &write, "tester").await.unwrap();

        let loaded = p
            .get_customer(&tenant("acme"), id)
            .await
            .unwrap()
            .unwrap()
            .into_entity()
            .unwrap();

        assert_eq!(*loaded, *original);
        assert_eq!(loaded.local_id(), Some(id));
        assert_eq!(loaded.remote_id(), Some("c-1"));
        let default = loaded.default_address().unwrap();
        assert!(Arc::ptr_eq(default, &loaded.addresses().unwrap()[0]));
        assert!(Arc::ptr_eq(&default.customer().unwrap(), &loaded));
    }

    #[tokio::test]
    async fn test_list_customers_is_tenant_isolated() {
        let p = SqlitePersistence::new(test_pool().await);
        let acme = endpoint(&p, "acme").await;
        let globex = endpoint(&p, "globex").await;

        for (ep, email) in [(&acme, "a1@acme.test"), (&acme, "a2@acme.test"), (&globex, "g@globex.test")] {
            let write = CustomerWrite::from_entity(&customer(ep, email)).unwrap();
            p.insert_customer(&ep.tenant_id, &write, "tester").await.unwrap();
        }

        let acme_rows = p.list_customers(&tenant("acme")).await.unwrap();
        let globex_rows = p.list_customers(&tenant("globex")).await.unwrap();

        assert_eq!(acme_rows.len(), 2);
        assert!(acme_rows.iter().all(|g| g.endpoint.tenant_id.as_str() == "acme"));
        assert_eq!(acme_rows[0].addresses.len(), 2);
        assert_eq!(globex_rows.len(), 1);
        assert_eq!(globex_rows[0].customer.email, "g@globex.test");
    }

    #[tokio::test]
    async fn test_insert_with_foreign_endpoint_is_refused() {
        let p = SqlitePersistence::new(test_pool().await);
        let globex = endpoint(&p, "globex").await;

        let write = CustomerWrite::from_entity(&customer(&globex, "x@globex.test")).unwrap();
        let err = p
            .insert_customer(&tenant("acme"), &write, "tester")
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "TENANT_ISOLATION");
        assert!(p.list_customers(&tenant("globex")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_addresses_and_respects_tenant() {
        let p = SqlitePersistence::new(test_pool().await);
        let ep = endpoint(&p, "acme").await;
        let write = CustomerWrite::from_entity(&customer(&ep, "anna@example.com")).unwrap();
        let id = p.insert_customer(&tenant("acme"), &write, "tester").await.unwrap();

        let mut data = customer(&ep, "anna@example.com").data();
        data.last_name = "Kowalska".into();
        let revised = Customer::assemble(data, Some(vec![]), DefaultAddress::None).unwrap();
        let write = CustomerWrite::from_entity(&revised).unwrap();

        let err = p
            .update_customer(&tenant("globex"), id, &write, "intruder")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "TENANT_ISOLATION");
        assert!(p.update_customer(&tenant("acme"), id, &write, "editor").await.unwrap());

        let graph = p.get_customer(&tenant("acme"), id).await.unwrap().unwrap();
        assert!(graph.addresses.is_empty());
        assert_eq!(graph.customer.modified_by, "editor");
        assert_eq!(graph.customer.created_by, "tester");

        let loaded = graph.into_entity().unwrap();
        assert_eq!(loaded.addresses().map(|a| a.len()), Some(0));
    }

    #[tokio::test]
    async fn test_update_missing_row_reports_false() {
        let p = SqlitePersistence::new(test_pool().await);
        let ep = endpoint(&p, "acme").await;
        let write = CustomerWrite::from_entity(&customer(&ep, "anna@example.com")).unwrap();
        assert!(!p.update_customer(&tenant("acme"), 999, &write, "tester").await.unwrap());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_customer() {
        let p = SqlitePersistence::new(test_pool().await);
        let ep = endpoint(&p, "acme").await;
        let write = CustomerWrite::from_entity(&customer(&ep, "anna@example.com")).unwrap();
        let id = p.insert_customer(&tenant("acme"), &write, "tester").await.unwrap();

        assert!(!p.soft_delete_customer(&tenant("globex"), id, "intruder").await.unwrap());
        assert!(p.soft_delete_customer(&tenant("acme"), id, "tester").await.unwrap());
        assert!(!p.soft_delete_customer(&tenant("acme"), id, "tester").await.unwrap());

        assert!(p.get_customer(&tenant("acme"), id).await.unwrap().is_none());
        assert!(p.list_customers(&tenant("acme")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orders_in_range_are_half_open_and_carry_customer() {
        let p = SqlitePersistence::new(test_pool().await);
        let ep = endpoint(&p, "acme").await;
        let cw = CustomerWrite::from_entity(&customer(&ep, "anna@example.com")).unwrap();
        let customer_id = p.insert_customer(&tenant("acme"), &cw, "tester").await.unwrap();
        let stored = p
            .get_customer(&tenant("acme"), customer_id)
            .await
            .unwrap()
            .unwrap()
            .into_entity()
            .unwrap();

        let day = |d: u32| Utc.with_ymd_and_hms(2025, 3, d, 12, 0, 0).unwrap();
        let mut writes = Vec::new();
        for (number, d) in [("1", 1), ("2", 2), ("3", 3)] {
            let mut data = order(&ep, number, day(d)).data();
            data.customer = Some(stored.clone());
            data.shipping_address = stored.default_address().cloned();
            writes.push(OrderWrite::from_entity(&Order::new(data)).unwrap());
        }
        for w in &writes {
            p.insert_order(&tenant("acme"), w, "tester").await.unwrap();
        }

        let found = p
            .list_orders_in_range(&tenant("acme"), day(1), day(3))
            .await
            .unwrap();
        let numbers: Vec<&str> = found.iter().map(|g| g.order.order_number.as_str()).collect();
        assert_eq!(numbers, vec!["1", "2"]);

        let first = found.into_iter().next().unwrap().into_entity().unwrap();
        assert_eq!(**first.customer().unwrap(), *stored);
        assert_eq!(
            first.shipping_address().unwrap().country().unwrap().iso_code(),
            "PL"
        );
        assert_eq!(first.data().lines.unwrap().len(), 1);

        assert!(
            p.list_orders_in_range(&tenant("globex"), day(1), day(3))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_order_with_foreign_customer_is_refused() {
        let p = SqlitePersistence::new(test_pool().await);
        let acme = endpoint(&p, "acme").await;
        let globex = endpoint(&p, "globex").await;
        let cw = CustomerWrite::from_entity(&customer(&globex, "g@globex.test")).unwrap();
        let foreign_id = p.insert_customer(&tenant("globex"), &cw, "tester").await.unwrap();

        let mut write = OrderWrite::from_entity(&order(&acme, "1", Utc::now())).unwrap();
        write.customer_id = Some(foreign_id);

        let err = p.insert_order(&tenant("acme"), &write, "tester").await.unwrap_err();
        assert_eq!(err.error_code(), "TENANT_ISOLATION");
    }

    #[tokio::test]
    async fn test_tax_rates_are_listed_per_tenant() {
        let p = SqlitePersistence::new(test_pool().await);
        let acme = endpoint(&p, "acme").await;
        let globex = endpoint(&p, "globex").await;

        for (ep, code) in [(&acme, "PL-VAT-23"), (&acme, "PL-VAT-8"), (&globex, "DE-VAT-19")] {
            let rate = TaxRate::new(TaxRateData {
                endpoint: Some(ep.clone()),
                code: code.into(),
                rate_basis_points: 2300,
                country: Some(Country::new("PL", "Poland")),
                ..Default::default()
            })
            .unwrap();
            let write = TaxRateWrite::from_entity(&rate).unwrap();
            p.insert_tax_rate(&ep.tenant_id, &write, "tester").await.unwrap();
        }

        let rates = p.list_tax_rates(&tenant("acme")).await.unwrap();
        assert_eq!(rates.len(), 2);
        let first = rates.into_iter().next().unwrap();
        let id = first.rate.id;
        assert_eq!(first.into_entity().unwrap().country().unwrap().name(), "Poland");

        assert!(p.get_tax_rate(&tenant("acme"), id).await.unwrap().is_some());
        assert!(p.get_tax_rate(&tenant("globex"), id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tax_rate_update_and_soft_delete_respect_tenant() {
        let p = SqlitePersistence::new(test_pool().await);
        let acme = endpoint(&p, "acme").await;
        let rate = |code: &str, bp: u32| {
            TaxRate::new(TaxRateData {
                endpoint: Some(acme.clone()),
                code: code.into(),
                rate_basis_points: bp,
                country: Some(Country::new("SK", "Slovakia")),
                ..Default::default()
            })
            .unwrap()
        };
        let write = TaxRateWrite::from_entity(&rate("SK-DPH-20", 2000)).unwrap();
        let id = p.insert_tax_rate(&tenant("acme"), &write, "tester").await.unwrap();

        let revised = TaxRateWrite::from_entity(&rate("SK-DPH-23", 2300)).unwrap();
        let err = p
            .update_tax_rate(&tenant("globex"), id, &revised, "intruder")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "TENANT_ISOLATION");
        assert!(!p.update_tax_rate(&tenant("acme"), id + 1, &revised, "editor").await.unwrap());
        assert!(p.update_tax_rate(&tenant("acme"), id, &revised, "editor").await.unwrap());

        let stored = p.get_tax_rate(&tenant("acme"), id).await.unwrap().unwrap();
        assert_eq!(stored.rate.code, "SK-DPH-23");
        assert_eq!(stored.rate.rate_basis_points, 2300);
        assert_eq!(stored.rate.modified_by, "editor");

        assert!(!p.soft_delete_tax_rate(&tenant("globex"), id, "intruder").await.unwrap());
        assert!(p.soft_delete_tax_rate(&tenant("acme"), id, "editor").await.unwrap());
        assert!(p.get_tax_rate(&tenant("acme"), id).await.unwrap().is_none());
        assert!(!p.soft_delete_tax_rate(&tenant("acme"), id, "editor").await.unwrap());
    }

    #[tokio::test]
    async fn test_country_name_is_a_per_row_snapshot() {
        let p = SqlitePersistence::new(test_pool().await);
        let acme = endpoint(&p, "acme").await;
        let globex = endpoint(&p, "globex").await;

        let mut ids = Vec::new();
        for (ep, name) in [(&acme, "Poland"), (&globex, "Hacked")] {
            let rate = TaxRate::new(TaxRateData {
                endpoint: Some(ep.clone()),
                code: "PL-VAT-23".into(),
                rate_basis_points: 2300,
                country: Some(Country::new("pl", name)),
                ..Default::default()
            })
            .unwrap();
            let write = TaxRateWrite::from_entity(&rate).unwrap();
            ids.push(p.insert_tax_rate(&ep.tenant_id, &write, "tester").await.unwrap());
        }

        let mine = p.get_tax_rate(&tenant("acme"), ids[0]).await.unwrap().unwrap();
        assert_eq!(mine.rate.country_code.as_deref(), Some("PL"));
        assert_eq!(mine.rate.country_name.as_deref(), Some("Poland"));
        let theirs = p.get_tax_rate(&tenant("globex"), ids[1]).await.unwrap().unwrap();
        assert_eq!(theirs.rate.country_name.as_deref(), Some("Hacked"));
    }

    #[tokio::test]
    async fn test_health_check_and_close() {
        let p = SqlitePersistence::new(test_pool().await);
        p.health_check_db().await.unwrap();
        p.close().await;
        assert!(p.health_check_db().await.is_err());
    }
}
