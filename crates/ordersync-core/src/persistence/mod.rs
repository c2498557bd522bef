// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Local store records and the persistence interface.
//!
//! Records are the store-side representation of each entity. `*Graph` types
//! bundle a row with the rows it owns and its endpoint, and convert into the
//! canonical entity; `*Write` types are built from a canonical entity and
//! carry exactly what an insert or update writes.

pub mod sqlite;

pub use self::sqlite::SqlitePersistence;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::dto::SalesChannelDto;
use crate::error::{Result, SyncError};
use crate::model::{
    Address, AddressData, AuditInfo, Country, Customer, CustomerData, DefaultAddress, Endpoint,
    EntityKey, Order, OrderData, OrderLine, SalesChannel, TaxRate, TaxRateData, TenantId,
};

// ============================================================================
// Records
// ============================================================================

/// Endpoint row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EndpointRecord {
    /// Primary key.
    pub id: i64,
    /// Owning tenant.
    pub tenant_id: String,
    /// Display name.
    pub name: String,
    /// Partner REST base URL.
    pub base_url: String,
    /// Bearer token.
    pub api_token: Option<String>,
}

impl EndpointRecord {
    /// Convert into the configuration object entities reference.
    pub fn into_endpoint(self) -> Result<Endpoint> {
        Ok(Endpoint {
            id: self.id,
            tenant_id: TenantId::new(&self.tenant_id)?,
            name: self.name,
            base_url: self.base_url,
            api_token: self.api_token,
        })
    }
}

/// Customer row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRecord {
    /// Primary key.
    pub id: i64,
    /// Partner key.
    pub remote_id: Option<String>,
    /// Endpoint the customer belongs to.
    pub endpoint_id: i64,
    /// Login email.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// JSON-encoded sales channel list.
    pub sales_channels: Option<String>,
    /// Whether the address book is known.
    pub has_address_book: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Creating actor.
    pub created_by: String,
    /// Last write time.
    pub modified_at: DateTime<Utc>,
    /// Last writing actor.
    pub modified_by: String,
}

/// Address row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AddressRecord {
    /// Primary key.
    pub id: i64,
    /// Owning customer.
    pub customer_id: i64,
    /// Partner key.
    pub remote_id: Option<String>,
    /// Position in the address book.
    pub position: i64,
    /// Whether the row is an address book entry.
    pub in_book: bool,
    /// Whether the row is the default address.
    pub is_default: bool,
    /// Street line.
    pub street: String,
    /// City.
    pub city: String,
    /// Postal code.
    pub postcode: String,
    /// Contact phone.
    pub telephone: Option<String>,
    /// Country ISO code.
    pub country_code: Option<String>,
    /// Country name as written with this row.
    pub country_name: Option<String>,
}

/// Order row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRecord {
    /// Primary key.
    pub id: i64,
    /// Partner key.
    pub remote_id: Option<String>,
    /// Endpoint the order belongs to.
    pub endpoint_id: i64,
    /// Ordering customer.
    pub customer_id: Option<i64>,
    /// Order number.
    pub order_number: String,
    /// Placement time.
    pub placed_at: DateTime<Utc>,
    /// Status spelling.
    pub status: String,
    /// Currency code.
    pub currency: String,
    /// Grand total in minor units.
    pub grand_total_minor: i64,
    /// Sales channel type.
    pub channel_type: Option<String>,
    /// Sales channel code.
    pub channel_code: Option<String>,
    /// Ship-to partner key.
    pub ship_remote_id: Option<String>,
    /// Ship-to street; `None` when there is no ship-to address.
    pub ship_street: Option<String>,
    /// Ship-to city.
    pub ship_city: Option<String>,
    /// Ship-to postal code.
    pub ship_postcode: Option<String>,
    /// Ship-to phone.
    pub ship_telephone: Option<String>,
    /// Ship-to country code.
    pub ship_country_code: Option<String>,
    /// Ship-to country name as written with this row.
    pub ship_country_name: Option<String>,
    /// Whether the line list is known.
    pub has_lines: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Creating actor.
    pub created_by: String,
    /// Last write time.
    pub modified_at: DateTime<Utc>,
    /// Last writing actor.
    pub modified_by: String,
}

/// Order line row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderLineRecord {
    /// Owning order.
    pub order_id: i64,
    /// Position within the order.
    pub position: i64,
    /// SKU.
    pub sku: String,
    /// Product name.
    pub name: String,
    /// Quantity.
    pub quantity: i64,
    /// Unit price in minor units.
    pub unit_price_minor: i64,
}

/// Tax rate row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaxRateRecord {
    /// Primary key.
    pub id: i64,
    /// Partner key.
    pub remote_id: Option<String>,
    /// Endpoint the rate belongs to.
    pub endpoint_id: i64,
    /// Rate code.
    pub code: String,
    /// Rate in hundredths of a percent.
    pub rate_basis_points: i64,
    /// Country ISO code.
    pub country_code: Option<String>,
    /// Country name as written with this row.
    pub country_name: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Creating actor.
    pub created_by: String,
    /// Last write time.
    pub modified_at: DateTime<Utc>,
    /// Last writing actor.
    pub modified_by: String,
}

// ============================================================================
// Graphs (read side)
// ============================================================================

/// A customer row with its endpoint and address rows.
#[derive(Debug, Clone)]
pub struct CustomerGraph {
    /// The customer's endpoint.
    pub endpoint: Arc<Endpoint>,
    /// The customer row.
    pub customer: CustomerRecord,
    /// Address rows ordered by position.
    pub addresses: Vec<AddressRecord>,
}

/// An order row with its endpoint, lines and customer.
#[derive(Debug, Clone)]
pub struct OrderGraph {
    /// The order's endpoint.
    pub endpoint: Arc<Endpoint>,
    /// The order row.
    pub order: OrderRecord,
    /// Line rows ordered by position.
    pub lines: Vec<OrderLineRecord>,
    /// The ordering customer, soft-deleted or not.
    pub customer: Option<CustomerGraph>,
}

/// A tax rate row with its endpoint.
#[derive(Debug, Clone)]
pub struct TaxRateGraph {
    /// The rate's endpoint.
    pub endpoint: Arc<Endpoint>,
    /// The rate row.
    pub rate: TaxRateRecord,
}

fn audit(
    created_at: DateTime<Utc>,
    created_by: &str,
    modified_at: DateTime<Utc>,
    modified_by: &str,
) -> AuditInfo {
    AuditInfo {
        created_at: Some(created_at),
        created_by: Some(created_by.to_string()),
        modified_at: Some(modified_at),
        modified_by: Some(modified_by.to_string()),
    }
}

fn country(code: Option<&str>, name: Option<&str>) -> Option<Arc<Country>> {
    code.map(|code| Country::new(code, name.unwrap_or_default()))
}

fn address_data(row: &AddressRecord) -> AddressData {
    AddressData {
        key: EntityKey {
            local_id: Some(row.id),
            remote_id: row.remote_id.clone(),
        },
        street: row.street.clone(),
        city: row.city.clone(),
        postcode: row.postcode.clone(),
        telephone: row.telephone.clone(),
        country: country(row.country_code.as_deref(), row.country_name.as_deref()),
    }
}

impl CustomerGraph {
    /// Assemble the canonical customer, with its address book and default
    /// address linked back to it.
    pub fn into_entity(self) -> Result<Arc<Customer>> {
        let record = self.customer;
        let sales_channels = record
            .sales_channels
            .as_deref()
            .map(serde_json::from_str::<Vec<SalesChannelDto>>)
            .transpose()?
            .map(|list| list.iter().map(SalesChannel::from_dto).collect());

        let book_rows: Vec<&AddressRecord> = self.addresses.iter().filter(|a| a.in_book).collect();
        let default = match self.addresses.iter().find(|a| a.is_default) {
            None => DefaultAddress::None,
            Some(row) if row.in_book => match book_rows.iter().position(|b| b.id == row.id) {
                Some(index) => DefaultAddress::Listed(index),
                None => {
                    return Err(SyncError::Invariant(format!(
                        "default address {} missing from the book of customer {}",
                        row.id, record.id
                    )));
                }
            },
            Some(row) => DefaultAddress::Separate(address_data(row)),
        };
        let book = record
            .has_address_book
            .then(|| book_rows.iter().map(|row| address_data(row)).collect());

        Customer::assemble(
            CustomerData {
                key: EntityKey {
                    local_id: Some(record.id),
                    remote_id: record.remote_id,
                },
                audit: audit(
                    record.created_at,
                    &record.created_by,
                    record.modified_at,
                    &record.modified_by,
                ),
                endpoint: Some(self.endpoint),
                email: record.email,
                first_name: record.first_name,
                last_name: record.last_name,
                sales_channels,
            },
            book,
            default,
        )
    }
}

impl OrderGraph {
    /// Build the canonical order, including its customer graph.
    pub fn into_entity(self) -> Result<Arc<Order>> {
        let record = self.order;
        let customer = self.customer.map(CustomerGraph::into_entity).transpose()?;

        let sales_channel = match (record.channel_type, record.channel_code) {
            (Some(kind), Some(code)) => Some(SalesChannel::new(kind, code)),
            _ => None,
        };

        let shipping_address = match record.ship_street {
            Some(street) => Some(Address::new(AddressData {
                key: EntityKey {
                    local_id: None,
                    remote_id: record.ship_remote_id,
                },
                street,
                city: record.ship_city.unwrap_or_default(),
                postcode: record.ship_postcode.unwrap_or_default(),
                telephone: record.ship_telephone,
                country: country(
                    record.ship_country_code.as_deref(),
                    record.ship_country_name.as_deref(),
                ),
            })),
            None => None,
        };

        let lines = if record.has_lines {
            let mut lines = Vec::with_capacity(self.lines.len());
            for row in self.lines {
                let quantity = u32::try_from(row.quantity).map_err(|_| {
                    SyncError::Invariant(format!(
                        "order {} line {} has quantity {}",
                        record.id, row.position, row.quantity
                    ))
                })?;
                lines.push(OrderLine {
                    sku: row.sku,
                    name: row.name,
                    quantity,
                    unit_price_minor: row.unit_price_minor,
                });
            }
            Some(lines)
        } else {
            None
        };

        Ok(Order::new(OrderData {
            key: EntityKey {
                local_id: Some(record.id),
                remote_id: record.remote_id,
            },
            audit: audit(
                record.created_at,
                &record.created_by,
                record.modified_at,
                &record.modified_by,
            ),
            endpoint: Some(self.endpoint),
            order_number: record.order_number,
            placed_at: record.placed_at,
            status: record.status.parse()?,
            currency: record.currency,
            grand_total_minor: record.grand_total_minor,
            sales_channel,
            customer,
            shipping_address,
            lines,
        }))
    }
}

impl TaxRateGraph {
    /// Build the canonical tax rate.
    pub fn into_entity(self) -> Result<Arc<TaxRate>> {
        let record = self.rate;
        let rate_basis_points = u32::try_from(record.rate_basis_points).map_err(|_| {
            SyncError::Invariant(format!(
                "tax rate {} has rate {}",
                record.id, record.rate_basis_points
            ))
        })?;

        TaxRate::new(TaxRateData {
            key: EntityKey {
                local_id: Some(record.id),
                remote_id: record.remote_id,
            },
            audit: audit(
                record.created_at,
                &record.created_by,
                record.modified_at,
                &record.modified_by,
            ),
            endpoint: Some(self.endpoint),
            code: record.code,
            rate_basis_points,
            country: country(record.country_code.as_deref(), record.country_name.as_deref()),
        })
    }
}

// ============================================================================
// Writes
// ============================================================================

fn endpoint_of(endpoint: Option<&Arc<Endpoint>>, entity: &'static str) -> Result<i64> {
    endpoint
        .map(|e| e.id)
        .ok_or_else(|| SyncError::TenantIsolation {
            entity,
            reason: "entity has no endpoint and therefore no tenant".to_string(),
        })
}

/// Country reference written alongside an address or rate. Codes are stored
/// upper-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryWrite {
    /// ISO code.
    pub iso_code: String,
    /// English name.
    pub name: String,
}

impl CountryWrite {
    fn from_entity(country: &Country) -> Self {
        use crate::model::CountryContract;
        Self {
            iso_code: country.iso_code().trim().to_uppercase(),
            name: country.name().to_string(),
        }
    }
}

/// One address row to write.
#[derive(Debug, Clone)]
pub struct AddressWrite {
    /// Partner key.
    pub remote_id: Option<String>,
    /// Position in the book.
    pub position: i64,
    /// Whether the row is a book entry.
    pub in_book: bool,
    /// Whether the row is the default address.
    pub is_default: bool,
    /// Street line.
    pub street: String,
    /// City.
    pub city: String,
    /// Postal code.
    pub postcode: String,
    /// Contact phone.
    pub telephone: Option<String>,
    /// Country.
    pub country: Option<CountryWrite>,
}

impl AddressWrite {
    fn from_entity(address: &Address, position: i64, in_book: bool, is_default: bool) -> Self {
        let data = address.data();
        Self {
            remote_id: data.key.remote_id,
            position,
            in_book,
            is_default,
            street: data.street,
            city: data.city,
            postcode: data.postcode,
            telephone: data.telephone,
            country: data.country.as_deref().map(CountryWrite::from_entity),
        }
    }
}

/// Everything a customer insert or update writes.
#[derive(Debug, Clone)]
pub struct CustomerWrite {
    /// Partner key.
    pub remote_id: Option<String>,
    /// Endpoint.
    pub endpoint_id: i64,
    /// Login email.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// JSON-encoded sales channels.
    pub sales_channels: Option<String>,
    /// Whether the address book is known.
    pub has_address_book: bool,
    /// Address rows, replacing any existing ones.
    pub addresses: Vec<AddressWrite>,
}

impl CustomerWrite {
    /// Flatten a canonical customer. Fails when it has no endpoint.
    pub fn from_entity(customer: &Customer) -> Result<Self> {
        let endpoint_id = endpoint_of(customer.endpoint(), "Customer")?;
        let data = customer.data();

        let sales_channels = data
            .sales_channels
            .as_ref()
            .map(|list| {
                let dtos: Vec<SalesChannelDto> = list.iter().map(SalesChannel::to_dto).collect();
                serde_json::to_string(&dtos)
            })
            .transpose()?;

        let default = customer.default_address();
        let book = customer.addresses();
        let mut addresses: Vec<AddressWrite> = book
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let is_default = default.is_some_and(|d| Arc::ptr_eq(d, a));
                AddressWrite::from_entity(a, i as i64, true, is_default)
            })
            .collect();
        if let Some(d) = default
            && !addresses.iter().any(|a| a.is_default)
        {
            addresses.push(AddressWrite::from_entity(d, addresses.len() as i64, false, true));
        }

        Ok(Self {
            remote_id: data.key.remote_id,
            endpoint_id,
            email: data.email,
            first_name: data.first_name,
            last_name: data.last_name,
            sales_channels,
            has_address_book: book.is_some(),
            addresses,
        })
    }
}

/// One order line row to write.
#[derive(Debug, Clone)]
pub struct OrderLineWrite {
    /// SKU.
    pub sku: String,
    /// Product name.
    pub name: String,
    /// Quantity.
    pub quantity: i64,
    /// Unit price in minor units.
    pub unit_price_minor: i64,
}

/// Everything an order insert or update writes.
#[derive(Debug, Clone)]
pub struct OrderWrite {
    /// Partner key.
    pub remote_id: Option<String>,
    /// Endpoint.
    pub endpoint_id: i64,
    /// Ordering customer's local id.
    pub customer_id: Option<i64>,
    /// Order number.
    pub order_number: String,
    /// Placement time.
    pub placed_at: DateTime<Utc>,
    /// Status spelling.
    pub status: String,
    /// Currency code.
    pub currency: String,
    /// Grand total in minor units.
    pub grand_total_minor: i64,
    /// Sales channel type.
    pub channel_type: Option<String>,
    /// Sales channel code.
    pub channel_code: Option<String>,
    /// Ship-to address snapshot.
    pub shipping: Option<AddressWrite>,
    /// Whether the line list is known.
    pub has_lines: bool,
    /// Line rows, replacing any existing ones.
    pub lines: Vec<OrderLineWrite>,
}

impl OrderWrite {
    /// Flatten a canonical order. Its customer, if any, must already be
    /// stored.
    pub fn from_entity(order: &Order) -> Result<Self> {
        let endpoint_id = endpoint_of(order.endpoint(), "Order")?;
        let data = order.data();

        let customer_id = match order.customer() {
            Some(customer) => Some(customer.local_id().ok_or_else(|| {
                SyncError::validation("customer", "must be stored before an order references it")
            })?),
            None => None,
        };

        Ok(Self {
            remote_id: data.key.remote_id,
            endpoint_id,
            customer_id,
            order_number: data.order_number,
            placed_at: data.placed_at,
            status: data.status.as_str().to_string(),
            currency: data.currency,
            grand_total_minor: data.grand_total_minor,
            channel_type: data.sales_channel.as_ref().map(|c| c.kind().to_string()),
            channel_code: data.sales_channel.as_ref().map(|c| c.code().to_string()),
            shipping: order
                .shipping_address()
                .map(|a| AddressWrite::from_entity(a, 0, false, false)),
            has_lines: data.lines.is_some(),
            lines: data
                .lines
                .unwrap_or_default()
                .into_iter()
                .map(|l| OrderLineWrite {
                    sku: l.sku,
                    name: l.name,
                    quantity: i64::from(l.quantity),
                    unit_price_minor: l.unit_price_minor,
                })
                .collect(),
        })
    }
}

/// Everything a tax rate insert writes.
#[derive(Debug, Clone)]
pub struct TaxRateWrite {
    /// Partner key.
    pub remote_id: Option<String>,
    /// Endpoint.
    pub endpoint_id: i64,
    /// Rate code.
    pub code: String,
    /// Rate in hundredths of a percent.
    pub rate_basis_points: i64,
    /// Country.
    pub country: Option<CountryWrite>,
}

impl TaxRateWrite {
    /// Flatten a canonical tax rate.
    pub fn from_entity(rate: &TaxRate) -> Result<Self> {
        use crate::model::TaxRateContract;
        Ok(Self {
            remote_id: rate.remote_id().map(str::to_string),
            endpoint_id: endpoint_of(rate.endpoint(), "TaxRate")?,
            code: rate.code().to_string(),
            rate_basis_points: i64::from(rate.rate_basis_points()),
            country: rate.country().map(|c| CountryWrite::from_entity(c)),
        })
    }
}

/// Share one `Arc<Endpoint>` per endpoint id across a multi-row read.
pub(crate) fn endpoint_index(records: Vec<EndpointRecord>) -> Result<HashMap<i64, Arc<Endpoint>>> {
    records
        .into_iter()
        .map(|r| Ok::<_, SyncError>((r.id, Arc::new(r.into_endpoint()?))))
        .collect()
}

// ============================================================================
// Interface
// ============================================================================

/// Store interface used by the repositories.
///
/// Every read takes the caller's tenant and filters by it in SQL. Every write
/// runs in a single transaction that first checks the endpoint belongs to the
/// tenant.
#[allow(missing_docs)]
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn save_endpoint(
        &self,
        tenant: &TenantId,
        name: &str,
        base_url: &str,
        api_token: Option<&str>,
    ) -> Result<EndpointRecord>;

    async fn get_endpoint(&self, tenant: &TenantId, id: i64) -> Result<Option<EndpointRecord>>;

    async fn get_customer(&self, tenant: &TenantId, id: i64) -> Result<Option<CustomerGraph>>;

    async fn list_customers(&self, tenant: &TenantId) -> Result<Vec<CustomerGraph>>;

    /// Returns the new row id.
    async fn insert_customer(
        &self,
        tenant: &TenantId,
        customer: &CustomerWrite,
        actor: &str,
    ) -> Result<i64>;

    /// Returns `false` when no live row of the tenant has this id.
    async fn update_customer(
        &self,
        tenant: &TenantId,
        id: i64,
        customer: &CustomerWrite,
        actor: &str,
    ) -> Result<bool>;

    /// Returns `false` when no live row of the tenant has this id.
    async fn soft_delete_customer(&self, tenant: &TenantId, id: i64, actor: &str) -> Result<bool>;

    async fn get_order(&self, tenant: &TenantId, id: i64) -> Result<Option<OrderGraph>>;

    /// Orders placed in `[from, to)`, oldest first.
    async fn list_orders_in_range(
        &self,
        tenant: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OrderGraph>>;

    async fn insert_order(&self, tenant: &TenantId, order: &OrderWrite, actor: &str)
    -> Result<i64>;

    async fn update_order(
        &self,
        tenant: &TenantId,
        id: i64,
        order: &OrderWrite,
        actor: &str,
    ) -> Result<bool>;

    async fn soft_delete_order(&self, tenant: &TenantId, id: i64, actor: &str) -> Result<bool>;

    async fn get_tax_rate(&self, tenant: &TenantId, id: i64) -> Result<Option<TaxRateGraph>>;

    async fn list_tax_rates(&self, tenant: &TenantId) -> Result<Vec<TaxRateGraph>>;

    async fn insert_tax_rate(
        &self,
        tenant: &TenantId,
        rate: &TaxRateWrite,
        actor: &str,
    ) -> Result<i64>;

    /// Returns `false` when no live row of the tenant has this id.
    async fn update_tax_rate(
        &self,
        tenant: &TenantId,
        id: i64,
        rate: &TaxRateWrite,
        actor: &str,
    ) -> Result<bool>;

    async fn soft_delete_tax_rate(&self, tenant: &TenantId, id: i64, actor: &str) -> Result<bool>;

    async fn health_check_db(&self) -> Result<()>;

    /// Close the pool. Later calls fail.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomerContract, DefaultAddress};

    fn endpoint() -> Arc<Endpoint> {
        Arc::new(Endpoint {
            id: 4,
            tenant_id: TenantId::new("acme").unwrap(),
            name: "shop".into(),
            base_url: "http://localhost".into(),
            api_token: None,
        })
    }

    #[test]
    fn test_customer_without_endpoint_cannot_be_written() {
        let customer = Customer::new(CustomerData::default());
        let err = CustomerWrite::from_entity(&customer).unwrap_err();
        assert_eq!(err.error_code(), "TENANT_ISOLATION");
    }

    #[test]
    fn test_separate_default_address_gets_its_own_row() {
        let customer = Customer::assemble(
            CustomerData {
                endpoint: Some(endpoint()),
                ..Default::default()
            },
            Some(vec![AddressData {
                street: "A".into(),
                ..Default::default()
            }]),
            DefaultAddress::Separate(AddressData {
                street: "B".into(),
                ..Default::default()
            }),
        )
        .unwrap();

        let write = CustomerWrite::from_entity(&customer).unwrap();
        assert_eq!(write.addresses.len(), 2);
        assert!(write.addresses[0].in_book && !write.addresses[0].is_default);
        assert!(!write.addresses[1].in_book && write.addresses[1].is_default);
    }

    #[test]
    fn test_unsaved_customer_on_order_is_rejected() {
        let order = Order::new(OrderData {
            endpoint: Some(endpoint()),
            customer: Some(Customer::new(CustomerData::default())),
            ..Default::default()
        });
        let err = OrderWrite::from_entity(&order).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_graph_preserves_listed_default() {
        let now = Utc::now();
        let row = |id: i64, position: i64, is_default: bool| AddressRecord {
            id,
            customer_id: 1,
            remote_id: None,
            position,
            in_book: true,
            is_default,
            street: format!("street {}", id),
            city: "c".into(),
            postcode: "p".into(),
            telephone: None,
            country_code: Some("PL".into()),
            country_name: Some("Poland".into()),
        };
        let graph = CustomerGraph {
            endpoint: endpoint(),
            customer: CustomerRecord {
                id: 1,
                remote_id: Some("r".into()),
                endpoint_id: 4,
                email: "e@example.com".into(),
                first_name: "f".into(),
                last_name: "l".into(),
                sales_channels: Some(r#"[{"type":"website","code":"base"}]"#.into()),
                has_address_book: true,
                created_at: now,
                created_by: "test".into(),
                modified_at: now,
                modified_by: "test".into(),
            },
            addresses: vec![row(10, 0, false), row(11, 1, true)],
        };

        let customer = graph.into_entity().unwrap();
        let default = customer.default_address().unwrap();
        assert!(Arc::ptr_eq(default, &customer.addresses().unwrap()[1]));
        assert_eq!(default.local_id(), Some(11));
        assert_eq!(default.customer_id(), Some(1));
        assert_eq!(customer.sales_channels().unwrap().len(), 1);
        assert_eq!(customer.audit().created_by.as_deref(), Some("test"));
    }
}
