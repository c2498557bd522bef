// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::dto::{OrderDto, OrderLineDto};
use crate::equality::{entities_equal, hash_ordered, hash_text, ordered_eq, text_eq};
use crate::error::{Result, SyncError};
use crate::normalize::{AsAnyArc, Canonical, IdentityMap, Slot, normalize_with};

use super::{
    Address, AddressContract, AuditInfo, Customer, CustomerContract, Endpoint, EntityKey,
    SalesChannel, TenantId,
};

/// Order lifecycle state as reported by the partner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Placed, not yet paid or accepted.
    #[default]
    Pending,
    /// Accepted and being fulfilled.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Fulfilled.
    Complete,
    /// Cancelled before fulfillment.
    Cancelled,
}

impl OrderStatus {
    /// Wire and storage spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "complete" => Ok(Self::Complete),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(SyncError::validation(
                "status",
                format!("unknown order status '{}'", other),
            )),
        }
    }
}

/// One ordered item. Prices are in minor currency units.
#[derive(Debug, Clone)]
pub struct OrderLine {
    /// Stock keeping unit.
    pub sku: String,
    /// Product name at the time of ordering.
    pub name: String,
    /// Ordered quantity.
    pub quantity: u32,
    /// Unit price in minor units.
    pub unit_price_minor: i64,
}

impl OrderLine {
    /// Wire projection. Lossless.
    pub fn to_dto(&self) -> OrderLineDto {
        OrderLineDto {
            sku: self.sku.clone(),
            name: self.name.clone(),
            qty_ordered: self.quantity,
            price: self.unit_price_minor,
        }
    }

    /// Build from the wire shape.
    pub fn from_dto(dto: &OrderLineDto) -> Self {
        Self {
            sku: dto.sku.clone(),
            name: dto.name.clone(),
            quantity: dto.qty_ordered,
            unit_price_minor: dto.price,
        }
    }
}

impl PartialEq for OrderLine {
    fn eq(&self, other: &Self) -> bool {
        text_eq(&self.sku, &other.sku)
            && text_eq(&self.name, &other.name)
            && self.quantity == other.quantity
            && self.unit_price_minor == other.unit_price_minor
    }
}

impl Eq for OrderLine {}

impl Hash for OrderLine {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_text(&self.sku, state);
        hash_text(&self.name, state);
        self.quantity.hash(state);
        self.unit_price_minor.hash(state);
    }
}

/// Read access to an order.
pub trait OrderContract: AsAnyArc {
    /// Identity.
    fn key(&self) -> EntityKey;
    /// Audit metadata.
    fn audit(&self) -> AuditInfo;
    /// Partner endpoint.
    fn endpoint(&self) -> Option<Arc<Endpoint>>;
    /// Human-facing order number.
    fn order_number(&self) -> &str;
    /// When the order was placed.
    fn placed_at(&self) -> DateTime<Utc>;
    /// Lifecycle state.
    fn status(&self) -> OrderStatus;
    /// ISO 4217 currency code.
    fn currency(&self) -> &str;
    /// Grand total in minor units.
    fn grand_total_minor(&self) -> i64;
    /// Channel the order was placed through.
    fn sales_channel(&self) -> Option<&SalesChannel>;
    /// Ordering customer; `None` for guest checkouts.
    fn customer(&self) -> Option<Arc<dyn CustomerContract>>;
    /// Ship-to address.
    fn shipping_address(&self) -> Option<Arc<dyn AddressContract>>;
    /// Line items, in order.
    fn lines(&self) -> Option<&[OrderLine]>;
}

/// Fields of an order.
#[derive(Debug, Clone, Default)]
pub struct OrderData {
    /// Identity.
    pub key: EntityKey,
    /// Audit metadata. Ignored on write.
    pub audit: AuditInfo,
    /// Partner endpoint.
    pub endpoint: Option<Arc<Endpoint>>,
    /// Order number.
    pub order_number: String,
    /// Placement time.
    pub placed_at: DateTime<Utc>,
    /// Lifecycle state.
    pub status: OrderStatus,
    /// Currency code.
    pub currency: String,
    /// Grand total in minor units.
    pub grand_total_minor: i64,
    /// Sales channel.
    pub sales_channel: Option<SalesChannel>,
    /// Ordering customer.
    pub customer: Option<Arc<Customer>>,
    /// Ship-to address.
    pub shipping_address: Option<Arc<Address>>,
    /// Line items.
    pub lines: Option<Vec<OrderLine>>,
}

/// Canonical order.
#[derive(Debug)]
pub struct Order {
    key: EntityKey,
    audit: AuditInfo,
    endpoint: Option<Arc<Endpoint>>,
    order_number: String,
    placed_at: DateTime<Utc>,
    status: OrderStatus,
    currency: String,
    grand_total_minor: i64,
    sales_channel: Option<SalesChannel>,
    customer: Slot<Option<Arc<Customer>>>,
    shipping_address: Slot<Option<Arc<Address>>>,
    lines: Option<Vec<OrderLine>>,
}

impl Order {
    /// Create an order.
    pub fn new(data: OrderData) -> Arc<Self> {
        Arc::new(Self {
            key: data.key,
            audit: data.audit,
            endpoint: data.endpoint,
            order_number: data.order_number,
            placed_at: data.placed_at,
            status: data.status,
            currency: data.currency,
            grand_total_minor: data.grand_total_minor,
            sales_channel: data.sales_channel,
            customer: Slot::ready(data.customer),
            shipping_address: Slot::ready(data.shipping_address),
            lines: data.lines,
        })
    }

    /// Store key.
    pub fn local_id(&self) -> Option<i64> {
        self.key.local_id
    }

    /// Partner key.
    pub fn remote_id(&self) -> Option<&str> {
        self.key.remote_id.as_deref()
    }

    /// Partner endpoint.
    pub fn endpoint(&self) -> Option<&Arc<Endpoint>> {
        self.endpoint.as_ref()
    }

    /// Owning tenant, through the endpoint.
    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.endpoint.as_ref().map(|e| &e.tenant_id)
    }

    /// Ordering customer.
    pub fn customer(&self) -> Option<&Arc<Customer>> {
        self.customer.get().and_then(Option::as_ref)
    }

    /// Ship-to address.
    pub fn shipping_address(&self) -> Option<&Arc<Address>> {
        self.shipping_address.get().and_then(Option::as_ref)
    }

    /// Copy of every field.
    pub fn data(&self) -> OrderData {
        OrderData {
            key: self.key.clone(),
            audit: self.audit.clone(),
            endpoint: self.endpoint.clone(),
            order_number: self.order_number.clone(),
            placed_at: self.placed_at,
            status: self.status,
            currency: self.currency.clone(),
            grand_total_minor: self.grand_total_minor,
            sales_channel: self.sales_channel.clone(),
            customer: self.customer().cloned(),
            shipping_address: self.shipping_address().cloned(),
            lines: self.lines.clone(),
        }
    }

    /// Wire projection. Drops the local id, audit metadata and endpoint; the
    /// embedded customer and address are projected with their own rules.
    pub fn to_dto(&self) -> OrderDto {
        OrderDto {
            id: self.key.remote_id.clone(),
            increment_id: self.order_number.clone(),
            created_at: self.placed_at,
            status: self.status.as_str().to_string(),
            order_currency_code: self.currency.clone(),
            grand_total: self.grand_total_minor,
            sales_channel: self.sales_channel.as_ref().map(SalesChannel::to_dto),
            customer: self.customer().map(|c| c.to_dto()),
            shipping_address: self.shipping_address().map(|a| a.to_dto()),
            items: self
                .lines
                .as_ref()
                .map(|lines| lines.iter().map(OrderLine::to_dto).collect()),
        }
    }

    /// Build from the wire shape. The embedded customer shares `endpoint`.
    pub fn from_dto(dto: &OrderDto, endpoint: Option<Arc<Endpoint>>) -> Result<Arc<Self>> {
        let customer = dto
            .customer
            .as_ref()
            .map(|c| Customer::from_dto(c, endpoint.clone()))
            .transpose()?;

        Ok(Self::new(OrderData {
            key: EntityKey {
                local_id: None,
                remote_id: dto.id.clone(),
            },
            audit: AuditInfo::default(),
            endpoint,
            order_number: dto.increment_id.clone(),
            placed_at: dto.created_at,
            status: dto.status.parse()?,
            currency: dto.order_currency_code.clone(),
            grand_total_minor: dto.grand_total,
            sales_channel: dto.sales_channel.as_ref().map(SalesChannel::from_dto),
            customer,
            shipping_address: dto.shipping_address.as_ref().map(Address::from_dto),
            lines: dto
                .items
                .as_ref()
                .map(|items| items.iter().map(OrderLine::from_dto).collect()),
        }))
    }
}

impl OrderContract for Order {
    fn key(&self) -> EntityKey {
        self.key.clone()
    }

    fn audit(&self) -> AuditInfo {
        self.audit.clone()
    }

    fn endpoint(&self) -> Option<Arc<Endpoint>> {
        self.endpoint.clone()
    }

    fn order_number(&self) -> &str {
        &self.order_number
    }

    fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn currency(&self) -> &str {
        &self.currency
    }

    fn grand_total_minor(&self) -> i64 {
        self.grand_total_minor
    }

    fn sales_channel(&self) -> Option<&SalesChannel> {
        self.sales_channel.as_ref()
    }

    fn customer(&self) -> Option<Arc<dyn CustomerContract>> {
        Order::customer(self).map(|c| c.clone() as Arc<dyn CustomerContract>)
    }

    fn shipping_address(&self) -> Option<Arc<dyn AddressContract>> {
        Order::shipping_address(self).map(|a| a.clone() as Arc<dyn AddressContract>)
    }

    fn lines(&self) -> Option<&[OrderLine]> {
        self.lines.as_deref()
    }
}

impl Canonical for Order {
    type Contract = dyn OrderContract;
    const ENTITY: &'static str = "Order";

    fn shell(source: &dyn OrderContract) -> Self {
        Self {
            key: source.key(),
            audit: source.audit(),
            endpoint: source.endpoint(),
            order_number: source.order_number().to_string(),
            placed_at: source.placed_at(),
            status: source.status(),
            currency: source.currency().to_string(),
            grand_total_minor: source.grand_total_minor(),
            sales_channel: source.sales_channel().cloned(),
            customer: Slot::pending(),
            shipping_address: Slot::pending(),
            lines: source.lines().map(<[OrderLine]>::to_vec),
        }
    }

    fn link(target: &Arc<Self>, source: &dyn OrderContract, map: &mut IdentityMap) -> Result<()> {
        let customer = normalize_with::<Customer>(source.customer().as_ref(), map)?;
        let shipping = normalize_with::<Address>(source.shipping_address().as_ref(), map)?;
        target.customer.fill(customer)?;
        target.shipping_address.fill(shipping)
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        text_eq(&self.order_number, &other.order_number)
            && self.placed_at == other.placed_at
            && self.status == other.status
            && text_eq(&self.currency, &other.currency)
            && self.grand_total_minor == other.grand_total_minor
            && self.sales_channel == other.sales_channel
            && entities_equal(self.customer(), other.customer())
            && entities_equal(self.shipping_address(), other.shipping_address())
            && ordered_eq(self.lines.as_deref(), other.lines.as_deref())
    }
}

impl Eq for Order {}

impl Hash for Order {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_text(&self.order_number, state);
        self.placed_at.hash(state);
        self.status.hash(state);
        hash_text(&self.currency, state);
        self.grand_total_minor.hash(state);
        self.sales_channel.hash(state);
        self.customer().hash(state);
        self.shipping_address().hash(state);
        hash_ordered(self.lines.as_deref(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::equality::stable_hash;
    use crate::model::{AddressData, CustomerData, DefaultAddress};
    use crate::normalize::normalize;

    fn customer() -> Arc<Customer> {
        Customer::assemble(
            CustomerData {
                key: EntityKey::remote("c-1"),
                email: "ola@example.com".into(),
                first_name: "Ola".into(),
                last_name: "Wiśniewska".into(),
                ..Default::default()
            },
            Some(vec![AddressData {
                key: EntityKey::remote("a-1"),
                street: "Rynek 5".into(),
                city: "Wrocław".into(),
                postcode: "50-001".into(),
                ..Default::default()
            }]),
            DefaultAddress::Listed(0),
        )
        .unwrap()
    }

    fn order() -> Arc<Order> {
        let customer = customer();
        let shipping = customer.default_address().cloned();
        Order::new(OrderData {
            key: EntityKey::remote("100"),
            order_number: "000000100".into(),
            placed_at: Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
            status: OrderStatus::Processing,
            currency: "PLN".into(),
            grand_total_minor: 12_999,
            sales_channel: Some(SalesChannel::new("website", "base")),
            customer: Some(customer),
            shipping_address: shipping,
            lines: Some(vec![
                OrderLine {
                    sku: "MUG-01".into(),
                    name: "Mug".into(),
                    quantity: 2,
                    unit_price_minor: 2_999,
                },
                OrderLine {
                    sku: "TEE-XL".into(),
                    name: "T-shirt".into(),
                    quantity: 1,
                    unit_price_minor: 7_001,
                },
            ]),
            ..Default::default()
        })
    }

    #[test]
    fn test_status_parse_accepts_partner_spellings() {
        assert_eq!("Canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert_eq!(" complete ".parse::<OrderStatus>().unwrap(), OrderStatus::Complete);
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_canonical_order_is_returned_as_is() {
        let order = order();
        let source: Arc<dyn OrderContract> = order.clone();
        let out = normalize::<Order>(Some(&source)).unwrap().unwrap();
        assert!(Arc::ptr_eq(&out, &order));
    }

    #[test]
    fn test_dto_round_trip() {
        let order = order();
        let back = Order::from_dto(&order.to_dto(), None).unwrap();
        assert_eq!(*back, *order);
        assert_eq!(stable_hash(&*back), stable_hash(&*order));
    }

    #[test]
    fn test_dto_json_shape() {
        let json = serde_json::to_value(order().to_dto()).unwrap();
        assert_eq!(json["increment_id"], "000000100");
        assert_eq!(json["status"], "processing");
        assert_eq!(json["items"].as_array().unwrap().len(), 2);
        assert_eq!(json["customer"]["email"], "ola@example.com");
    }

    #[test]
    fn test_line_order_matters() {
        let a = order();
        let mut data = a.data();
        if let Some(lines) = data.lines.as_mut() {
            lines.reverse();
        }
        assert_ne!(*a, *Order::new(data));
    }

    #[test]
    fn test_unknown_status_fails_from_dto() {
        let mut dto = order().to_dto();
        dto.status = "teleported".into();
        assert_eq!(
            Order::from_dto(&dto, None).unwrap_err().error_code(),
            "VALIDATION_ERROR"
        );
    }
}
