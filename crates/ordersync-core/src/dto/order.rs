// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AddressDto, CustomerDto, SalesChannelDto};

/// Partner order resource. Amounts are in minor currency units.
#[allow(missing_docs)] // Field names mirror the partner JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-facing order number.
    pub increment_id: String,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub order_currency_code: String,
    pub grand_total: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_channel: Option<SalesChannelDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<AddressDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderLineDto>>,
}

/// Partner order item.
#[allow(missing_docs)] // Field names mirror the partner JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineDto {
    pub sku: String,
    pub name: String,
    pub qty_ordered: u32,
    /// Unit price in minor units.
    pub price: i64,
}
