// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::{Deserialize, Serialize};

/// Partner customer resource.
#[allow(missing_docs)] // Field names mirror the partner JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerDto {
    /// Partner id; absent before the first push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_channels: Option<Vec<SalesChannelDto>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_address: Option<AddressDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddressDto>>,
}

/// Partner address resource.
#[allow(missing_docs)] // Field names mirror the partner JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub street: String,
    pub city: String,
    pub postcode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<CountryDto>,
}

/// Partner sales channel reference.
#[allow(missing_docs)] // Field names mirror the partner JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesChannelDto {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
}

/// Partner country resource. `id` is the ISO 3166-1 alpha-2 code.
#[allow(missing_docs)] // Field names mirror the partner JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryDto {
    pub id: String,
    pub full_name_english: String,
}
