// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::{Deserialize, Serialize};

use super::CountryDto;

/// Partner tax rate resource.
#[allow(missing_docs)] // Field names mirror the partner JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRateDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub code: String,
    /// Percentage, e.g. `23.0`.
    pub rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_country: Option<CountryDto>,
}
