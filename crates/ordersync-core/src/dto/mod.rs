// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire DTOs mirroring the partner REST API's JSON.
//!
//! Plain field storage. Optional collections are omitted from the JSON when
//! `None`, so an absent list and an empty list stay distinguishable on the
//! wire.

mod customer;
mod order;
mod tax_rate;

pub use customer::{AddressDto, CountryDto, CustomerDto, SalesChannelDto};
pub use order::{OrderDto, OrderLineDto};
pub use tax_rate::TaxRateDto;

use serde::{Deserialize, Serialize};

/// Body of a partner list endpoint: `{"items": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEnvelope<T> {
    /// Returned items.
    pub items: Vec<T>,
    /// Total matching items, when the partner reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_envelope_without_total() {
        let json = r#"{"items":[{"id":"PL","full_name_english":"Poland"}]}"#;
        let page: ListEnvelope<CountryDto> = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_count, None);
        assert_eq!(serde_json::to_string(&page).unwrap(), json);
    }
}
