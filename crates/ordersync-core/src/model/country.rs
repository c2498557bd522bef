// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::dto::CountryDto;
use crate::equality::{hash_text, text_eq};
use crate::error::Result;
use crate::normalize::{AsAnyArc, Canonical, IdentityMap};

/// Read access to a country.
pub trait CountryContract: AsAnyArc {
    /// ISO 3166-1 alpha-2 code.
    fn iso_code(&self) -> &str;
    /// English name.
    fn name(&self) -> &str;
}

/// Canonical country.
#[derive(Debug, Clone)]
pub struct Country {
    iso_code: String,
    name: String,
}

impl Country {
    /// Create a country.
    pub fn new(iso_code: impl Into<String>, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            iso_code: iso_code.into(),
            name: name.into(),
        })
    }

    /// Wire projection. Lossless.
    pub fn to_dto(&self) -> CountryDto {
        CountryDto {
            id: self.iso_code.clone(),
            full_name_english: self.name.clone(),
        }
    }

    /// Build from the wire shape.
    pub fn from_dto(dto: &CountryDto) -> Arc<Self> {
        Self::new(dto.id.clone(), dto.full_name_english.clone())
    }
}

impl CountryContract for Country {
    fn iso_code(&self) -> &str {
        &self.iso_code
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Canonical for Country {
    type Contract = dyn CountryContract;
    const ENTITY: &'static str = "Country";

    fn shell(source: &dyn CountryContract) -> Self {
        Self {
            iso_code: source.iso_code().to_string(),
            name: source.name().to_string(),
        }
    }

    fn link(_: &Arc<Self>, _: &dyn CountryContract, _: &mut IdentityMap) -> Result<()> {
        Ok(())
    }
}

impl PartialEq for Country {
    fn eq(&self, other: &Self) -> bool {
        text_eq(&self.iso_code, &other.iso_code) && text_eq(&self.name, &other.name)
    }
}

impl Eq for Country {}

impl Hash for Country {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_text(&self.iso_code, state);
        hash_text(&self.name, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    struct RawCountry(&'static str, &'static str);

    impl CountryContract for RawCountry {
        fn iso_code(&self) -> &str {
            self.0
        }
        fn name(&self) -> &str {
            self.1
        }
    }

    #[test]
    fn test_foreign_country_is_copied() {
        let raw: Arc<dyn CountryContract> = Arc::new(RawCountry("pl", "Poland"));
        let country = normalize::<Country>(Some(&raw)).unwrap().unwrap();
        assert_eq!(*country, *Country::new("PL", "poland"));
    }

    #[test]
    fn test_canonical_country_is_not_copied() {
        let country = Country::new("DE", "Germany");
        let as_contract: Arc<dyn CountryContract> = country.clone();
        let out = normalize::<Country>(Some(&as_contract)).unwrap().unwrap();
        assert!(Arc::ptr_eq(&out, &country));
    }
}
