// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::dto::TaxRateDto;
use crate::equality::{entities_equal, hash_text, text_eq};
use crate::error::{Result, SyncError};
use crate::normalize::{AsAnyArc, Canonical, IdentityMap, Slot, normalize_with};

use super::{AuditInfo, Country, CountryContract, Endpoint, EntityKey, TenantId};

/// Highest representable rate: 100%.
pub const MAX_RATE_BASIS_POINTS: u32 = 10_000;

fn check_rate(rate_basis_points: u32) -> Result<()> {
    if rate_basis_points > MAX_RATE_BASIS_POINTS {
        return Err(SyncError::validation(
            "rate",
            format!("{} basis points exceeds 100%", rate_basis_points),
        ));
    }
    Ok(())
}

/// Read access to a tax rate.
pub trait TaxRateContract: AsAnyArc {
    /// Identity.
    fn key(&self) -> EntityKey;
    /// Audit metadata.
    fn audit(&self) -> AuditInfo;
    /// Partner endpoint.
    fn endpoint(&self) -> Option<Arc<Endpoint>>;
    /// Rate code, e.g. `PL-VAT-23`.
    fn code(&self) -> &str;
    /// Rate in hundredths of a percent (2300 = 23%).
    fn rate_basis_points(&self) -> u32;
    /// Country the rate applies in.
    fn country(&self) -> Option<Arc<dyn CountryContract>>;
}

/// Fields of a tax rate.
#[derive(Debug, Clone, Default)]
pub struct TaxRateData {
    /// Identity.
    pub key: EntityKey,
    /// Audit metadata. Ignored on write.
    pub audit: AuditInfo,
    /// Partner endpoint.
    pub endpoint: Option<Arc<Endpoint>>,
    /// Rate code.
    pub code: String,
    /// Rate in hundredths of a percent.
    pub rate_basis_points: u32,
    /// Country.
    pub country: Option<Arc<Country>>,
}

/// Canonical tax rate.
#[derive(Debug)]
pub struct TaxRate {
    key: EntityKey,
    audit: AuditInfo,
    endpoint: Option<Arc<Endpoint>>,
    code: String,
    rate_basis_points: u32,
    country: Slot<Option<Arc<Country>>>,
}

impl TaxRate {
    /// Create a tax rate. Rates above [`MAX_RATE_BASIS_POINTS`] are a
    /// validation error.
    pub fn new(data: TaxRateData) -> Result<Arc<Self>> {
        check_rate(data.rate_basis_points)?;
        Ok(Arc::new(Self {
            key: data.key,
            audit: data.audit,
            endpoint: data.endpoint,
            code: data.code,
            rate_basis_points: data.rate_basis_points,
            country: Slot::ready(data.country),
        }))
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

    /// Country.
    pub fn country(&self) -> Option<&Arc<Country>> {
        self.country.get().and_then(Option::as_ref)
    }

    /// Copy of the fields, for building a revised rate.
    pub fn data(&self) -> TaxRateData {
        TaxRateData {
            key: self.key.clone(),
            audit: self.audit.clone(),
            endpoint: self.endpoint.clone(),
            code: self.code.clone(),
            rate_basis_points: self.rate_basis_points,
            country: self.country().cloned(),
        }
    }

    /// Wire projection. The partner expresses the rate as a percentage.
    /// Drops the local id, audit metadata and endpoint.
    pub fn to_dto(&self) -> TaxRateDto {
        TaxRateDto {
            id: self.key.remote_id.clone(),
            code: self.code.clone(),
            rate: f64::from(self.rate_basis_points) / 100.0,
            tax_country: self.country().map(|c| c.to_dto()),
        }
    }

    /// Build from the wire shape. Percentages are rounded to two decimals.
    pub fn from_dto(dto: &TaxRateDto, endpoint: Option<Arc<Endpoint>>) -> Result<Arc<Self>> {
        if !dto.rate.is_finite() || dto.rate < 0.0 || dto.rate > 100.0 {
            return Err(SyncError::validation(
                "rate",
                format!("{} is not a percentage", dto.rate),
            ));
        }
        Self::new(TaxRateData {
            key: EntityKey {
                local_id: None,
                remote_id: dto.id.clone(),
            },
            audit: AuditInfo::default(),
            endpoint,
            code: dto.code.clone(),
            rate_basis_points: (dto.rate * 100.0).round() as u32,
            country: dto.tax_country.as_ref().map(Country::from_dto),
        })
    }
}

impl TaxRateContract for TaxRate {
    fn key(&self) -> EntityKey {
        self.key.clone()
    }

    fn audit(&self) -> AuditInfo {
        self.audit.clone()
    }

    fn endpoint(&self) -> Option<Arc<Endpoint>> {
        self.endpoint.clone()
    }

    fn code(&self) -> &str {
        &self.code
    }

    fn rate_basis_points(&self) -> u32 {
        self.rate_basis_points
    }

    fn country(&self) -> Option<Arc<dyn CountryContract>> {
        TaxRate::country(self).map(|c| c.clone() as Arc<dyn CountryContract>)
    }
}

impl Canonical for TaxRate {
    type Contract = dyn TaxRateContract;
    const ENTITY: &'static str = "TaxRate";

    fn shell(source: &dyn TaxRateContract) -> Self {
        Self {
            key: source.key(),
            audit: source.audit(),
            endpoint: source.endpoint(),
            code: source.code().to_string(),
            rate_basis_points: source.rate_basis_points(),
            country: Slot::pending(),
        }
    }

    fn link(target: &Arc<Self>, source: &dyn TaxRateContract, map: &mut IdentityMap) -> Result<()> {
        check_rate(target.rate_basis_points)?;
        let country = normalize_with::<Country>(source.country().as_ref(), map)?;
        target.country.fill(country)
    }
}

impl PartialEq for TaxRate {
    fn eq(&self, other: &Self) -> bool {
        text_eq(&self.code, &other.code)
            && self.rate_basis_points == other.rate_basis_points
            && entities_equal(self.country(), other.country())
    }
}

impl Eq for TaxRate {}

impl Hash for TaxRate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_text(&self.code, state);
        self.rate_basis_points.hash(state);
        self.country().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    struct ImportedRate;

    impl TaxRateContract for ImportedRate {
        fn key(&self) -> EntityKey {
            EntityKey::remote("5")
        }
        fn audit(&self) -> AuditInfo {
            AuditInfo::default()
        }
        fn endpoint(&self) -> Option<Arc<Endpoint>> {
            None
        }
        fn code(&self) -> &str {
            "PL-VAT-8"
        }
        fn rate_basis_points(&self) -> u32 {
            800
        }
        fn country(&self) -> Option<Arc<dyn CountryContract>> {
            Some(Country::new("PL", "Poland"))
        }
    }

    fn vat23() -> Arc<TaxRate> {
        TaxRate::new(TaxRateData {
            key: EntityKey::remote("1"),
            code: "PL-VAT-23".into(),
            rate_basis_points: 2300,
            country: Some(Country::new("PL", "Poland")),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_normalize_copies_country() {
        let source: Arc<dyn TaxRateContract> = Arc::new(ImportedRate);
        let rate = normalize::<TaxRate>(Some(&source)).unwrap().unwrap();
        assert_eq!(rate.rate_basis_points, 800);
        assert_eq!(rate.country().unwrap().iso_code(), "PL");
        assert_eq!(rate.remote_id(), Some("5"));
    }

    #[test]
    fn test_dto_round_trip() {
        let rate = vat23();
        let dto = rate.to_dto();
        assert_eq!(dto.rate, 23.0);
        assert_eq!(*TaxRate::from_dto(&dto, None).unwrap(), *rate);
    }

    #[test]
    fn test_fractional_rate_round_trip() {
        let rate = TaxRate::new(TaxRateData {
            code: "DE-REDUCED".into(),
            rate_basis_points: 705,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(*TaxRate::from_dto(&rate.to_dto(), None).unwrap(), *rate);
    }

    #[test]
    fn test_from_dto_rejects_nonsense_rate() {
        let mut dto = vat23().to_dto();
        dto.rate = -1.0;
        assert!(TaxRate::from_dto(&dto, None).is_err());
        dto.rate = f64::NAN;
        assert!(TaxRate::from_dto(&dto, None).is_err());
    }

    #[test]
    fn test_full_rate_round_trips_and_above_is_refused() {
        let full = TaxRate::new(TaxRateData {
            code: "ALL".into(),
            rate_basis_points: MAX_RATE_BASIS_POINTS,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(*TaxRate::from_dto(&full.to_dto(), None).unwrap(), *full);

        let err = TaxRate::new(TaxRateData {
            code: "BOGUS".into(),
            rate_basis_points: MAX_RATE_BASIS_POINTS + 1,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    struct OverchargingRate;

    impl TaxRateContract for OverchargingRate {
        fn key(&self) -> EntityKey {
            EntityKey::default()
        }
        fn audit(&self) -> AuditInfo {
            AuditInfo::default()
        }
        fn endpoint(&self) -> Option<Arc<Endpoint>> {
            None
        }
        fn code(&self) -> &str {
            "OVER"
        }
        fn rate_basis_points(&self) -> u32 {
            12_000
        }
        fn country(&self) -> Option<Arc<dyn CountryContract>> {
            None
        }
    }

    #[test]
    fn test_normalize_refuses_rate_above_full() {
        let source: Arc<dyn TaxRateContract> = Arc::new(OverchargingRate);
        let err = normalize::<TaxRate>(Some(&source)).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
