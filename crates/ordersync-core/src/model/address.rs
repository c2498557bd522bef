// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use crate::dto::AddressDto;
use crate::equality::{entities_equal, hash_opt_text, hash_text, opt_text_eq, text_eq};
use crate::error::{Result, SyncError};
use crate::normalize::{AsAnyArc, Canonical, IdentityMap, Slot, normalize_with};

use super::{Country, CountryContract, Customer, CustomerContract, EntityKey};

/// Read access to a postal address.
pub trait AddressContract: AsAnyArc {
    /// Identity.
    fn key(&self) -> EntityKey;
    /// Local id of the owning customer, when known.
    fn customer_id(&self) -> Option<i64>;
    /// The owning customer.
    fn customer(&self) -> Option<Arc<dyn CustomerContract>>;
    /// Street line.
    fn street(&self) -> &str;
    /// City.
    fn city(&self) -> &str;
    /// Postal code.
    fn postcode(&self) -> &str;
    /// Contact phone.
    fn telephone(&self) -> Option<&str>;
    /// Country.
    fn country(&self) -> Option<Arc<dyn CountryContract>>;
}

/// Scalar fields of an address, used to build one.
#[derive(Debug, Clone, Default)]
pub struct AddressData {
    /// Identity.
    pub key: EntityKey,
    /// Street line.
    pub street: String,
    /// City.
    pub city: String,
    /// Postal code.
    pub postcode: String,
    /// Contact phone.
    pub telephone: Option<String>,
    /// Country.
    pub country: Option<Arc<Country>>,
}

impl AddressData {
    /// Read the wire shape. The remote id becomes the key; there is no local
    /// id or owner on the wire.
    pub fn from_dto(dto: &AddressDto) -> Self {
        Self {
            key: EntityKey {
                local_id: None,
                remote_id: dto.id.clone(),
            },
            street: dto.street.clone(),
            city: dto.city.clone(),
            postcode: dto.postcode.clone(),
            telephone: dto.telephone.clone(),
            country: dto.country.as_ref().map(Country::from_dto),
        }
    }
}

/// Canonical address.
///
/// The owning customer is held weakly: it is reachable only while something
/// else keeps the customer alive. [`Address::customer_id`] survives either way.
/// A foreign address that names an owner is therefore normalized through that
/// customer; normalizing it on its own is refused.
#[derive(Debug)]
pub struct Address {
    key: EntityKey,
    customer_id: Option<i64>,
    customer: Slot<Weak<Customer>>,
    street: String,
    city: String,
    postcode: String,
    telephone: Option<String>,
    country: Slot<Option<Arc<Country>>>,
}

impl Address {
    /// A standalone address with no owner.
    pub fn new(data: AddressData) -> Arc<Self> {
        Arc::new(Self::owned(data, None, Weak::new()))
    }

    /// Build from the wire shape, with no owner.
    pub fn from_dto(dto: &AddressDto) -> Arc<Self> {
        Self::new(AddressData::from_dto(dto))
    }

    pub(crate) fn owned(data: AddressData, customer_id: Option<i64>, owner: Weak<Customer>) -> Self {
        Self {
            key: data.key,
            customer_id,
            customer: Slot::ready(owner),
            street: data.street,
            city: data.city,
            postcode: data.postcode,
            telephone: data.telephone,
            country: Slot::ready(data.country),
        }
    }

    /// Store key.
    pub fn local_id(&self) -> Option<i64> {
        self.key.local_id
    }

    /// Partner key.
    pub fn remote_id(&self) -> Option<&str> {
        self.key.remote_id.as_deref()
    }

    /// Owner's local id, falling back to the live owner's key.
    pub fn customer_id(&self) -> Option<i64> {
        self.customer_id
            .or_else(|| self.customer().and_then(|c| c.local_id()))
    }

    /// The owning customer, if it is still alive.
    pub fn customer(&self) -> Option<Arc<Customer>> {
        self.customer.get().and_then(Weak::upgrade)
    }

    /// Country.
    pub fn country(&self) -> Option<&Arc<Country>> {
        self.country.get().and_then(Option::as_ref)
    }

    /// Copy of the scalar fields.
    pub fn data(&self) -> AddressData {
        AddressData {
            key: self.key.clone(),
            street: self.street.clone(),
            city: self.city.clone(),
            postcode: self.postcode.clone(),
            telephone: self.telephone.clone(),
            country: self.country().cloned(),
        }
    }

    /// Wire projection. Drops the local id and the owner link.
    pub fn to_dto(&self) -> AddressDto {
        AddressDto {
            id: self.key.remote_id.clone(),
            street: self.street.clone(),
            city: self.city.clone(),
            postcode: self.postcode.clone(),
            telephone: self.telephone.clone(),
            country: self.country().map(|c| c.to_dto()),
        }
    }
}

impl AddressContract for Address {
    fn key(&self) -> EntityKey {
        self.key.clone()
    }

    fn customer_id(&self) -> Option<i64> {
        Address::customer_id(self)
    }

    fn customer(&self) -> Option<Arc<dyn CustomerContract>> {
        Address::customer(self).map(|c| c as Arc<dyn CustomerContract>)
    }

    fn street(&self) -> &str {
        &self.street
    }

    fn city(&self) -> &str {
        &self.city
    }

    fn postcode(&self) -> &str {
        &self.postcode
    }

    fn telephone(&self) -> Option<&str> {
        self.telephone.as_deref()
    }

    fn country(&self) -> Option<Arc<dyn CountryContract>> {
        Address::country(self).map(|c| c.clone() as Arc<dyn CountryContract>)
    }
}

impl Canonical for Address {
    type Contract = dyn AddressContract;
    const ENTITY: &'static str = "Address";

    fn shell(source: &dyn AddressContract) -> Self {
        Self {
            key: source.key(),
            customer_id: source.customer_id(),
            customer: Slot::pending(),
            street: source.street().to_string(),
            city: source.city().to_string(),
            postcode: source.postcode().to_string(),
            telephone: source.telephone().map(str::to_string),
            country: Slot::pending(),
        }
    }

    fn link(target: &Arc<Self>, source: &dyn AddressContract, map: &mut IdentityMap) -> Result<()> {
        let owner = normalize_with::<Customer>(source.customer().as_ref(), map)?;
        target
            .customer
            .fill(owner.as_ref().map(Arc::downgrade).unwrap_or_default())?;

        let country = normalize_with::<Country>(source.country().as_ref(), map)?;
        target.country.fill(country)
    }

    fn admit_root(source: &dyn AddressContract) -> Result<()> {
        if source.customer().is_some() {
            return Err(SyncError::InvalidArgument {
                argument: "address",
                message: "an address with an owner is normalized through its customer".to_string(),
            });
        }
        Ok(())
    }
}

// The owner is a structural back edge, not a business field: it takes no part
// in equality or hashing.
impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        text_eq(&self.street, &other.street)
            && text_eq(&self.city, &other.city)
            && text_eq(&self.postcode, &other.postcode)
            && opt_text_eq(self.telephone.as_deref(), other.telephone.as_deref())
            && entities_equal(self.country(), other.country())
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_text(&self.street, state);
        hash_text(&self.city, state);
        hash_text(&self.postcode, state);
        hash_opt_text(self.telephone.as_deref(), state);
        self.country().hash(state);
    }
}
