// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use crate::dto::CustomerDto;
use crate::equality::{
    entities_equal, hash_ordered, hash_text, hash_unordered, ordered_eq, text_eq, unordered_eq,
};
use crate::error::{Result, SyncError};
use crate::normalize::{AsAnyArc, Canonical, IdentityMap, Slot, normalize_all, normalize_with};

use super::{Address, AddressContract, AddressData, AuditInfo, Endpoint, EntityKey, SalesChannel, TenantId};

/// Read access to a customer.
pub trait CustomerContract: AsAnyArc {
    /// Identity.
    fn key(&self) -> EntityKey;
    /// Audit metadata.
    fn audit(&self) -> AuditInfo;
    /// Partner endpoint, and through it the tenant.
    fn endpoint(&self) -> Option<Arc<Endpoint>>;
    /// Login email.
    fn email(&self) -> &str;
    /// Given name.
    fn first_name(&self) -> &str;
    /// Family name.
    fn last_name(&self) -> &str;
    /// Channels the customer is registered in. Unordered.
    fn sales_channels(&self) -> Option<&[SalesChannel]>;
    /// Default shipping address.
    fn default_address(&self) -> Option<Arc<dyn AddressContract>>;
    /// Address book, in display order.
    fn addresses(&self) -> Option<Vec<Arc<dyn AddressContract>>>;
}

/// Scalar fields of a customer.
#[derive(Debug, Clone, Default)]
pub struct CustomerData {
    /// Identity.
    pub key: EntityKey,
    /// Audit metadata. Ignored on write.
    pub audit: AuditInfo,
    /// Partner endpoint.
    pub endpoint: Option<Arc<Endpoint>>,
    /// Login email.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Sales channels.
    pub sales_channels: Option<Vec<SalesChannel>>,
}

/// Where a newly assembled customer's default address comes from.
#[derive(Debug, Clone, Default)]
pub enum DefaultAddress {
    /// No default address.
    #[default]
    None,
    /// The address at this index of the address book.
    Listed(usize),
    /// An address outside the address book.
    Separate(AddressData),
}

/// Canonical customer.
#[derive(Debug)]
pub struct Customer {
    key: EntityKey,
    audit: AuditInfo,
    endpoint: Option<Arc<Endpoint>>,
    email: String,
    first_name: String,
    last_name: String,
    sales_channels: Option<Vec<SalesChannel>>,
    default_address: Slot<Option<Arc<Address>>>,
    addresses: Slot<Option<Vec<Arc<Address>>>>,
}

impl Customer {
    /// A customer with no addresses.
    pub fn new(data: CustomerData) -> Arc<Self> {
        Arc::new(Self::from_parts(data, None, None))
    }

    /// Build a customer together with its address book. Every address is
    /// linked back to the new customer.
    pub fn assemble(
        data: CustomerData,
        addresses: Option<Vec<AddressData>>,
        default_address: DefaultAddress,
    ) -> Result<Arc<Self>> {
        if let DefaultAddress::Listed(index) = default_address {
            let len = addresses.as_ref().map_or(0, Vec::len);
            if index >= len {
                return Err(SyncError::validation(
                    "default_address",
                    format!("index {} is outside an address book of {}", index, len),
                ));
            }
        }

        let owner_id = data.key.local_id;
        Ok(Arc::new_cyclic(|me: &Weak<Customer>| {
            let book: Option<Vec<Arc<Address>>> = addresses.map(|list| {
                list.into_iter()
                    .map(|a| Arc::new(Address::owned(a, owner_id, me.clone())))
                    .collect()
            });
            let default = match default_address {
                DefaultAddress::None => None,
                DefaultAddress::Listed(index) => {
                    book.as_ref().and_then(|b| b.get(index)).cloned()
                }
                DefaultAddress::Separate(a) => {
                    Some(Arc::new(Address::owned(a, owner_id, me.clone())))
                }
            };
            Self::from_parts(data, default, book)
        }))
    }

    fn from_parts(
        data: CustomerData,
        default_address: Option<Arc<Address>>,
        addresses: Option<Vec<Arc<Address>>>,
    ) -> Self {
        Self {
            key: data.key,
            audit: data.audit,
            endpoint: data.endpoint,
            email: data.email,
            first_name: data.first_name,
            last_name: data.last_name,
            sales_channels: data.sales_channels,
            default_address: Slot::ready(default_address),
            addresses: Slot::ready(addresses),
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

    /// Partner endpoint.
    pub fn endpoint(&self) -> Option<&Arc<Endpoint>> {
        self.endpoint.as_ref()
    }

    /// Owning tenant, through the endpoint.
    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.endpoint.as_ref().map(|e| &e.tenant_id)
    }

    /// Default address.
    pub fn default_address(&self) -> Option<&Arc<Address>> {
        self.default_address.get().and_then(Option::as_ref)
    }

    /// Address book.
    pub fn addresses(&self) -> Option<&[Arc<Address>]> {
        self.addresses.get().and_then(|a| a.as_deref())
    }

    /// Copy of the scalar fields.
    pub fn data(&self) -> CustomerData {
        CustomerData {
            key: self.key.clone(),
            audit: self.audit.clone(),
            endpoint: self.endpoint.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            sales_channels: self.sales_channels.clone(),
        }
    }

    /// Wire projection. Drops the local id, audit metadata and endpoint.
    pub fn to_dto(&self) -> CustomerDto {
        CustomerDto {
            id: self.key.remote_id.clone(),
            email: self.email.clone(),
            firstname: self.first_name.clone(),
            lastname: self.last_name.clone(),
            sales_channels: self
                .sales_channels
                .as_ref()
                .map(|list| list.iter().map(SalesChannel::to_dto).collect()),
            default_address: self.default_address().map(|a| a.to_dto()),
            addresses: self
                .addresses()
                .map(|list| list.iter().map(|a| a.to_dto()).collect()),
        }
    }

    /// Build from the wire shape. A default address whose remote id matches
    /// an address-book entry becomes that entry.
    pub fn from_dto(dto: &CustomerDto, endpoint: Option<Arc<Endpoint>>) -> Result<Arc<Self>> {
        let data = CustomerData {
            key: EntityKey {
                local_id: None,
                remote_id: dto.id.clone(),
            },
            audit: AuditInfo::default(),
            endpoint,
            email: dto.email.clone(),
            first_name: dto.firstname.clone(),
            last_name: dto.lastname.clone(),
            sales_channels: dto
                .sales_channels
                .as_ref()
                .map(|list| list.iter().map(SalesChannel::from_dto).collect()),
        };

        let default = match &dto.default_address {
            None => DefaultAddress::None,
            Some(default) => {
                let listed = default.id.as_ref().and_then(|id| {
                    dto.addresses
                        .as_ref()?
                        .iter()
                        .position(|a| a.id.as_ref() == Some(id))
                });
                match listed {
                    Some(index) => DefaultAddress::Listed(index),
                    None => DefaultAddress::Separate(AddressData::from_dto(default)),
                }
            }
        };

        let book = dto
            .addresses
            .as_ref()
            .map(|list| list.iter().map(AddressData::from_dto).collect());

        Self::assemble(data, book, default)
    }
}

impl CustomerContract for Customer {
    fn key(&self) -> EntityKey {
        self.key.clone()
    }

    fn audit(&self) -> AuditInfo {
        self.audit.clone()
    }

    fn endpoint(&self) -> Option<Arc<Endpoint>> {
        self.endpoint.clone()
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn first_name(&self) -> &str {
        &self.first_name
    }

    fn last_name(&self) -> &str {
        &self.last_name
    }

    fn sales_channels(&self) -> Option<&[SalesChannel]> {
        self.sales_channels.as_deref()
    }

    fn default_address(&self) -> Option<Arc<dyn AddressContract>> {
        Customer::default_address(self).map(|a| a.clone() as Arc<dyn AddressContract>)
    }

    fn addresses(&self) -> Option<Vec<Arc<dyn AddressContract>>> {
        Customer::addresses(self).map(|list| {
            list.iter()
                .map(|a| a.clone() as Arc<dyn AddressContract>)
                .collect()
        })
    }
}

impl Canonical for Customer {
    type Contract = dyn CustomerContract;
    const ENTITY: &'static str = "Customer";

    fn shell(source: &dyn CustomerContract) -> Self {
        Self {
            key: source.key(),
            audit: source.audit(),
            endpoint: source.endpoint(),
            email: source.email().to_string(),
            first_name: source.first_name().to_string(),
            last_name: source.last_name().to_string(),
            sales_channels: source.sales_channels().map(<[SalesChannel]>::to_vec),
            default_address: Slot::pending(),
            addresses: Slot::pending(),
        }
    }

    fn link(target: &Arc<Self>, source: &dyn CustomerContract, map: &mut IdentityMap) -> Result<()> {
        let default = normalize_with::<Address>(source.default_address().as_ref(), map)?;
        let book = normalize_all::<Address>(source.addresses().as_deref(), map)?;
        target.default_address.fill(default)?;
        target.addresses.fill(book)
    }
}

impl PartialEq for Customer {
    fn eq(&self, other: &Self) -> bool {
        text_eq(&self.email, &other.email)
            && text_eq(&self.first_name, &other.first_name)
            && text_eq(&self.last_name, &other.last_name)
            && unordered_eq(self.sales_channels.as_deref(), other.sales_channels.as_deref())
            && entities_equal(self.default_address(), other.default_address())
            && ordered_eq(self.addresses(), other.addresses())
    }
}

impl Eq for Customer {}

impl Hash for Customer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_text(&self.email, state);
        hash_text(&self.first_name, state);
        hash_text(&self.last_name, state);
        hash_unordered(self.sales_channels.as_deref(), state);
        self.default_address().hash(state);
        hash_ordered(self.addresses(), state);
    }
}
