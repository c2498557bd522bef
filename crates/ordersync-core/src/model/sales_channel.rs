// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::hash::{Hash, Hasher};

use crate::dto::SalesChannelDto;
use crate::equality::{hash_text, text_eq};

/// Where a customer or order originates, e.g. `website/base`.
#[derive(Debug, Clone)]
pub struct SalesChannel {
    kind: String,
    code: String,
}

impl SalesChannel {
    /// Create a channel of `kind` identified by `code`.
    pub fn new(kind: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            code: code.into(),
        }
    }

    /// Channel type.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Channel code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Wire projection. Lossless.
    pub fn to_dto(&self) -> SalesChannelDto {
        SalesChannelDto {
            kind: self.kind.clone(),
            code: self.code.clone(),
        }
    }

    /// Build from the wire shape.
    pub fn from_dto(dto: &SalesChannelDto) -> Self {
        Self::new(dto.kind.clone(), dto.code.clone())
    }
}

impl PartialEq for SalesChannel {
    fn eq(&self, other: &Self) -> bool {
        text_eq(&self.kind, &other.kind) && text_eq(&self.code, &other.code)
    }
}

impl Eq for SalesChannel {}

impl Hash for SalesChannel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_text(&self.kind, state);
        hash_text(&self.code, state);
    }
}
