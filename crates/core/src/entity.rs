// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Syncable entity kinds and their local collections.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The domain record types that are written offline and replayed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Customer,
    Sale,
    Purchase,
    Supplier,
}

impl EntityKind {
    /// Every syncable kind, in a stable order.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Product,
        EntityKind::Customer,
        EntityKind::Sale,
        EntityKind::Purchase,
        EntityKind::Supplier,
    ];

    /// Returns the singular name used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Customer => "customer",
            EntityKind::Sale => "sale",
            EntityKind::Purchase => "purchase",
            EntityKind::Supplier => "supplier",
        }
    }

    /// Returns the collection name, which doubles as the REST path segment.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Customer => "customers",
            EntityKind::Sale => "sales",
            EntityKind::Purchase => "purchases",
            EntityKind::Supplier => "suppliers",
        }
    }

    /// Infers the entity kind from a request URL by its path segments.
    ///
    /// Only used for queue entries that predate the explicit request target.
    /// Returns `None` for paths that name no known collection.
    pub fn from_url(url: &str) -> Option<EntityKind> {
        // Drop scheme and authority so a host name never matches a collection.
        let path = match url.split_once("://") {
            Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or_default(),
            None => url,
        };
        let path = path.split(['?', '#']).next().unwrap_or_default();

        path.split('/')
            .filter(|segment| !segment.is_empty())
            .find_map(|segment| {
                EntityKind::ALL
                    .into_iter()
                    .find(|kind| kind.collection() == segment)
            })
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    /// Accepts both the singular name and the collection name.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower || kind.collection() == lower)
            .ok_or_else(|| Error::InvalidEntity(s.to_string()))
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
