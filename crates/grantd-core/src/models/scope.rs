// ABOUTME: Scope set type with space-delimited wire form and comma-delimited storage form
// ABOUTME: Provides set operations used for grant narrowing and scope verification
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

/// A set of granted or requested scope strings
///
/// Externally a scope is a space-delimited string (`"feed feed:all"`); in
/// storage it is a comma-delimited list. Ordering is normalized so two equal
/// sets always render identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope(BTreeSet<String>);

impl Scope {
    /// Parse the external, space-delimited form
    #[must_use]
    pub fn parse(value: &str) -> Self {
        Self::from_iter_str(value.split_whitespace())
    }

    /// Parse the storage form
    #[must_use]
    pub fn from_storage(value: &str) -> Self {
        Self::from_iter_str(value.split(',').map(str::trim))
    }

    fn from_iter_str<'a>(parts: impl Iterator<Item = &'a str>) -> Self {
        Self(
            parts
                .filter(|part| !part.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
        )
    }

    /// Render the storage form
    #[must_use]
    pub fn to_storage(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }

    /// Whether the set contains `scope`
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Whether the two sets share at least one element
    #[must_use]
    pub fn intersects<'a>(&self, other: impl IntoIterator<Item = &'a str>) -> bool {
        other.into_iter().any(|scope| self.contains(scope))
    }

    /// Whether every element of `self` is in `other`
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Add a scope string
    pub fn insert(&mut self, scope: impl Into<String>) {
        self.0.insert(scope.into());
    }

    /// Iterate the scope strings in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.iter().collect::<Vec<_>>().join(" "))
    }
}

impl<S: Into<String>> FromIterator<S> for Scope {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}
