//! Typed identifiers and selectors
//!
//! Every definition in a vault (object type, class, property) is addressed
//! internally by a numeric [`PropertyId`], [`ClassId`] or [`ObjectTypeId`].
//! Configuration documents may refer to the same definition by numeric ID,
//! alias or GUID; a [`Selector`] captures whichever form was written and is
//! resolved once against the [`Vocabulary`](crate::Vocabulary).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Raw numeric value
            #[inline]
            #[must_use]
            pub fn get(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

numeric_id!(
    /// Property definition identifier
    PropertyId,
    "property"
);

numeric_id!(
    /// Class identifier
    ClassId,
    "class"
);

numeric_id!(
    /// Object type identifier
    ObjectTypeId,
    "object-type"
);

/// Reference to a definition as written in a configuration document
///
/// All three forms resolve to the same underlying definition and are
/// interchangeable for matching purposes.
///
/// # Examples
/// - `12` → [`Selector::Id`]
/// - `"PD.Country"` → [`Selector::Alias`]
/// - `"{0E1E5D4C-7A0B-4B61-9C1E-3B3E9E4C1D2A}"` → [`Selector::Guid`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Numeric identifier
    Id(u32),
    /// Vault alias
    Alias(String),
    /// Globally unique identifier
    Guid(Uuid),
}

impl Selector {
    /// Select by numeric identifier
    #[inline]
    #[must_use]
    pub fn id(id: u32) -> Self {
        Self::Id(id)
    }

    /// Select by alias
    #[inline]
    #[must_use]
    pub fn alias(alias: impl Into<String>) -> Self {
        Self::Alias(alias.into())
    }

    /// Select by GUID
    #[inline]
    #[must_use]
    pub fn guid(guid: Uuid) -> Self {
        Self::Guid(guid)
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Alias(alias) => write!(f, "{alias}"),
            Self::Guid(guid) => write!(f, "{{{}}}", guid.hyphenated().to_string().to_uppercase()),
        }
    }
}

impl FromStr for Selector {
    type Err = std::convert::Infallible;

    /// Numbers become IDs, GUID-shaped strings become GUIDs, anything else
    /// is taken as an alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<u32>() {
            return Ok(Self::Id(id));
        }
        if let Ok(guid) = Uuid::parse_str(trimmed) {
            return Ok(Self::Guid(guid));
        }
        Ok(Self::Alias(trimmed.to_string()))
    }
}

impl From<u32> for Selector {
    fn from(value: u32) -> Self {
        Self::Id(value)
    }
}

impl From<&str> for Selector {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(selector) => selector,
            Err(never) => match never {},
        }
    }
}

impl From<Uuid> for Selector {
    fn from(value: Uuid) -> Self {
        Self::Guid(value)
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Id(id) => serializer.serialize_u32(*id),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Id(u32),
            Text(String),
            Explicit(ExplicitSelector),
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "snake_case", deny_unknown_fields)]
        enum ExplicitSelector {
            Id(u32),
            Alias(String),
            Guid(Uuid),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Id(id) => Self::Id(id),
            Raw::Text(text) => Self::from(text.as_str()),
            Raw::Explicit(ExplicitSelector::Id(id)) => Self::Id(id),
            Raw::Explicit(ExplicitSelector::Alias(alias)) => Self::Alias(alias),
            Raw::Explicit(ExplicitSelector::Guid(guid)) => Self::Guid(guid),
        })
    }
}
