use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::domain::{Country, District, Locality, Region, Street};

/// A loose reference to one hierarchy level: nothing, a name to look up,
/// an opaque id, or an entity already in hand.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRef<T> {
    Unset,
    Name(String),
    Id(Uuid),
    Entity(T),
}

impl<T> EntityRef<T> {
    /// Name carried by this reference, empty for every other variant.
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            _ => "",
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

impl<T> Default for EntityRef<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> From<&str> for EntityRef<T> {
    fn from(name: &str) -> Self {
        if name.is_empty() {
            Self::Unset
        } else {
            Self::Name(name.to_string())
        }
    }
}

impl<T> From<String> for EntityRef<T> {
    fn from(name: String) -> Self {
        if name.is_empty() {
            Self::Unset
        } else {
            Self::Name(name)
        }
    }
}

impl<T> From<Uuid> for EntityRef<T> {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

// Payload fields arrive as JSON strings: a uuid-shaped string is an id,
// anything else is a name. Entities can only be passed in-process.
impl<'de, T> Deserialize<'de> for EntityRef<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(match value {
            None => Self::Unset,
            Some(text) if text.is_empty() => Self::Unset,
            Some(text) => match Uuid::parse_str(&text) {
                Ok(id) => Self::Id(id),
                Err(_) => Self::Name(text),
            },
        })
    }
}

/// Flat address intent handed to the resolution service. Every field is
/// optional; absent hierarchy levels are skipped unless their code field
/// still forces a lookup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AddressPayload {
    pub raw: String,
    pub country: EntityRef<Country>,
    pub country_code: String,
    pub region: EntityRef<Region>,
    pub region_code: String,
    pub district: EntityRef<District>,
    pub district_code: String,
    pub locality: EntityRef<Locality>,
    pub postal_code: String,
    pub street: EntityRef<Street>,
    pub street_number: String,
    pub apartment: String,
    pub formatted_address: String,
    pub latitude: f64,
    pub longitude: f64,
}
