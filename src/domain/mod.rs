use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Country, the root of the hierarchy. `code` is an ISO-style short code
/// and may stand in for the name when the name is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: Option<Uuid>,
    pub name: String,
    pub code: String,
}

/// First-level administrative area (state, region, oblast).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: Option<Uuid>,
    pub name: String,
    pub code: String,
    pub country_id: Uuid,
}

/// Second-level administrative area inside a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    pub id: Option<Uuid>,
    pub name: String,
    pub code: String,
    pub region_id: Uuid,
}

/// City, town, or village. The slug is derived from the name at create
/// time when not supplied and must stay unique across all localities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locality {
    pub id: Option<Uuid>,
    pub name: String,
    pub postal_code: String,
    pub slug: String,
    pub region_id: Uuid,
    pub district_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Street {
    pub id: Option<Uuid>,
    pub name: String,
    pub locality_id: Uuid,
}

/// One stored address. Addresses are never deduplicated: every successful
/// resolution creates a new row. Defaults (route, locality, formatted
/// address) are filled in once, before creation, and never re-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: Option<Uuid>,
    pub raw: String,
    pub route: String,
    pub street_number: String,
    pub apartment: String,
    pub formatted_address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub locality_id: Option<Uuid>,
    pub street_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Country {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.code
        } else {
            &self.name
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "code": self.code,
        })
    }
}

impl Region {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.code
        } else {
            &self.name
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "code": self.code,
            "country_id": self.country_id,
        })
    }
}

impl District {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.code
        } else {
            &self.name
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "code": self.code,
            "region_id": self.region_id,
        })
    }
}

impl Locality {
    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "postal_code": self.postal_code,
            "slug": self.slug,
            "region_id": self.region_id,
            "district_id": self.district_id,
        })
    }
}

impl Street {
    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "locality_id": self.locality_id,
        })
    }
}

/// Lowercases, keeps alphanumerics, and collapses separator runs into
/// single hyphens.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
