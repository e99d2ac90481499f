use serde_json::{json, Value};

use crate::domain::{Address, Country, District, Locality, Region, Street};
use crate::error::StorageResult;
use crate::storage::Storage;

/// A resolved address together with its hierarchy chain, loaded once from
/// storage. Both renderings are computed on demand, never cached back
/// onto the entity.
#[derive(Debug, Clone)]
pub struct AddressView {
    pub address: Address,
    pub street: Option<Street>,
    pub locality: Option<Locality>,
    pub district: Option<District>,
    pub region: Option<Region>,
    pub country: Option<Country>,
}

impl AddressView {
    pub async fn load(address: Address, storage: &dyn Storage) -> StorageResult<Self> {
        let street = match address.street_id {
            Some(id) => storage.get_street(id).await?,
            None => None,
        };
        let locality = match address.locality_id {
            Some(id) => storage.get_locality(id).await?,
            None => None,
        };
        let district = match locality.as_ref().and_then(|l| l.district_id) {
            Some(id) => storage.get_district(id).await?,
            None => None,
        };
        let region = match locality.as_ref().map(|l| l.region_id) {
            Some(id) => storage.get_region(id).await?,
            None => None,
        };
        let country = match region.as_ref().map(|r| r.country_id) {
            Some(id) => storage.get_country(id).await?,
            None => None,
        };
        Ok(Self {
            address,
            street,
            locality,
            district,
            region,
            country,
        })
    }

    /// Canonical human-readable rendering. An explicit formatted address
    /// wins; otherwise the street/route chain is assembled, each level
    /// falling back to its code and dropping out entirely when both name
    /// and code are empty; with no street and no route, the raw text is
    /// returned verbatim.
    pub fn canonical_string(&self) -> String {
        if !self.address.formatted_address.is_empty() {
            return self.address.formatted_address.clone();
        }

        let route = self
            .street
            .as_ref()
            .map(|street| street.name.as_str())
            .unwrap_or(&self.address.route);
        if route.is_empty() {
            return self.address.raw.clone();
        }

        let mut parts = vec![route.to_string()];
        if !self.address.street_number.is_empty() {
            parts.push(self.address.street_number.clone());
        }
        if !self.address.apartment.is_empty() {
            parts.push(self.address.apartment.clone());
        }
        if let Some(locality) = &self.locality {
            if !locality.name.is_empty() {
                parts.push(locality.name.clone());
            }
            if let Some(district) = &self.district {
                if !district.display_name().is_empty() {
                    parts.push(district.display_name().to_string());
                }
            }
            if let Some(region) = &self.region {
                if !region.display_name().is_empty() {
                    parts.push(region.display_name().to_string());
                }
            }
            if let Some(country) = &self.country {
                if !country.display_name().is_empty() {
                    parts.push(country.display_name().to_string());
                }
            }
        }
        parts.join(", ")
    }

    /// Structured rendering. `locality` and `street` are always present,
    /// as empty strings when absent. The `country` block mirrors the
    /// region: localities keep no country back-reference and downstream
    /// consumers rely on this shape.
    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "raw": self.address.raw,
            "locality": self.locality.as_ref().map(Locality::to_value).unwrap_or_else(|| json!("")),
            "street": self.street.as_ref().map(Street::to_value).unwrap_or_else(|| json!("")),
            "route": self.address.route,
            "street_number": self.address.street_number,
            "latitude": self.address.latitude,
            "longitude": self.address.longitude,
            "formatted_address": self.address.formatted_address,
        });
        if let Some(region) = &self.region {
            value["country"] = region.to_value();
            value["region"] = region.to_value();
        }
        if let Some(district) = &self.district {
            value["district"] = district.to_value();
        }
        value
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}
