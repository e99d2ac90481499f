use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Address, Country, District, Locality, Region, Street};
use crate::error::{AddressResolutionError, StorageError, StorageResult};
use crate::payload::{AddressPayload, EntityRef};
use crate::storage::{run_atomic, Storage};
use crate::view::AddressView;

#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// When false, missing entities are left unresolved instead of being
    /// created; the address row is still written.
    pub create: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { create: true }
    }
}

/// Hierarchy entities pinned down while resolving one payload. Levels
/// resolved for a parent are reused by every later sibling lookup.
#[derive(Debug, Clone, Default)]
pub struct ResolvedChain {
    pub country: Option<Country>,
    pub region: Option<Region>,
    pub district: Option<District>,
    pub locality: Option<Locality>,
    pub street: Option<Street>,
}

/// Walks a flat payload top-down (country, region, district, locality,
/// street), reusing or creating each level, then persists one canonical
/// address. The whole walk is one failure-atomic unit of work.
pub struct AddressResolver {
    storage: Arc<dyn Storage>,
}

impl AddressResolver {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn resolve_and_save(
        &self,
        payload: AddressPayload,
    ) -> Result<Address, AddressResolutionError> {
        self.resolve_and_save_with(payload, ResolveOptions::default())
            .await
    }

    pub async fn resolve_and_save_with(
        &self,
        payload: AddressPayload,
        options: ResolveOptions,
    ) -> Result<Address, AddressResolutionError> {
        let address = run_atomic(self.storage.as_ref(), async {
            let mut chain = ResolvedChain::default();
            self.resolve_chain(&payload, &mut chain, options.create)
                .await?;
            let mut address = self.finalize(&payload, &chain).await?;
            self.storage.create_address(&mut address).await?;
            Ok(address)
        })
        .await?;

        info!(
            address_id = %address.id.unwrap_or_default(),
            "resolved address {:?}",
            address.formatted_address
        );
        Ok(address)
    }

    /// Resolves every hierarchy level without writing an address row.
    /// Useful for lookups; levels that cannot be resolved stay `None`.
    pub async fn resolve_chain(
        &self,
        payload: &AddressPayload,
        chain: &mut ResolvedChain,
        create: bool,
    ) -> StorageResult<()> {
        self.resolve_country(payload, chain, create).await?;
        self.resolve_region(payload, chain, create).await?;
        self.resolve_district(payload, chain, create).await?;
        self.resolve_locality(payload, chain, create).await?;
        self.resolve_street(payload, chain, create).await?;
        Ok(())
    }

    async fn resolve_country(
        &self,
        payload: &AddressPayload,
        chain: &mut ResolvedChain,
        create: bool,
    ) -> StorageResult<()> {
        if chain.country.is_some() {
            return Ok(());
        }
        let resolved = match &payload.country {
            EntityRef::Entity(country) => Some(country.clone()),
            EntityRef::Id(id) => self.storage.get_country(*id).await?,
            reference => {
                let name = reference.name();
                if name.is_empty() && payload.country_code.is_empty() {
                    None
                } else {
                    run_atomic(self.storage.as_ref(), async {
                        if let Some(found) =
                            self.storage.find_country(name, &payload.country_code).await?
                        {
                            debug!("reusing country {}", found.display_name());
                            return Ok(Some(found));
                        }
                        if !create {
                            return Ok(None);
                        }
                        let mut country = Country {
                            id: None,
                            name: name.to_string(),
                            code: payload.country_code.clone(),
                        };
                        self.storage.create_country(&mut country).await?;
                        Ok(Some(country))
                    })
                    .await?
                }
            }
        };
        chain.country = resolved;
        Ok(())
    }

    async fn resolve_region(
        &self,
        payload: &AddressPayload,
        chain: &mut ResolvedChain,
        create: bool,
    ) -> StorageResult<()> {
        if chain.region.is_some() {
            return Ok(());
        }
        let resolved = match &payload.region {
            EntityRef::Entity(region) => Some(region.clone()),
            EntityRef::Id(id) => self.storage.get_region(*id).await?,
            reference => {
                let name = reference.name();
                if name.is_empty() && payload.region_code.is_empty() {
                    None
                } else {
                    run_atomic(self.storage.as_ref(), async {
                        if chain.country.is_none() && create {
                            self.resolve_country(payload, chain, create).await?;
                        }
                        let country_id = chain.country.as_ref().and_then(|c| c.id);
                        if let Some(found) = self
                            .storage
                            .find_region(name, &payload.region_code, country_id)
                            .await?
                        {
                            debug!("reusing region {}", found.display_name());
                            return Ok(Some(found));
                        }
                        if !create {
                            return Ok(None);
                        }
                        let Some(country_id) = country_id else {
                            return Err(StorageError::ConstraintViolation(
                                "region requires an existing country".to_string(),
                            ));
                        };
                        let mut region = Region {
                            id: None,
                            name: name.to_string(),
                            code: payload.region_code.clone(),
                            country_id,
                        };
                        self.storage.create_region(&mut region).await?;
                        Ok(Some(region))
                    })
                    .await?
                }
            }
        };
        chain.region = resolved;
        Ok(())
    }

    async fn resolve_district(
        &self,
        payload: &AddressPayload,
        chain: &mut ResolvedChain,
        create: bool,
    ) -> StorageResult<()> {
        if chain.district.is_some() {
            return Ok(());
        }
        let resolved = match &payload.district {
            EntityRef::Entity(district) => Some(district.clone()),
            EntityRef::Id(id) => self.storage.get_district(*id).await?,
            reference => {
                let name = reference.name();
                if name.is_empty() && payload.district_code.is_empty() {
                    None
                } else {
                    run_atomic(self.storage.as_ref(), async {
                        if chain.region.is_none() && create {
                            self.resolve_region(payload, chain, create).await?;
                        }
                        let region_id = chain.region.as_ref().and_then(|r| r.id);
                        if let Some(found) = self
                            .storage
                            .find_district(name, &payload.district_code, region_id)
                            .await?
                        {
                            debug!("reusing district {}", found.display_name());
                            return Ok(Some(found));
                        }
                        if !create {
                            return Ok(None);
                        }
                        let Some(region_id) = region_id else {
                            return Err(StorageError::ConstraintViolation(
                                "district requires an existing region".to_string(),
                            ));
                        };
                        let mut district = District {
                            id: None,
                            name: name.to_string(),
                            code: payload.district_code.clone(),
                            region_id,
                        };
                        self.storage.create_district(&mut district).await?;
                        Ok(Some(district))
                    })
                    .await?
                }
            }
        };
        chain.district = resolved;
        Ok(())
    }

    async fn resolve_locality(
        &self,
        payload: &AddressPayload,
        chain: &mut ResolvedChain,
        create: bool,
    ) -> StorageResult<()> {
        if chain.locality.is_some() {
            return Ok(());
        }
        let resolved = match &payload.locality {
            EntityRef::Entity(locality) => Some(locality.clone()),
            EntityRef::Id(id) => self.storage.get_locality(*id).await?,
            reference => {
                let name = reference.name();
                if name.is_empty() && payload.postal_code.is_empty() {
                    None
                } else {
                    run_atomic(self.storage.as_ref(), async {
                        if chain.region.is_none() && create {
                            self.resolve_region(payload, chain, create).await?;
                        }
                        if chain.district.is_none() && create {
                            self.resolve_district(payload, chain, create).await?;
                        }
                        let region_id = chain.region.as_ref().and_then(|r| r.id);
                        let district_id = chain.district.as_ref().and_then(|d| d.id);
                        if let Some(found) = self
                            .storage
                            .find_locality(name, &payload.postal_code, region_id, district_id)
                            .await?
                        {
                            debug!("reusing locality {}", found.name);
                            return Ok(Some(found));
                        }
                        if !create {
                            return Ok(None);
                        }
                        let Some(region_id) = region_id else {
                            return Err(StorageError::ConstraintViolation(
                                "locality requires an existing region".to_string(),
                            ));
                        };
                        let mut locality = Locality {
                            id: None,
                            name: name.to_string(),
                            postal_code: payload.postal_code.clone(),
                            slug: String::new(),
                            region_id,
                            district_id,
                        };
                        self.storage.create_locality(&mut locality).await?;
                        Ok(Some(locality))
                    })
                    .await?
                }
            }
        };
        chain.locality = resolved;
        Ok(())
    }

    async fn resolve_street(
        &self,
        payload: &AddressPayload,
        chain: &mut ResolvedChain,
        create: bool,
    ) -> StorageResult<()> {
        if chain.street.is_some() {
            return Ok(());
        }
        let resolved = match &payload.street {
            EntityRef::Entity(street) => Some(street.clone()),
            EntityRef::Id(id) => self.storage.get_street(*id).await?,
            reference => {
                let name = reference.name();
                if name.is_empty() {
                    None
                } else {
                    run_atomic(self.storage.as_ref(), async {
                        if chain.locality.is_none() && create {
                            self.resolve_locality(payload, chain, create).await?;
                        }
                        let locality_id = chain.locality.as_ref().and_then(|l| l.id);
                        if let Some(found) = self.storage.find_street(name, locality_id).await? {
                            debug!("reusing street {}", found.name);
                            return Ok(Some(found));
                        }
                        if !create {
                            return Ok(None);
                        }
                        let Some(locality_id) = locality_id else {
                            return Err(StorageError::ConstraintViolation(
                                "street requires an existing locality".to_string(),
                            ));
                        };
                        let mut street = Street {
                            id: None,
                            name: name.to_string(),
                            locality_id,
                        };
                        self.storage.create_street(&mut street).await?;
                        Ok(Some(street))
                    })
                    .await?
                }
            }
        };
        chain.street = resolved;
        Ok(())
    }

    /// Builds the final address row. A resolved street pins the locality
    /// and the route; everything else is copied verbatim from the payload.
    /// The formatted address falls back to the canonical rendering — an
    /// explicit normalization step here, never a side effect of create.
    async fn finalize(
        &self,
        payload: &AddressPayload,
        chain: &ResolvedChain,
    ) -> StorageResult<Address> {
        let street_id = chain.street.as_ref().and_then(|s| s.id);
        let locality_id: Option<Uuid> = match &chain.street {
            Some(street) => Some(street.locality_id),
            None => chain.locality.as_ref().and_then(|l| l.id),
        };
        let route = chain
            .street
            .as_ref()
            .map(|street| street.name.clone())
            .unwrap_or_default();

        let mut address = Address {
            id: None,
            raw: payload.raw.clone(),
            route,
            street_number: payload.street_number.clone(),
            apartment: payload.apartment.clone(),
            formatted_address: payload.formatted_address.clone(),
            latitude: payload.latitude,
            longitude: payload.longitude,
            locality_id,
            street_id,
            created_at: Utc::now(),
        };

        if address.formatted_address.is_empty() {
            let view = AddressView::load(address.clone(), self.storage.as_ref()).await?;
            address.formatted_address = view.canonical_string();
        }
        Ok(address)
    }
}
