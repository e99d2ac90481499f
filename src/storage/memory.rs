use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::Storage;
use crate::domain::{slugify, Address, Country, District, Locality, Region, Street};
use crate::error::{StorageError, StorageResult};

/// In-memory storage backend for development and testing. A mutex guards
/// one set of tables; transaction scopes push whole-table snapshots, so
/// scopes nest and a rollback restores exactly the state at its `begin`.
pub struct InMemoryStorage {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    tables: Tables,
    snapshots: Vec<Tables>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    countries: HashMap<Uuid, Country>,
    regions: HashMap<Uuid, Region>,
    districts: HashMap<Uuid, District>,
    localities: HashMap<Uuid, Locality>,
    streets: HashMap<Uuid, Street>,
    addresses: HashMap<Uuid, Address>,
}

fn check_width(entity: &str, field: &str, value: &str, max: usize) -> StorageResult<()> {
    if value.chars().count() > max {
        return Err(StorageError::ConstraintViolation(format!(
            "{entity}.{field} exceeds {max} characters"
        )));
    }
    Ok(())
}

impl Tables {
    // Ordering keys recurse through parents: regions order by
    // (country name, name), districts by (region key, name), localities
    // by (region key, district key, name) with district-less rows first.
    fn country_key(&self, id: Uuid) -> String {
        self.countries
            .get(&id)
            .map(|country| country.name.clone())
            .unwrap_or_default()
    }

    fn region_key(&self, region: &Region) -> (String, String) {
        (self.country_key(region.country_id), region.name.clone())
    }

    fn region_key_by_id(&self, id: Uuid) -> (String, String) {
        self.regions
            .get(&id)
            .map(|region| self.region_key(region))
            .unwrap_or_default()
    }

    fn district_key(&self, district: &District) -> ((String, String), String) {
        (
            self.region_key_by_id(district.region_id),
            district.name.clone(),
        )
    }

    fn district_key_by_id(&self, id: Uuid) -> ((String, String), String) {
        self.districts
            .get(&id)
            .map(|district| self.district_key(district))
            .unwrap_or_default()
    }

    #[allow(clippy::type_complexity)]
    fn locality_key(
        &self,
        locality: &Locality,
    ) -> ((String, String), Option<((String, String), String)>, String) {
        (
            self.region_key_by_id(locality.region_id),
            locality.district_id.map(|id| self.district_key_by_id(id)),
            locality.name.clone(),
        )
    }

    // Cascading deletes, child-most first.
    fn cascade_street(&mut self, id: Uuid) {
        self.streets.remove(&id);
        self.addresses.retain(|_, address| address.street_id != Some(id));
    }

    fn cascade_locality(&mut self, id: Uuid) {
        self.localities.remove(&id);
        let street_ids: Vec<Uuid> = self
            .streets
            .values()
            .filter(|street| street.locality_id == id)
            .filter_map(|street| street.id)
            .collect();
        for street_id in street_ids {
            self.cascade_street(street_id);
        }
        self.addresses.retain(|_, address| address.locality_id != Some(id));
    }

    fn cascade_district(&mut self, id: Uuid) {
        self.districts.remove(&id);
        let locality_ids: Vec<Uuid> = self
            .localities
            .values()
            .filter(|locality| locality.district_id == Some(id))
            .filter_map(|locality| locality.id)
            .collect();
        for locality_id in locality_ids {
            self.cascade_locality(locality_id);
        }
    }

    fn cascade_region(&mut self, id: Uuid) {
        self.regions.remove(&id);
        let district_ids: Vec<Uuid> = self
            .districts
            .values()
            .filter(|district| district.region_id == id)
            .filter_map(|district| district.id)
            .collect();
        for district_id in district_ids {
            self.cascade_district(district_id);
        }
        let locality_ids: Vec<Uuid> = self
            .localities
            .values()
            .filter(|locality| locality.region_id == id)
            .filter_map(|locality| locality.id)
            .collect();
        for locality_id in locality_ids {
            self.cascade_locality(locality_id);
        }
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_country(&self, country: &mut Country) -> StorageResult<()> {
        check_width("country", "name", &country.name, 50)?;
        check_width("country", "code", &country.code, 2)?;

        let mut state = self.state.lock().unwrap();
        if state
            .tables
            .countries
            .values()
            .any(|existing| existing.name == country.name)
        {
            return Err(StorageError::ConstraintViolation(format!(
                "country name {:?} already exists",
                country.name
            )));
        }

        let id = Uuid::new_v4();
        country.id = Some(id);
        state.tables.countries.insert(id, country.clone());

        debug!("created country {} with id {}", country.display_name(), id);
        Ok(())
    }

    async fn get_country(&self, id: Uuid) -> StorageResult<Option<Country>> {
        let state = self.state.lock().unwrap();
        Ok(state.tables.countries.get(&id).cloned())
    }

    async fn find_country(&self, name: &str, code: &str) -> StorageResult<Option<Country>> {
        let state = self.state.lock().unwrap();
        let country = state
            .tables
            .countries
            .values()
            .find(|country| country.name == name && country.code == code)
            .cloned();
        Ok(country)
    }

    async fn list_countries(&self) -> StorageResult<Vec<Country>> {
        let state = self.state.lock().unwrap();
        let mut countries: Vec<Country> = state.tables.countries.values().cloned().collect();
        countries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(countries)
    }

    async fn delete_country(&self, id: Uuid) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        if state
            .tables
            .regions
            .values()
            .any(|region| region.country_id == id)
        {
            return Err(StorageError::ConstraintViolation(
                "country is still referenced by a region".to_string(),
            ));
        }
        state.tables.countries.remove(&id);
        Ok(())
    }

    async fn create_region(&self, region: &mut Region) -> StorageResult<()> {
        check_width("region", "name", &region.name, 150)?;
        check_width("region", "code", &region.code, 5)?;

        let mut state = self.state.lock().unwrap();
        if !state.tables.countries.contains_key(&region.country_id) {
            return Err(StorageError::ConstraintViolation(
                "region requires an existing country".to_string(),
            ));
        }
        if state
            .tables
            .regions
            .values()
            .any(|existing| existing.name == region.name && existing.country_id == region.country_id)
        {
            return Err(StorageError::ConstraintViolation(format!(
                "region name {:?} already exists in this country",
                region.name
            )));
        }

        let id = Uuid::new_v4();
        region.id = Some(id);
        state.tables.regions.insert(id, region.clone());

        debug!("created region {} with id {}", region.display_name(), id);
        Ok(())
    }

    async fn get_region(&self, id: Uuid) -> StorageResult<Option<Region>> {
        let state = self.state.lock().unwrap();
        Ok(state.tables.regions.get(&id).cloned())
    }

    async fn find_region(
        &self,
        name: &str,
        code: &str,
        country_id: Option<Uuid>,
    ) -> StorageResult<Option<Region>> {
        let state = self.state.lock().unwrap();
        let region = state
            .tables
            .regions
            .values()
            .find(|region| {
                region.name == name && region.code == code && Some(region.country_id) == country_id
            })
            .cloned();
        Ok(region)
    }

    async fn list_regions(&self) -> StorageResult<Vec<Region>> {
        let state = self.state.lock().unwrap();
        let mut regions: Vec<Region> = state.tables.regions.values().cloned().collect();
        regions.sort_by_key(|region| state.tables.region_key(region));
        Ok(regions)
    }

    async fn delete_region(&self, id: Uuid) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        state.tables.cascade_region(id);
        Ok(())
    }

    async fn create_district(&self, district: &mut District) -> StorageResult<()> {
        check_width("district", "name", &district.name, 150)?;
        check_width("district", "code", &district.code, 5)?;

        let mut state = self.state.lock().unwrap();
        if !state.tables.regions.contains_key(&district.region_id) {
            return Err(StorageError::ConstraintViolation(
                "district requires an existing region".to_string(),
            ));
        }
        if state
            .tables
            .districts
            .values()
            .any(|existing| existing.name == district.name && existing.region_id == district.region_id)
        {
            return Err(StorageError::ConstraintViolation(format!(
                "district name {:?} already exists in this region",
                district.name
            )));
        }

        let id = Uuid::new_v4();
        district.id = Some(id);
        state.tables.districts.insert(id, district.clone());

        debug!("created district {} with id {}", district.display_name(), id);
        Ok(())
    }

    async fn get_district(&self, id: Uuid) -> StorageResult<Option<District>> {
        let state = self.state.lock().unwrap();
        Ok(state.tables.districts.get(&id).cloned())
    }

    async fn find_district(
        &self,
        name: &str,
        code: &str,
        region_id: Option<Uuid>,
    ) -> StorageResult<Option<District>> {
        let state = self.state.lock().unwrap();
        let district = state
            .tables
            .districts
            .values()
            .find(|district| {
                district.name == name
                    && district.code == code
                    && Some(district.region_id) == region_id
            })
            .cloned();
        Ok(district)
    }

    async fn list_districts(&self) -> StorageResult<Vec<District>> {
        let state = self.state.lock().unwrap();
        let mut districts: Vec<District> = state.tables.districts.values().cloned().collect();
        districts.sort_by_key(|district| state.tables.district_key(district));
        Ok(districts)
    }

    async fn delete_district(&self, id: Uuid) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        state.tables.cascade_district(id);
        Ok(())
    }

    async fn create_locality(&self, locality: &mut Locality) -> StorageResult<()> {
        check_width("locality", "name", &locality.name, 100)?;
        check_width("locality", "postal_code", &locality.postal_code, 10)?;

        if locality.slug.is_empty() {
            locality.slug = slugify(&locality.name);
        }
        check_width("locality", "slug", &locality.slug, 100)?;

        let mut state = self.state.lock().unwrap();
        if !state.tables.regions.contains_key(&locality.region_id) {
            return Err(StorageError::ConstraintViolation(
                "locality requires an existing region".to_string(),
            ));
        }
        if let Some(district_id) = locality.district_id {
            if !state.tables.districts.contains_key(&district_id) {
                return Err(StorageError::ConstraintViolation(
                    "locality references an unknown district".to_string(),
                ));
            }
        }
        if state
            .tables
            .localities
            .values()
            .any(|existing| existing.slug == locality.slug)
        {
            return Err(StorageError::ConstraintViolation(format!(
                "locality slug {:?} already exists",
                locality.slug
            )));
        }

        let id = Uuid::new_v4();
        locality.id = Some(id);
        state.tables.localities.insert(id, locality.clone());

        debug!("created locality {} with id {}", locality.name, id);
        Ok(())
    }

    async fn get_locality(&self, id: Uuid) -> StorageResult<Option<Locality>> {
        let state = self.state.lock().unwrap();
        Ok(state.tables.localities.get(&id).cloned())
    }

    async fn get_locality_by_slug(&self, slug: &str) -> StorageResult<Option<Locality>> {
        let state = self.state.lock().unwrap();
        let locality = state
            .tables
            .localities
            .values()
            .find(|locality| locality.slug == slug)
            .cloned();
        Ok(locality)
    }

    async fn find_locality(
        &self,
        name: &str,
        postal_code: &str,
        region_id: Option<Uuid>,
        district_id: Option<Uuid>,
    ) -> StorageResult<Option<Locality>> {
        let state = self.state.lock().unwrap();
        let locality = state
            .tables
            .localities
            .values()
            .find(|locality| {
                locality.name == name
                    && locality.postal_code == postal_code
                    && Some(locality.region_id) == region_id
                    && locality.district_id == district_id
            })
            .cloned();
        Ok(locality)
    }

    async fn list_localities(&self) -> StorageResult<Vec<Locality>> {
        let state = self.state.lock().unwrap();
        let mut localities: Vec<Locality> = state.tables.localities.values().cloned().collect();
        localities.sort_by_key(|locality| state.tables.locality_key(locality));
        Ok(localities)
    }

    async fn delete_locality(&self, id: Uuid) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        state.tables.cascade_locality(id);
        Ok(())
    }

    async fn create_street(&self, street: &mut Street) -> StorageResult<()> {
        check_width("street", "name", &street.name, 256)?;

        let mut state = self.state.lock().unwrap();
        if !state.tables.localities.contains_key(&street.locality_id) {
            return Err(StorageError::ConstraintViolation(
                "street requires an existing locality".to_string(),
            ));
        }
        if state
            .tables
            .streets
            .values()
            .any(|existing| existing.name == street.name && existing.locality_id == street.locality_id)
        {
            return Err(StorageError::ConstraintViolation(format!(
                "street name {:?} already exists in this locality",
                street.name
            )));
        }

        let id = Uuid::new_v4();
        street.id = Some(id);
        state.tables.streets.insert(id, street.clone());

        debug!("created street {} with id {}", street.name, id);
        Ok(())
    }

    async fn get_street(&self, id: Uuid) -> StorageResult<Option<Street>> {
        let state = self.state.lock().unwrap();
        Ok(state.tables.streets.get(&id).cloned())
    }

    async fn find_street(
        &self,
        name: &str,
        locality_id: Option<Uuid>,
    ) -> StorageResult<Option<Street>> {
        let state = self.state.lock().unwrap();
        let street = state
            .tables
            .streets
            .values()
            .find(|street| street.name == name && Some(street.locality_id) == locality_id)
            .cloned();
        Ok(street)
    }

    async fn list_streets(&self) -> StorageResult<Vec<Street>> {
        let state = self.state.lock().unwrap();
        let mut streets: Vec<Street> = state.tables.streets.values().cloned().collect();
        streets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(streets)
    }

    async fn delete_street(&self, id: Uuid) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        state.tables.cascade_street(id);
        Ok(())
    }

    async fn create_address(&self, address: &mut Address) -> StorageResult<()> {
        check_width("address", "raw", &address.raw, 256)?;
        check_width("address", "route", &address.route, 256)?;
        check_width("address", "street_number", &address.street_number, 20)?;
        check_width("address", "apartment", &address.apartment, 10)?;
        check_width("address", "formatted_address", &address.formatted_address, 200)?;

        let mut state = self.state.lock().unwrap();
        if let Some(locality_id) = address.locality_id {
            if !state.tables.localities.contains_key(&locality_id) {
                return Err(StorageError::ConstraintViolation(
                    "address references an unknown locality".to_string(),
                ));
            }
        }
        if let Some(street_id) = address.street_id {
            if !state.tables.streets.contains_key(&street_id) {
                return Err(StorageError::ConstraintViolation(
                    "address references an unknown street".to_string(),
                ));
            }
        }

        let id = Uuid::new_v4();
        address.id = Some(id);
        state.tables.addresses.insert(id, address.clone());

        debug!("created address with id {}", id);
        Ok(())
    }

    async fn get_address(&self, id: Uuid) -> StorageResult<Option<Address>> {
        let state = self.state.lock().unwrap();
        Ok(state.tables.addresses.get(&id).cloned())
    }

    async fn list_addresses(&self) -> StorageResult<Vec<Address>> {
        let state = self.state.lock().unwrap();
        let mut addresses: Vec<Address> = state.tables.addresses.values().cloned().collect();
        addresses.sort_by_key(|address| (address.created_at, address.id));
        Ok(addresses)
    }

    async fn begin(&self) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        let snapshot = state.tables.clone();
        state.snapshots.push(snapshot);
        Ok(())
    }

    async fn commit(&self) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .snapshots
            .pop()
            .ok_or_else(|| StorageError::Backend("commit outside of a transaction scope".to_string()))?;
        Ok(())
    }

    async fn rollback(&self) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        let snapshot = state
            .snapshots
            .pop()
            .ok_or_else(|| StorageError::Backend("rollback outside of a transaction scope".to_string()))?;
        state.tables = snapshot;
        Ok(())
    }
}
