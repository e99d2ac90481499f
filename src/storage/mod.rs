use std::future::Future;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{Address, Country, District, Locality, Region, Street};
use crate::error::StorageResult;

mod memory;

pub use memory::InMemoryStorage;

/// Repository contract for the six entity kinds. Host applications bring
/// their own backend; `InMemoryStorage` is the reference implementation.
///
/// `create_*` assigns the id and enforces uniqueness, parent-existence,
/// and field-width constraints, surfacing breaches as
/// `StorageError::ConstraintViolation`. `find_*` matches the full
/// (name, code/postal, parent) tuple; a `None` required-parent filter
/// matches nothing, while a `None` district filter matches localities
/// without a district.
#[async_trait]
pub trait Storage: Send + Sync {
    // Country operations
    async fn create_country(&self, country: &mut Country) -> StorageResult<()>;
    async fn get_country(&self, id: Uuid) -> StorageResult<Option<Country>>;
    async fn find_country(&self, name: &str, code: &str) -> StorageResult<Option<Country>>;
    async fn list_countries(&self) -> StorageResult<Vec<Country>>;
    /// Refused while any region still references the country.
    async fn delete_country(&self, id: Uuid) -> StorageResult<()>;

    // Region operations
    async fn create_region(&self, region: &mut Region) -> StorageResult<()>;
    async fn get_region(&self, id: Uuid) -> StorageResult<Option<Region>>;
    async fn find_region(
        &self,
        name: &str,
        code: &str,
        country_id: Option<Uuid>,
    ) -> StorageResult<Option<Region>>;
    async fn list_regions(&self) -> StorageResult<Vec<Region>>;
    async fn delete_region(&self, id: Uuid) -> StorageResult<()>;

    // District operations
    async fn create_district(&self, district: &mut District) -> StorageResult<()>;
    async fn get_district(&self, id: Uuid) -> StorageResult<Option<District>>;
    async fn find_district(
        &self,
        name: &str,
        code: &str,
        region_id: Option<Uuid>,
    ) -> StorageResult<Option<District>>;
    async fn list_districts(&self) -> StorageResult<Vec<District>>;
    async fn delete_district(&self, id: Uuid) -> StorageResult<()>;

    // Locality operations
    async fn create_locality(&self, locality: &mut Locality) -> StorageResult<()>;
    async fn get_locality(&self, id: Uuid) -> StorageResult<Option<Locality>>;
    async fn get_locality_by_slug(&self, slug: &str) -> StorageResult<Option<Locality>>;
    async fn find_locality(
        &self,
        name: &str,
        postal_code: &str,
        region_id: Option<Uuid>,
        district_id: Option<Uuid>,
    ) -> StorageResult<Option<Locality>>;
    async fn list_localities(&self) -> StorageResult<Vec<Locality>>;
    async fn delete_locality(&self, id: Uuid) -> StorageResult<()>;

    // Street operations
    async fn create_street(&self, street: &mut Street) -> StorageResult<()>;
    async fn get_street(&self, id: Uuid) -> StorageResult<Option<Street>>;
    async fn find_street(
        &self,
        name: &str,
        locality_id: Option<Uuid>,
    ) -> StorageResult<Option<Street>>;
    async fn list_streets(&self) -> StorageResult<Vec<Street>>;
    async fn delete_street(&self, id: Uuid) -> StorageResult<()>;

    // Address operations
    async fn create_address(&self, address: &mut Address) -> StorageResult<()>;
    async fn get_address(&self, id: Uuid) -> StorageResult<Option<Address>>;
    async fn list_addresses(&self) -> StorageResult<Vec<Address>>;

    // Transaction scopes. Scopes nest; an inner rollback only discards
    // writes made since its own `begin`.
    async fn begin(&self) -> StorageResult<()>;
    async fn commit(&self) -> StorageResult<()>;
    async fn rollback(&self) -> StorageResult<()>;
}

/// Runs `op` inside one failure-atomic scope: commits on success, rolls
/// every write back on error before propagating it.
pub async fn run_atomic<T, F>(storage: &dyn Storage, op: F) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    storage.begin().await?;
    match op.await {
        Ok(value) => {
            storage.commit().await?;
            Ok(value)
        }
        Err(error) => {
            warn!("rolling back atomic scope: {error}");
            storage.rollback().await?;
            Err(error)
        }
    }
}
