use std::sync::Arc;

use address_core::{
    run_atomic, Address, Country, District, InMemoryStorage, Locality, Region, Storage,
    StorageError, Street,
};
use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

async fn country(storage: &dyn Storage, name: &str, code: &str) -> Country {
    let mut country = Country {
        id: None,
        name: name.to_string(),
        code: code.to_string(),
    };
    storage.create_country(&mut country).await.unwrap();
    country
}

async fn region(storage: &dyn Storage, name: &str, code: &str, country: &Country) -> Region {
    let mut region = Region {
        id: None,
        name: name.to_string(),
        code: code.to_string(),
        country_id: country.id.unwrap(),
    };
    storage.create_region(&mut region).await.unwrap();
    region
}

async fn district(storage: &dyn Storage, name: &str, code: &str, region: &Region) -> District {
    let mut district = District {
        id: None,
        name: name.to_string(),
        code: code.to_string(),
        region_id: region.id.unwrap(),
    };
    storage.create_district(&mut district).await.unwrap();
    district
}

async fn locality(
    storage: &dyn Storage,
    name: &str,
    region: &Region,
    district: Option<&District>,
) -> Locality {
    let mut locality = Locality {
        id: None,
        name: name.to_string(),
        postal_code: String::new(),
        slug: String::new(),
        region_id: region.id.unwrap(),
        district_id: district.and_then(|d| d.id),
    };
    storage.create_locality(&mut locality).await.unwrap();
    locality
}

async fn street(storage: &dyn Storage, name: &str, locality: &Locality) -> Street {
    let mut street = Street {
        id: None,
        name: name.to_string(),
        locality_id: locality.id.unwrap(),
    };
    storage.create_street(&mut street).await.unwrap();
    street
}

struct Fixture {
    storage: Arc<dyn Storage>,
    ua: Country,
    ua_kv: Region,
    ua_ks: Region,
    fr_nor: Region,
    fr_nor_perche: District,
    kherson: Locality,
    ushakova: Street,
}

async fn seed() -> Fixture {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let s = storage.as_ref();

    let ua = country(s, "Ukraine", "UA").await;
    let fr = country(s, "France", "FR").await;
    let au = country(s, "Australia", "AU").await;

    let ua_kv = region(s, "Kyiv", "KV", &ua).await;
    let ua_ks = region(s, "Kherson region", "KS", &ua).await;
    let fr_nor = region(s, "Normandie", "NOR", &fr).await;
    let fr_occ = region(s, "Occitanie", "OCC", &fr).await;
    region(s, "Queensland", "QLD", &au).await;

    district(s, "Obolon", "", &ua_kv).await;
    let fr_nor_bessin = district(s, "Bessin", "", &fr_nor).await;
    let fr_nor_perche = district(s, "Perche", "", &fr_nor).await;
    district(s, "Gard", "30", &fr_occ).await;

    locality(s, "Kiev", &ua_kv, None).await;
    let kherson = locality(s, "Kherson", &ua_ks, None).await;
    locality(s, "Bayeux", &fr_nor, Some(&fr_nor_bessin)).await;
    locality(s, "Aube", &fr_nor, Some(&fr_nor_perche)).await;
    locality(s, "Essay", &fr_nor, Some(&fr_nor_perche)).await;

    let ushakova = street(s, "Ushakova Avenue", &kherson).await;
    street(s, "Soborna Street", &kherson).await;
    street(s, "Teatralna Street", &kherson).await;

    Fixture {
        storage,
        ua,
        ua_kv,
        ua_ks,
        fr_nor,
        fr_nor_perche,
        kherson,
        ushakova,
    }
}

fn names<T, F: Fn(&T) -> &str>(items: &[T], f: F) -> Vec<String> {
    items.iter().map(|item| f(item).to_string()).collect()
}

#[tokio::test]
async fn countries_order_by_name_and_reject_duplicates() -> Result<()> {
    let fixture = seed().await;
    let storage = fixture.storage.as_ref();

    let countries = storage.list_countries().await?;
    assert_eq!(
        names(&countries, |c: &Country| &c.name),
        vec!["Australia", "France", "Ukraine"]
    );

    let mut duplicate = Country {
        id: None,
        name: "Ukraine".to_string(),
        code: "UA".to_string(),
    };
    let error = storage.create_country(&mut duplicate).await.unwrap_err();
    assert!(error.is_constraint_violation());
    Ok(())
}

#[tokio::test]
async fn regions_order_by_country_then_name() -> Result<()> {
    let fixture = seed().await;
    let storage = fixture.storage.as_ref();

    let regions = storage.list_regions().await?;
    assert_eq!(
        names(&regions, |r: &Region| &r.name),
        vec!["Queensland", "Normandie", "Occitanie", "Kherson region", "Kyiv"]
    );

    let mut duplicate = Region {
        id: None,
        name: "Kyiv".to_string(),
        code: String::new(),
        country_id: fixture.ua.id.unwrap(),
    };
    let error = storage.create_region(&mut duplicate).await.unwrap_err();
    assert!(error.is_constraint_violation());
    Ok(())
}

#[tokio::test]
async fn districts_order_by_region_then_name() -> Result<()> {
    let fixture = seed().await;
    let storage = fixture.storage.as_ref();

    let districts = storage.list_districts().await?;
    assert_eq!(
        names(&districts, |d: &District| &d.name),
        vec!["Bessin", "Perche", "Gard", "Obolon"]
    );

    let mut duplicate = District {
        id: None,
        name: "Obolon".to_string(),
        code: String::new(),
        region_id: fixture.ua_kv.id.unwrap(),
    };
    let error = storage.create_district(&mut duplicate).await.unwrap_err();
    assert!(error.is_constraint_violation());
    Ok(())
}

#[tokio::test]
async fn localities_order_by_region_district_name_and_derive_slugs() -> Result<()> {
    let fixture = seed().await;
    let storage = fixture.storage.as_ref();

    let localities = storage.list_localities().await?;
    assert_eq!(
        names(&localities, |l: &Locality| &l.name),
        vec!["Bayeux", "Aube", "Essay", "Kherson", "Kiev"]
    );

    assert_eq!(fixture.kherson.slug, "kherson");
    let by_slug = storage.get_locality_by_slug("kherson").await?;
    assert_eq!(by_slug.and_then(|l| l.id), fixture.kherson.id);

    // Same name slugifies to the same value, breaching slug uniqueness
    let mut duplicate = Locality {
        id: None,
        name: "Kherson".to_string(),
        postal_code: String::new(),
        slug: String::new(),
        region_id: fixture.fr_nor.id.unwrap(),
        district_id: None,
    };
    let error = storage.create_locality(&mut duplicate).await.unwrap_err();
    assert!(error.is_constraint_violation());
    Ok(())
}

#[tokio::test]
async fn streets_order_by_name_and_reject_duplicates() -> Result<()> {
    let fixture = seed().await;
    let storage = fixture.storage.as_ref();

    let streets = storage.list_streets().await?;
    assert_eq!(
        names(&streets, |s: &Street| &s.name),
        vec!["Soborna Street", "Teatralna Street", "Ushakova Avenue"]
    );

    let mut duplicate = Street {
        id: None,
        name: "Ushakova Avenue".to_string(),
        locality_id: fixture.kherson.id.unwrap(),
    };
    let error = storage.create_street(&mut duplicate).await.unwrap_err();
    assert!(error.is_constraint_violation());
    Ok(())
}

#[tokio::test]
async fn referenced_country_cannot_be_deleted() -> Result<()> {
    let fixture = seed().await;
    let storage = fixture.storage.as_ref();

    let error = storage
        .delete_country(fixture.ua.id.unwrap())
        .await
        .unwrap_err();
    assert!(error.is_constraint_violation());

    let unreferenced = country(storage, "Moldova", "MD").await;
    storage.delete_country(unreferenced.id.unwrap()).await?;
    assert_eq!(storage.list_countries().await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn region_delete_cascades_to_dependents() -> Result<()> {
    let fixture = seed().await;
    let storage = fixture.storage.as_ref();

    let mut address = Address {
        id: None,
        raw: "Ushakova st, 51".to_string(),
        route: "Ushakova Avenue".to_string(),
        street_number: "51".to_string(),
        apartment: String::new(),
        formatted_address: String::new(),
        latitude: 0.0,
        longitude: 0.0,
        locality_id: fixture.kherson.id,
        street_id: fixture.ushakova.id,
        created_at: Utc::now(),
    };
    storage.create_address(&mut address).await?;

    storage.delete_region(fixture.ua_ks.id.unwrap()).await?;

    assert_eq!(storage.list_regions().await?.len(), 4);
    assert_eq!(storage.list_localities().await?.len(), 4);
    assert_eq!(storage.list_streets().await?.len(), 0);
    assert_eq!(storage.list_addresses().await?.len(), 0);
    // Unrelated branches survive
    assert_eq!(storage.list_districts().await?.len(), 4);
    Ok(())
}

#[tokio::test]
async fn district_delete_cascades_to_its_localities() -> Result<()> {
    let fixture = seed().await;
    let storage = fixture.storage.as_ref();

    storage
        .delete_district(fixture.fr_nor_perche.id.unwrap())
        .await?;

    let localities = storage.list_localities().await?;
    assert_eq!(
        names(&localities, |l: &Locality| &l.name),
        vec!["Bayeux", "Kherson", "Kiev"]
    );
    Ok(())
}

#[tokio::test]
async fn creates_require_existing_parents() {
    let storage = InMemoryStorage::new();

    let mut orphan_region = Region {
        id: None,
        name: "Nowhere".to_string(),
        code: String::new(),
        country_id: Uuid::new_v4(),
    };
    let error = storage.create_region(&mut orphan_region).await.unwrap_err();
    assert!(error.is_constraint_violation());

    let mut orphan_street = Street {
        id: None,
        name: "Nowhere Lane".to_string(),
        locality_id: Uuid::new_v4(),
    };
    let error = storage.create_street(&mut orphan_street).await.unwrap_err();
    assert!(error.is_constraint_violation());
}

#[tokio::test]
async fn field_widths_are_enforced() {
    let storage = InMemoryStorage::new();

    let mut wide_code = Country {
        id: None,
        name: "Ukraine".to_string(),
        code: "UKR".to_string(),
    };
    let error = storage.create_country(&mut wide_code).await.unwrap_err();
    assert!(error.is_constraint_violation());
}

#[tokio::test]
async fn transaction_scopes_nest_and_roll_back() -> Result<()> {
    let storage = InMemoryStorage::new();

    storage.begin().await?;
    country(&storage, "Ukraine", "UA").await;

    storage.begin().await?;
    country(&storage, "France", "FR").await;
    storage.rollback().await?;

    assert_eq!(storage.list_countries().await?.len(), 1);
    storage.commit().await?;
    assert_eq!(storage.list_countries().await?.len(), 1);

    // Scope bookkeeping is strict
    let error = storage.commit().await.unwrap_err();
    assert!(matches!(error, StorageError::Backend(_)));
    Ok(())
}

#[tokio::test]
async fn run_atomic_rolls_back_on_error() -> Result<()> {
    let storage = InMemoryStorage::new();

    let result: Result<(), StorageError> = run_atomic(&storage, async {
        country(&storage, "Ukraine", "UA").await;
        Err(StorageError::ConstraintViolation("forced".to_string()))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(storage.list_countries().await?.len(), 0);
    Ok(())
}
