use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::domain::Address;
use crate::error::InvalidAddressInput;
use crate::payload::AddressPayload;
use crate::resolver::AddressResolver;
use crate::storage::Storage;

/// Raw value accepted on an address-valued attribute: an address already
/// in hand, an id, or untrusted JSON (an id string or a payload mapping).
#[derive(Debug, Clone)]
pub enum AddressInput {
    Existing(Address),
    Id(Uuid),
    Value(Value),
}

impl From<Address> for AddressInput {
    fn from(address: Address) -> Self {
        Self::Existing(address)
    }
}

impl From<Uuid> for AddressInput {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

impl From<Value> for AddressInput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Glue between host applications and the resolution service: turns
/// whatever arrives on an address attribute into a stored address, or
/// fails with one validation error kind. Null stands for "no address".
pub struct AddressField {
    storage: Arc<dyn Storage>,
    resolver: AddressResolver,
}

impl AddressField {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let resolver = AddressResolver::new(storage.clone());
        Self { storage, resolver }
    }

    pub async fn to_address(
        &self,
        input: impl Into<AddressInput>,
    ) -> Result<Option<Address>, InvalidAddressInput> {
        match input.into() {
            AddressInput::Existing(address) => Ok(Some(address)),
            AddressInput::Id(id) => self.lookup(id).await.map(Some),
            AddressInput::Value(Value::Null) => Ok(None),
            AddressInput::Value(Value::String(text)) => match Uuid::parse_str(&text) {
                Ok(id) => self.lookup(id).await.map(Some),
                Err(_) => Err(InvalidAddressInput(
                    "expected an address id or payload mapping, got a plain string".to_string(),
                )),
            },
            AddressInput::Value(Value::Object(map)) => {
                if map.is_empty() {
                    return Err(InvalidAddressInput("empty address payload".to_string()));
                }
                let payload: AddressPayload = serde_json::from_value(Value::Object(map))
                    .map_err(|error| {
                        InvalidAddressInput(format!("malformed address payload: {error}"))
                    })?;
                let address = self
                    .resolver
                    .resolve_and_save(payload)
                    .await
                    .map_err(|error| InvalidAddressInput(error.to_string()))?;
                Ok(Some(address))
            }
            AddressInput::Value(other) => Err(InvalidAddressInput(format!(
                "unsupported address value: {other}"
            ))),
        }
    }

    async fn lookup(&self, id: Uuid) -> Result<Address, InvalidAddressInput> {
        self.storage
            .get_address(id)
            .await
            .map_err(|error| InvalidAddressInput(error.to_string()))?
            .ok_or_else(|| InvalidAddressInput(format!("unknown address id {id}")))
    }
}
