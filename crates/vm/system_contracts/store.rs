use bytes::Bytes;
use hostevm_common::{Address, serde_utils};
use hostevm_storage::{CacheStore, StateKey, StateReader};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::DispatchError;

/// State module the extension registry lives under.
pub const ASPECT_MODULE: &str = "aspect";

pub const READ_GAS: u64 = 800;
pub const WRITE_GAS: u64 = 5_000;
pub const WRITE_BYTE_GAS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectMeta {
    pub owner: Address,
    pub latest_version: u64,
    /// Bitmask of the join points the aspect hooks into
    pub join_points: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectBinding {
    pub aspect_id: Address,
    pub version: u64,
    pub priority: i8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    #[serde(with = "serde_utils::bytes")]
    pub value: Bytes,
}

/// Gas left to a handler. Every registry access is paid for up front.
#[derive(Debug, Clone, Copy)]
pub struct GasMeter {
    remaining: u64,
}

impl GasMeter {
    pub fn new(gas: u64) -> Self {
        Self { remaining: gas }
    }

    pub fn charge(&mut self, amount: u64) -> Result<(), DispatchError> {
        self.remaining = self
            .remaining
            .checked_sub(amount)
            .ok_or(DispatchError::OutOfGas)?;
        Ok(())
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

fn key(prefix: &[u8], parts: &[&[u8]]) -> StateKey {
    let mut key = prefix.to_vec();
    for part in parts {
        key.extend_from_slice(part);
    }
    StateKey::module(ASPECT_MODULE, key)
}

/// Typed, metered view of the extension registry. Writes are charged but only
/// performed when the dispatch commits.
pub struct AspectStore<'s, 'a> {
    state: &'s mut CacheStore<'a>,
    meter: GasMeter,
    commit: bool,
}

impl<'s, 'a> AspectStore<'s, 'a> {
    pub fn new(state: &'s mut CacheStore<'a>, gas: u64, commit: bool) -> Self {
        Self {
            state,
            meter: GasMeter::new(gas),
            commit,
        }
    }

    pub fn charge(&mut self, amount: u64) -> Result<(), DispatchError> {
        self.meter.charge(amount)
    }

    pub fn remaining_gas(&self) -> u64 {
        self.meter.remaining()
    }

    fn read_raw(&mut self, key: &StateKey) -> Result<Option<Bytes>, DispatchError> {
        self.meter.charge(READ_GAS)?;
        Ok(self.state.get(key)?)
    }

    fn read<T: DeserializeOwned>(&mut self, key: &StateKey) -> Result<Option<T>, DispatchError> {
        let Some(raw) = self.read_raw(key)? else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|err| DispatchError::Corrupted(format!("{key}: {err}")))
    }

    fn write_raw(&mut self, key: StateKey, value: Bytes) -> Result<(), DispatchError> {
        let byte_gas = WRITE_BYTE_GAS.saturating_mul(value.len() as u64);
        self.meter.charge(WRITE_GAS.saturating_add(byte_gas))?;
        if self.commit {
            self.state.set(key, value);
        }
        Ok(())
    }

    fn write<T: Serialize>(&mut self, key: StateKey, value: &T) -> Result<(), DispatchError> {
        let raw = serde_json::to_vec(value)
            .map_err(|err| DispatchError::Corrupted(format!("{key}: {err}")))?;
        self.write_raw(key, Bytes::from(raw))
    }

    pub fn meta(&mut self, aspect_id: Address) -> Result<Option<AspectMeta>, DispatchError> {
        self.read(&key(b"meta", &[aspect_id.as_bytes()]))
    }

    /// Metadata of an existing aspect.
    pub fn existing_meta(&mut self, aspect_id: Address) -> Result<AspectMeta, DispatchError> {
        self.meta(aspect_id)?
            .ok_or(DispatchError::AspectNotFound(aspect_id))
    }

    pub fn set_meta(&mut self, aspect_id: Address, meta: &AspectMeta) -> Result<(), DispatchError> {
        self.write(key(b"meta", &[aspect_id.as_bytes()]), meta)
    }

    pub fn set_code(
        &mut self,
        aspect_id: Address,
        version: u64,
        code: Bytes,
    ) -> Result<(), DispatchError> {
        self.write_raw(
            key(b"code", &[aspect_id.as_bytes(), &version.to_be_bytes()]),
            code,
        )
    }

    pub fn properties(&mut self, aspect_id: Address) -> Result<Vec<Property>, DispatchError> {
        Ok(self
            .read(&key(b"props", &[aspect_id.as_bytes()]))?
            .unwrap_or_default())
    }

    pub fn set_properties(
        &mut self,
        aspect_id: Address,
        properties: &[Property],
    ) -> Result<(), DispatchError> {
        self.write(key(b"props", &[aspect_id.as_bytes()]), &properties)
    }

    /// Aspects bound to `contract`, in insertion order.
    pub fn bindings(&mut self, contract: Address) -> Result<Vec<AspectBinding>, DispatchError> {
        Ok(self
            .read(&key(b"bindings", &[contract.as_bytes()]))?
            .unwrap_or_default())
    }

    pub fn set_bindings(
        &mut self,
        contract: Address,
        bindings: &[AspectBinding],
    ) -> Result<(), DispatchError> {
        self.write(key(b"bindings", &[contract.as_bytes()]), &bindings)
    }

    /// Contracts `aspect_id` is bound to, in insertion order.
    pub fn bound_addresses(&mut self, aspect_id: Address) -> Result<Vec<Address>, DispatchError> {
        Ok(self
            .read(&key(b"bound", &[aspect_id.as_bytes()]))?
            .unwrap_or_default())
    }

    pub fn set_bound_addresses(
        &mut self,
        aspect_id: Address,
        contracts: &[Address],
    ) -> Result<(), DispatchError> {
        self.write(key(b"bound", &[aspect_id.as_bytes()]), &contracts)
    }
}
