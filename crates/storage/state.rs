use bytes::Bytes;
use hostevm_common::{Address, BigEndianHash, H256, U256};

use crate::{
    error::StoreError,
    keys::StateKey,
    overlay::{CacheStore, StateReader},
};

fn decode_word(key: &StateKey, value: &[u8]) -> Result<U256, StoreError> {
    if value.len() != 32 {
        return Err(StoreError::DecodeError {
            key: key.to_string(),
            reason: format!("expected 32 bytes, got {}", value.len()),
        });
    }
    Ok(H256::from_slice(value).into_uint())
}

fn encode_word(value: U256) -> Bytes {
    Bytes::copy_from_slice(H256::from_uint(&value).as_bytes())
}

/// Typed account accessors over any state view. Missing entries read as zero/empty.
pub trait AccountReader: StateReader {
    fn nonce(&self, address: Address) -> Result<u64, StoreError> {
        let key = StateKey::Nonce(address);
        let Some(value) = self.get(&key)? else {
            return Ok(0);
        };
        let bytes: [u8; 8] = value
            .as_ref()
            .try_into()
            .map_err(|_| StoreError::DecodeError {
                key: key.to_string(),
                reason: format!("expected 8 bytes, got {}", value.len()),
            })?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn balance(&self, address: Address) -> Result<U256, StoreError> {
        let key = StateKey::Balance(address);
        match self.get(&key)? {
            Some(value) => decode_word(&key, &value),
            None => Ok(U256::zero()),
        }
    }

    fn code(&self, address: Address) -> Result<Bytes, StoreError> {
        Ok(self.get(&StateKey::Code(address))?.unwrap_or_default())
    }

    fn storage(&self, address: Address, slot: H256) -> Result<U256, StoreError> {
        let key = StateKey::Storage(address, slot);
        match self.get(&key)? {
            Some(value) => decode_word(&key, &value),
            None => Ok(U256::zero()),
        }
    }
}

impl<T: StateReader + ?Sized> AccountReader for T {}

/// Typed account mutators. Only overlays are writable; zero values delete the entry.
pub trait AccountWriter {
    fn set_nonce(&mut self, address: Address, nonce: u64);
    fn set_balance(&mut self, address: Address, balance: U256);
    fn set_code(&mut self, address: Address, code: Bytes);
    fn set_storage(&mut self, address: Address, slot: H256, value: U256);
}

impl AccountWriter for CacheStore<'_> {
    fn set_nonce(&mut self, address: Address, nonce: u64) {
        let key = StateKey::Nonce(address);
        if nonce == 0 {
            self.delete(key);
        } else {
            self.set(key, Bytes::copy_from_slice(&nonce.to_be_bytes()));
        }
    }

    fn set_balance(&mut self, address: Address, balance: U256) {
        let key = StateKey::Balance(address);
        if balance.is_zero() {
            self.delete(key);
        } else {
            self.set(key, encode_word(balance));
        }
    }

    fn set_code(&mut self, address: Address, code: Bytes) {
        let key = StateKey::Code(address);
        if code.is_empty() {
            self.delete(key);
        } else {
            self.set(key, code);
        }
    }

    fn set_storage(&mut self, address: Address, slot: H256, value: U256) {
        let key = StateKey::Storage(address, slot);
        if value.is_zero() {
            self.delete(key);
        } else {
            self.set(key, encode_word(value));
        }
    }
}
