//! The history of group-key versions a replica holds locally. Encryption
//! always uses the current version; decryption tries the entry's recorded
//! version first, then falls back across the rest of the known history.

use partage_crypto::AeadKey;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct KeyRing {
    keys: BTreeMap<u32, AeadKey>,
    current_version: u32,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, version: u32, key: AeadKey) {
        if self.keys.is_empty() || version > self.current_version {
            self.current_version = version;
        }
        self.keys.insert(version, key);
    }

    pub fn current_version(&self) -> u32 {
        self.current_version
    }

    pub fn current_key(&self) -> Option<&AeadKey> {
        self.keys.get(&self.current_version)
    }

    pub fn get(&self, version: u32) -> Option<&AeadKey> {
        self.keys.get(&version)
    }

    /// Keys to try for a ciphertext recorded against `recorded_version`:
    /// that version first, then every other known version, highest first.
    pub fn fallback_order(&self, recorded_version: u32) -> Vec<(u32, &AeadKey)> {
        let mut order = Vec::with_capacity(self.keys.len());
        if let Some(key) = self.keys.get(&recorded_version) {
            order.push((recorded_version, key));
        }
        for (version, key) in self.keys.iter().rev() {
            if *version != recorded_version {
                order.push((*version, key));
            }
        }
        order
    }
}
