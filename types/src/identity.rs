//! Signing identities.
//!
//! An [`Identity`] is the principal on whose behalf commands are authorized:
//! a human-readable alias, an ed25519 keypair, and a guid derived from the
//! public key. The guid is stable: the same keypair always yields the same
//! guid, and nothing about an identity is mutated after creation.

use commonware_codec::ReadExt;
use commonware_cryptography::{
    ed25519::{PrivateKey, PublicKey},
    sha256::Sha256,
    Hasher, PrivateKeyExt as _, Signer,
};
use commonware_utils::{from_hex, hex};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

/// Derive the guid for a public key.
///
/// One-way and collision-resistant, so guids can be handed out as stable
/// identifiers without revealing or depending on key internals.
pub fn derive_guid(public: &PublicKey) -> String {
    hex(Sha256::hash(public.as_ref()).as_ref())
}

/// A signing principal: alias, derived guid, and keypair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Identity {
    pub alias: String,
    pub guid: String,
    #[serde(with = "serde_public_key_hex")]
    pub public: PublicKey,
    #[serde(with = "serde_private_key_hex")]
    pub private: PrivateKey,
}

impl Identity {
    /// Create an identity from an existing private key.
    pub fn from_private(alias: impl Into<String>, private: PrivateKey) -> Self {
        let public = private.public_key();
        Self {
            alias: alias.into(),
            guid: derive_guid(&public),
            public,
            private,
        }
    }

    /// Generate a fresh identity.
    pub fn generate<R: RngCore + CryptoRng>(alias: impl Into<String>, rng: &mut R) -> Self {
        Self::from_private(alias, PrivateKey::from_rng(rng))
    }

    /// Load an identity from a hex-encoded private key.
    pub fn from_hex_key(alias: impl Into<String>, private_hex: &str) -> Result<Self, Error> {
        let bytes =
            from_hex(private_hex).ok_or_else(|| Error::InvalidKey("not valid hex".into()))?;
        let mut reader = bytes.as_slice();
        let private = PrivateKey::read(&mut reader)
            .map_err(|err| Error::InvalidKey(err.to_string()))?;
        Ok(Self::from_private(alias, private))
    }
}

/// Storage collaborator for identities, keyed by alias.
pub trait IdentityStore {
    fn lookup(&self, alias: &str) -> Option<Identity>;
    fn save(&mut self, identity: Identity);
}

/// In-memory identity store.
#[derive(Default)]
pub struct MemoryIdentityStore {
    entries: BTreeMap<String, Identity>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn lookup(&self, alias: &str) -> Option<Identity> {
        self.entries.get(alias).cloned()
    }

    fn save(&mut self, identity: Identity) {
        self.entries.insert(identity.alias.clone(), identity);
    }
}

mod serde_public_key_hex {
    use commonware_codec::ReadExt;
    use commonware_cryptography::ed25519::PublicKey;
    use commonware_utils::{from_hex, hex};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(public: &PublicKey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex(public.as_ref()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<PublicKey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid hex"))?;
        let mut reader = bytes.as_slice();
        PublicKey::read(&mut reader).map_err(|_| serde::de::Error::custom("invalid public key"))
    }
}

mod serde_private_key_hex {
    use commonware_codec::ReadExt;
    use commonware_cryptography::ed25519::PrivateKey;
    use commonware_utils::{from_hex, hex};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(private: &PrivateKey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex(private.as_ref()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<PrivateKey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid hex"))?;
        let mut reader = bytes.as_slice();
        PrivateKey::read(&mut reader).map_err(|_| serde::de::Error::custom("invalid private key"))
    }
}
