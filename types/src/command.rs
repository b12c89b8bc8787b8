//! Commands and command signing.
//!
//! A [`Command`] is a verb plus an ordered set of key/value fields. Signing
//! covers the canonical encoding of the verb and fields only: the signature
//! and writer fields are attached afterwards and are never part of the
//! signed bytes, so a signature can always be re-verified from the command
//! content alone.

use crate::{canonical, command_namespace, identity::Identity, NAMESPACE};
use bytes::Bytes;
use commonware_codec::ReadExt;
use commonware_cryptography::{
    ed25519::{PublicKey, Signature},
    Signer, Verifier,
};
use commonware_utils::{from_hex, hex};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Top-level keys reserved for the wire envelope.
pub const VERB_KEY: &str = "verb";
pub const ID_KEY: &str = "id";
pub const WRITER_KEY: &str = "writer";
pub const SIGNATURE_KEY: &str = "signature";

const RESERVED_KEYS: &[&str] = &[VERB_KEY, ID_KEY, WRITER_KEY, SIGNATURE_KEY];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("canonical encoding failed: {0}")]
    Canonical(#[from] canonical::Error),
    #[error("field name is reserved: {0}")]
    ReservedField(String),
}

/// An unsigned command: a verb and its fields. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    verb: String,
    fields: BTreeMap<String, Value>,
}

impl Command {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a field. Fails on keys reserved for the envelope.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Self, Error> {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(Error::ReservedField(key));
        }
        self.fields.insert(key, value.into());
        Ok(self)
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The bytes covered by a signature: the canonical encoding of the verb
    /// and fields, with no envelope keys present.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut map = Map::new();
        map.insert(VERB_KEY.to_string(), Value::String(self.verb.clone()));
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        Ok(canonical::encode(&Value::Object(map))?)
    }

    /// Sign this command on behalf of `identity`.
    pub fn sign(&self, identity: &Identity) -> Result<SignedCommand, Error> {
        let payload = self.canonical_bytes()?;
        let signature = identity
            .private
            .sign(Some(&command_namespace(NAMESPACE)), &payload);
        Ok(SignedCommand {
            command: self.clone(),
            writer: identity.guid.clone(),
            signature: hex(signature.as_ref()),
        })
    }
}

/// A command plus the writer guid and hex-encoded signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedCommand {
    command: Command,
    writer: String,
    signature: String,
}

impl SignedCommand {
    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn writer(&self) -> &str {
        &self.writer
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Check the signature against a public key. Used by tests standing in
    /// for the server; the backend performs the same check on receipt.
    pub fn verify(&self, public: &PublicKey) -> bool {
        let Ok(payload) = self.command.canonical_bytes() else {
            return false;
        };
        let Some(bytes) = from_hex(&self.signature) else {
            return false;
        };
        let mut reader = bytes.as_slice();
        let Ok(signature) = Signature::read(&mut reader) else {
            return false;
        };
        public.verify(Some(&command_namespace(NAMESPACE)), &payload, &signature)
    }

    /// Assemble the wire frame for a dispatch under correlation id `id`.
    ///
    /// The id is assigned after signing and rides outside the signed bytes,
    /// alongside the writer guid and signature.
    pub fn to_frame(&self, id: u64) -> Result<Bytes, Error> {
        let mut map = Map::new();
        map.insert(ID_KEY.to_string(), Value::from(id));
        map.insert(
            VERB_KEY.to_string(),
            Value::String(self.command.verb.clone()),
        );
        for (key, value) in &self.command.fields {
            map.insert(key.clone(), value.clone());
        }
        map.insert(WRITER_KEY.to_string(), Value::String(self.writer.clone()));
        map.insert(
            SIGNATURE_KEY.to_string(),
            Value::String(self.signature.clone()),
        );
        Ok(Bytes::from(canonical::encode(&Value::Object(map))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_cryptography::{ed25519::PrivateKey, PrivateKeyExt as _};

    fn identity(seed: u64) -> Identity {
        Identity::from_private("test", PrivateKey::from_seed(seed))
    }

    #[test]
    fn canonical_bytes_ignore_construction_order() {
        let a = Command::new("UPDATE")
            .with("name", "alice")
            .unwrap()
            .with("age", 30)
            .unwrap();
        let b = Command::new("UPDATE")
            .with("age", 30)
            .unwrap()
            .with("name", "alice")
            .unwrap();
        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    }

    #[test]
    fn reserved_fields_are_rejected() {
        for key in [VERB_KEY, ID_KEY, WRITER_KEY, SIGNATURE_KEY] {
            let err = Command::new("READ").with(key, "x").unwrap_err();
            assert_eq!(err, Error::ReservedField(key.to_string()));
        }
    }

    #[test]
    fn signing_is_deterministic_and_verifiable() {
        let identity = identity(1);
        let command = Command::new("READ").with("field", "x").unwrap();

        let first = command.sign(&identity).unwrap();
        let second = command.sign(&identity).unwrap();
        assert_eq!(first.signature(), second.signature());
        assert_eq!(first.writer(), identity.guid);
        assert!(first.verify(&identity.public));
    }

    #[test]
    fn mutation_after_signing_breaks_verification() {
        let identity = identity(1);
        let signed = Command::new("READ")
            .with("field", "x")
            .unwrap()
            .sign(&identity)
            .unwrap();

        let mut tampered = signed.clone();
        tampered.command = Command::new("READ").with("field", "y").unwrap();
        assert!(!tampered.verify(&identity.public));

        // Wrong key fails too.
        assert!(!signed.verify(&self::identity(2).public));
    }

    #[test]
    fn signature_never_signs_itself() {
        let identity = identity(1);
        let command = Command::new("READ").with("field", "x").unwrap();
        let signed = command.sign(&identity).unwrap();

        // Canonical bytes of the signed command are those of the unsigned one.
        assert_eq!(
            signed.command().canonical_bytes().unwrap(),
            command.canonical_bytes().unwrap()
        );
    }

    #[test]
    fn frame_carries_envelope_keys() {
        let identity = identity(1);
        let signed = Command::new("READ")
            .with("field", "x")
            .unwrap()
            .sign(&identity)
            .unwrap();

        let frame = signed.to_frame(42).unwrap();
        let value: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(value[ID_KEY], 42);
        assert_eq!(value[VERB_KEY], "READ");
        assert_eq!(value["field"], "x");
        assert_eq!(value[WRITER_KEY], identity.guid.as_str());
        assert_eq!(value[SIGNATURE_KEY], signed.signature());
    }

    #[test]
    fn corrupt_signature_hex_fails_closed() {
        let identity = identity(1);
        let mut signed = Command::new("READ").sign(&identity).unwrap();
        signed.signature = "not-hex".to_string();
        assert!(!signed.verify(&identity.public));
    }
}
