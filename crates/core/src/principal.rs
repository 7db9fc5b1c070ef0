use std::collections::BTreeSet;
use std::fmt;

use ed25519_dalek::{Signer, Verifier};

use crate::error::CoreError;
use crate::ids::{ActorId, Signature};

/// The acting user or bot. Holds the rights the permission evaluator
/// consults and the key that signs every revision it authors.
#[derive(Clone)]
pub struct Principal {
    name: String,
    rights: BTreeSet<String>,
    signing_key: ed25519_dalek::SigningKey,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            name: name.into(),
            rights: BTreeSet::new(),
            signing_key: ed25519_dalek::SigningKey::generate(&mut rng),
        }
    }

    pub fn from_secret_bytes(name: impl Into<String>, bytes: &[u8; 32]) -> Self {
        Self {
            name: name.into(),
            rights: BTreeSet::new(),
            signing_key: ed25519_dalek::SigningKey::from_bytes(bytes),
        }
    }

    pub fn with_rights<I, S>(mut self, rights: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rights.extend(rights.into_iter().map(Into::into));
        self
    }

    pub fn grant(&mut self, right: impl Into<String>) {
        self.rights.insert(right.into());
    }

    pub fn revoke(&mut self, right: &str) {
        self.rights.remove(right);
    }

    pub fn has_right(&self, right: &str) -> bool {
        self.rights.contains(right)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn actor_id(&self) -> ActorId {
        ActorId::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::from_bytes(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("name", &self.name)
            .field("rights", &self.rights)
            .field("actor_id", &self.actor_id())
            .finish()
    }
}

pub fn verify_signature(
    actor_id: &ActorId,
    message: &[u8],
    signature: &Signature,
) -> Result<(), CoreError> {
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(actor_id.as_bytes())
        .map_err(|_| CoreError::InvalidSignature)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CoreError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let principal = Principal::new("Alice");
        let sig = principal.sign(b"revision bytes");
        assert!(verify_signature(&principal.actor_id(), b"revision bytes", &sig).is_ok());
        assert!(verify_signature(&principal.actor_id(), b"other bytes", &sig).is_err());
    }

    #[test]
    fn signature_from_other_principal_fails() {
        let alice = Principal::new("Alice");
        let mallory = Principal::new("Mallory");
        let sig = mallory.sign(b"payload");
        assert!(verify_signature(&alice.actor_id(), b"payload", &sig).is_err());
    }

    #[test]
    fn rights_can_be_granted_and_revoked() {
        let mut principal = Principal::new("Bot").with_rights(["edit", "bot"]);
        assert!(principal.has_right("bot"));
        principal.revoke("bot");
        assert!(!principal.has_right("bot"));
        principal.grant("item-merge");
        assert!(principal.has_right("item-merge"));
    }

    #[test]
    fn secret_bytes_keep_actor_id() {
        let principal = Principal::new("Alice");
        let restored = Principal::from_secret_bytes("Alice", &principal.secret_bytes());
        assert_eq!(principal.actor_id(), restored.actor_id());
    }
}
