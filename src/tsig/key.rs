// Copyright 2023 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implementation of the [`Key`] type.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use log::debug;
use rand::RngCore;

use super::algorithm::Algorithm;
use super::keyring::RingInner;
use crate::name::LowercaseName;

////////////////////////////////////////////////////////////////////////
// KEYS                                                               //
////////////////////////////////////////////////////////////////////////

/// A TSIG key: a shared secret bound to a name and an algorithm.
///
/// `Key`s are owned by the [`Keyring`](super::Keyring) that created
/// them and are handed out as `Arc<Key>` handles by
/// [`Keyring::add`](super::Keyring::add) and
/// [`Keyring::find`](super::Keyring::find). Everything that identifies
/// a key—its name, algorithm, secret, and provenance—is immutable after
/// construction, so concurrent signing and verification with the same
/// handle need no synchronization. The only mutable state is the
/// deletion flag, which sits behind the key's own lock.
///
/// A key with no secret is an "empty" key: a negative-cache placeholder
/// recording that the name is known *not* to correspond to usable key
/// material. Empty keys fail verification; they exist so that repeated
/// lookups of a name that once failed need not be repeated by protocol
/// extensions that populate keyrings dynamically.
///
/// A `generated` key is one synthesized at runtime rather than
/// statically configured. Since the name of such a key is usually an
/// opaque label unsuitable for authorization decisions, the identity of
/// the party that caused it to exist is recorded separately in
/// `creator`, and [`Key::identity`] resolves to it.
pub struct Key {
    name: Box<LowercaseName>,
    algorithm: Algorithm,
    secret: Option<Box<[u8]>>,
    creator: Option<Box<LowercaseName>>,
    generated: bool,
    ring: Weak<RingInner>,
    state: Mutex<KeyState>,
}

struct KeyState {
    deleted: bool,
}

impl Key {
    /// Creates a new `Key`. For use by the owning keyring only: a key
    /// is always constructed through [`Keyring::add`](super::Keyring::add).
    pub(super) fn new(
        name: Box<LowercaseName>,
        algorithm: Algorithm,
        secret: Option<Box<[u8]>>,
        generated: bool,
        creator: Option<Box<LowercaseName>>,
        ring: Weak<RingInner>,
    ) -> Self {
        Self {
            name,
            algorithm,
            secret,
            creator,
            generated,
            ring,
            state: Mutex::new(KeyState { deleted: false }),
        }
    }

    /// Returns the name of the key.
    pub fn name(&self) -> &LowercaseName {
        &self.name
    }

    /// Returns the key's algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Returns the domain name identifying the key's algorithm.
    pub fn algorithm_name(&self) -> &'static LowercaseName {
        self.algorithm.name()
    }

    /// Returns the key's secret material, or `None` if this is an
    /// empty (negative-cache placeholder) key.
    pub fn secret(&self) -> Option<&[u8]> {
        self.secret.as_deref()
    }

    /// Returns whether this is an empty (negative-cache placeholder)
    /// key.
    pub fn is_empty(&self) -> bool {
        self.secret.is_none()
    }

    /// Returns whether this key was generated at runtime (as opposed
    /// to statically configured).
    pub fn generated(&self) -> bool {
        self.generated
    }

    /// Returns the name of the party that caused a generated key to be
    /// created, if recorded.
    pub fn creator(&self) -> Option<&LowercaseName> {
        self.creator.as_deref()
    }

    /// Returns the effective identity of the key for access-control
    /// decisions: the creator for a generated key (whose own name is
    /// usually an opaque label), and the key name otherwise.
    pub fn identity(&self) -> &LowercaseName {
        if self.generated {
            self.creator.as_deref().unwrap_or(&self.name)
        } else {
            &self.name
        }
    }

    /// Returns whether this key has been marked deleted.
    pub fn is_deleted(&self) -> bool {
        self.state.lock().unwrap().deleted
    }

    /// Marks this key as deleted and unlinks it from its keyring, so
    /// that it can no longer be found and its `(name, algorithm)` pair
    /// becomes available again. The key itself remains usable through
    /// existing handles and is freed when the last handle is dropped.
    /// This is idempotent.
    pub fn mark_deleted(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().unwrap();
            if state.deleted {
                return;
            }
            state.deleted = true;
        }
        if let Some(ring) = self.ring.upgrade() {
            ring.unlink(self);
        }
        debug!(
            "TSIG key {} ({}) marked deleted",
            self.name,
            self.algorithm_name(),
        );
    }

    /// Generates fresh secret material suitable for a new key of the
    /// given algorithm (one native MAC length of random octets).
    pub fn generate_secret(algorithm: Algorithm) -> Vec<u8> {
        let mut secret = vec![0; algorithm.output_size()];
        rand::thread_rng().fill_bytes(&mut secret);
        secret
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // NOTE: the secret is deliberately omitted.
        f.debug_struct("Key")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("empty", &self.is_empty())
            .field("generated", &self.generated)
            .field("creator", &self.creator)
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::Keyring;
    use super::*;
    use crate::name::Name;

    fn name(s: &str) -> Box<Name> {
        s.parse().unwrap()
    }

    #[test]
    fn identity_of_static_key_is_its_name() {
        let ring = Keyring::new();
        let key = ring
            .add(name("a.tsig.key."), &name("hmac-sha256."), Some(b"secret".as_slice()), false, None)
            .unwrap();
        assert_eq!(key.identity().wire_repr(), b"\x01a\x04tsig\x03key\x00");
    }

    #[test]
    fn identity_of_generated_key_is_its_creator() {
        let ring = Keyring::new();
        let key = ring
            .add(
                name("gjcy4vme.tkey.example."),
                &name("hmac-sha256."),
                Some(b"secret".as_slice()),
                true,
                Some(name("admin.example.")),
            )
            .unwrap();
        assert_eq!(key.identity().wire_repr(), b"\x05admin\x07example\x00");
    }

    #[test]
    fn empty_key_has_no_secret() {
        let ring = Keyring::new();
        let key = ring
            .add(name("nonexistent.example."), &name("hmac-sha1."), None, false, None)
            .unwrap();
        assert!(key.is_empty());
        assert_eq!(key.secret(), None);
    }

    #[test]
    fn generate_secret_has_native_length() {
        assert_eq!(Key::generate_secret(Algorithm::HmacSha256).len(), 32);
        assert_eq!(Key::generate_secret(Algorithm::HmacMd5).len(), 16);
    }
}
