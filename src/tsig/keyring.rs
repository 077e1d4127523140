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

//! Implementation of the [`Keyring`] type.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use log::{debug, warn};

use super::algorithm::Algorithm;
use super::key::Key;
use crate::name::{LowercaseName, Name};

////////////////////////////////////////////////////////////////////////
// KEYRINGS                                                           //
////////////////////////////////////////////////////////////////////////

/// A concurrent registry of TSIG [`Key`]s.
///
/// A `Keyring` owns its keys and indexes them by name; several keys of
/// different algorithms may share a name. Lookups take the registry's
/// read lock, structural changes its write lock, and the handles given
/// out are `Arc<Key>` clones, so request-handling threads can sign and
/// verify concurrently while configuration reloads add and remove keys.
///
/// Removal is deferred: [`Key::mark_deleted`] unlinks a key so that it
/// can no longer be found and its `(name, algorithm)` pair becomes
/// available for a replacement, but handles already captured by
/// in-flight operations keep the key alive until the last one is
/// dropped. Dropping the last clone of the `Keyring` itself tears down
/// the registry; outstanding key handles remain individually valid.
///
/// `Keyring` is cheaply cloneable (the clones share one registry), so
/// it can be passed as a context parameter to every party that needs
/// key material rather than held as global state.
#[derive(Clone, Default)]
pub struct Keyring {
    inner: Arc<RingInner>,
}

#[derive(Default)]
pub(super) struct RingInner {
    keys: RwLock<HashMap<Box<LowercaseName>, Vec<Arc<Key>>>>,
}

impl Keyring {
    /// Creates a new, empty `Keyring`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `Keyring` populated with statically-configured keys,
    /// given as `(name, algorithm, secret)` triples.
    ///
    /// Loading is best-effort: a key that cannot be added—because its
    /// name collides with one already loaded or its algorithm is not
    /// implemented—is logged and skipped without affecting the others.
    pub fn with_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = (Box<Name>, Box<Name>, Vec<u8>)>,
    {
        let ring = Self::new();
        for (name, algorithm, secret) in keys {
            let display_name = name.clone();
            if let Err(e) = ring.add(name, &algorithm, Some(&secret), false, None) {
                warn!("skipping TSIG key {}: {}", display_name, e);
            }
        }
        ring
    }

    /// Constructs a key and inserts it into the registry, returning a
    /// handle to it.
    ///
    /// A key with no secret is an "empty" negative-cache placeholder;
    /// see [`Key`]. For a `generated` key, `creator` records the
    /// identity of the party the key was created for.
    ///
    /// This fails with [`AddError::AlreadyExists`] if a live (not
    /// marked-deleted) key with the same name and algorithm is present,
    /// and with [`AddError::UnsupportedAlgorithm`] if no implementation
    /// is registered for `algorithm`.
    pub fn add(
        &self,
        name: Box<Name>,
        algorithm: &Name,
        secret: Option<&[u8]>,
        generated: bool,
        creator: Option<Box<Name>>,
    ) -> Result<Arc<Key>, AddError> {
        let algorithm =
            Algorithm::from_name(algorithm).ok_or(AddError::UnsupportedAlgorithm)?;
        let name: Box<LowercaseName> = name.into();
        let mut keys = self.inner.keys.write().unwrap();
        let entry = keys.entry(name.clone()).or_default();
        if entry
            .iter()
            .any(|key| !key.is_deleted() && key.algorithm() == algorithm)
        {
            return Err(AddError::AlreadyExists);
        }
        let key = Arc::new(Key::new(
            name,
            algorithm,
            secret.map(Into::into),
            generated,
            creator.map(Into::into),
            Arc::downgrade(&self.inner),
        ));
        entry.push(key.clone());
        debug!(
            "registered TSIG key {} ({})",
            key.name(),
            key.algorithm_name(),
        );
        Ok(key)
    }

    /// Looks up a key by name and, optionally, algorithm.
    ///
    /// When `algorithm` is `None`, it is a wildcard: the first live key
    /// with the given name is returned, whatever its algorithm. When an
    /// algorithm is given, it must match. Keys marked deleted are never
    /// returned.
    ///
    /// The returned handle keeps the key alive until dropped, even if
    /// the key is deleted or the registry is torn down in the meantime.
    pub fn find(&self, name: &Name, algorithm: Option<&Name>) -> Option<Arc<Key>> {
        let keys = self.inner.keys.read().unwrap();
        keys.get(name)?
            .iter()
            .find(|key| {
                !key.is_deleted()
                    && algorithm.map_or(true, |a| key.algorithm_name().as_ref() == a)
            })
            .cloned()
    }

    /// Returns the number of keys in the registry.
    pub fn len(&self) -> usize {
        self.inner.keys.read().unwrap().values().map(Vec::len).sum()
    }

    /// Returns whether the registry holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Keyring").field("len", &self.len()).finish()
    }
}

impl RingInner {
    /// Removes `key` (compared by identity, not by name) from the
    /// registry. For use by [`Key::mark_deleted`].
    pub(super) fn unlink(&self, key: &Key) {
        let key_name: &Name = key.name();
        let mut keys = self.keys.write().unwrap();
        if let Some(entry) = keys.get_mut(key_name) {
            entry.retain(|k| !std::ptr::eq(k.as_ref(), key));
            if entry.is_empty() {
                keys.remove(key_name);
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a key could not be added to a [`Keyring`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AddError {
    /// A live key with this name and algorithm already exists.
    AlreadyExists,

    /// No implementation is registered for the requested algorithm.
    UnsupportedAlgorithm,
}

impl fmt::Display for AddError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::AlreadyExists => f.write_str("a key with this name and algorithm already exists"),
            Self::UnsupportedAlgorithm => f.write_str("the algorithm is not implemented"),
        }
    }
}

impl std::error::Error for AddError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Box<Name> {
        s.parse().unwrap()
    }

    fn add_key(ring: &Keyring, key_name: &str, algorithm: &str) -> Result<Arc<Key>, AddError> {
        ring.add(
            name(key_name),
            &name(algorithm),
            Some(b"topsecret".as_slice()),
            false,
            None,
        )
    }

    #[test]
    fn add_rejects_duplicates() {
        let ring = Keyring::new();
        add_key(&ring, "a.tsig.key.", "hmac-sha256.").unwrap();
        assert_eq!(
            add_key(&ring, "a.tsig.key.", "hmac-sha256.").unwrap_err(),
            AddError::AlreadyExists,
        );

        // A key of a different algorithm under the same name is fine.
        add_key(&ring, "a.tsig.key.", "hmac-sha1.").unwrap();
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn add_is_case_insensitive_about_duplicates() {
        let ring = Keyring::new();
        add_key(&ring, "a.tsig.key.", "hmac-sha256.").unwrap();
        assert_eq!(
            add_key(&ring, "A.TSIG.KEY.", "HMAC-SHA256.").unwrap_err(),
            AddError::AlreadyExists,
        );
    }

    #[test]
    fn add_rejects_unknown_algorithm() {
        let ring = Keyring::new();
        assert_eq!(
            add_key(&ring, "a.tsig.key.", "hmac-sha224.").unwrap_err(),
            AddError::UnsupportedAlgorithm,
        );
    }

    #[test]
    fn find_works() {
        let ring = Keyring::new();
        add_key(&ring, "a.tsig.key.", "hmac-sha256.").unwrap();

        let found = ring
            .find(&name("a.tsig.key."), Some(&name("hmac-sha256.")))
            .unwrap();
        assert_eq!(found.name().to_string(), "a.tsig.key.");

        // Lookups are case-insensitive.
        assert!(ring
            .find(&name("A.Tsig.Key."), Some(&name("hmac-sha256.")))
            .is_some());

        // An unspecified algorithm is a wildcard...
        assert!(ring.find(&name("a.tsig.key."), None).is_some());

        // ...but a mismatched one is a miss, as is an unknown name.
        assert!(ring
            .find(&name("a.tsig.key."), Some(&name("hmac-sha1.")))
            .is_none());
        assert!(ring.find(&name("b.tsig.key."), None).is_none());
    }

    #[test]
    fn mark_deleted_hides_key_and_frees_name() {
        let ring = Keyring::new();
        let key = add_key(&ring, "a.tsig.key.", "hmac-sha256.").unwrap();

        key.mark_deleted();
        assert!(key.is_deleted());
        assert!(ring.find(&name("a.tsig.key."), None).is_none());

        // The (name, algorithm) pair is available again.
        add_key(&ring, "a.tsig.key.", "hmac-sha256.").unwrap();

        // Marking again is a no-op.
        key.mark_deleted();
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn deletion_is_deferred_while_handles_exist() {
        let ring = Keyring::new();
        let key = add_key(&ring, "a.tsig.key.", "hmac-sha256.").unwrap();
        let second_handle = ring.find(&name("a.tsig.key."), None).unwrap();

        key.mark_deleted();

        // The key is unlinked but still alive: both handles remain
        // usable, and the secret is still there.
        assert_eq!(Arc::strong_count(&key), 2);
        assert_eq!(second_handle.secret(), Some(b"topsecret".as_slice()));

        drop(second_handle);
        assert_eq!(Arc::strong_count(&key), 1);
    }

    #[test]
    fn keys_survive_ring_teardown() {
        let ring = Keyring::new();
        let key = add_key(&ring, "a.tsig.key.", "hmac-sha256.").unwrap();
        drop(ring);
        assert_eq!(key.secret(), Some(b"topsecret".as_slice()));
        // With the ring gone, mark_deleted has nothing to unlink but
        // must not panic.
        key.mark_deleted();
    }

    #[test]
    fn with_keys_skips_bad_keys() {
        let ring = Keyring::with_keys([
            (name("first.key."), name("hmac-sha256."), b"a".to_vec()),
            (name("first.key."), name("hmac-sha256."), b"b".to_vec()),
            (name("second.key."), name("hmac-sha224."), b"c".to_vec()),
            (name("third.key."), name("hmac-md5.sig-alg.reg.int."), b"d".to_vec()),
        ]);
        assert_eq!(ring.len(), 2);
        assert!(ring.find(&name("first.key."), None).is_some());
        assert!(ring.find(&name("second.key."), None).is_none());
        assert!(ring.find(&name("third.key."), None).is_some());
    }
}
