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

//! Static key provisioning from a TOML configuration file.
//!
//! A key file is a TOML document whose `keys` table maps key names to
//! their parameters:
//!
//! ```toml
//! [keys."transfer.example.com."]
//! algorithm = "hmac-sha256"
//! secret = "c2hhcmVkIHNlY3JldA=="
//!
//! [keys."update.example.com."]
//! algorithm = "hmac-md5"
//! secret = "b2xkIGJ1dCBzdGlsbCBhcm91bmQ="
//! ```
//!
//! Secrets are base64-encoded. Loading is best-effort, matching the
//! [`Keyring::with_keys`] policy: a key that cannot be added (bad
//! secret encoding, duplicate, unknown algorithm) is logged and
//! skipped, and the remaining keys still load. Errors are returned only
//! when the file itself cannot be read or parsed.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use log::warn;
use serde::{de, Deserialize};

use crate::name::Name;
use crate::tsig::{Algorithm, Keyring};

////////////////////////////////////////////////////////////////////////
// CONFIGURATION LOADING                                              //
////////////////////////////////////////////////////////////////////////

/// Loads a [`Keyring`] from the key file at `path`.
pub fn keyring_from_path(path: impl AsRef<Path>) -> Result<Keyring, Error> {
    let raw = fs::read_to_string(path).map_err(Error::Io)?;
    keyring_from_str(&raw)
}

/// Loads a [`Keyring`] from key-file TOML source.
pub fn keyring_from_str(source: &str) -> Result<Keyring, Error> {
    let key_file: KeyFile = toml::from_str(source).map_err(Error::Parse)?;
    let ring = Keyring::new();
    for (name, key_config) in key_file.keys {
        let algorithm = match key_config.algorithm.parse::<Algorithm>() {
            Ok(algorithm) => algorithm,
            Err(e) => {
                warn!(
                    "skipping TSIG key {}: {}: {}",
                    name.0, e, key_config.algorithm,
                );
                continue;
            }
        };
        let secret = match BASE64_STANDARD.decode(&key_config.secret) {
            Ok(secret) => secret,
            Err(e) => {
                warn!("skipping TSIG key {}: bad secret: {}", name.0, e);
                continue;
            }
        };
        if let Err(e) = ring.add(
            name.0.clone(),
            algorithm.name().as_ref(),
            Some(&secret),
            false,
            None,
        ) {
            warn!("skipping TSIG key {}: {}", name.0, e);
        }
    }
    Ok(ring)
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION STRUCTURES                                           //
////////////////////////////////////////////////////////////////////////

/// The top-level structure of a key file.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyFile {
    #[serde(default)]
    keys: HashMap<ConfigName, KeyConfig>,
}

/// The configuration of a single key. The algorithm stays a string
/// here so that a key with an unimplemented algorithm is skipped during
/// loading instead of failing the whole file.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyConfig {
    algorithm: String,
    secret: String,
}

/// A wrapper over `Box<Name>` to deserialize domain names through
/// their [`FromStr`](std::str::FromStr) implementation.
#[derive(Eq, Hash, PartialEq)]
struct ConfigName(Box<Name>);

impl<'de> Deserialize<'de> for ConfigName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map(ConfigName)
            .map_err(|e| de::Error::custom(format_args!("invalid domain name: {}", e)))
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error produced when a key file cannot be loaded.
#[derive(Debug)]
pub enum Error {
    /// The file could not be read.
    Io(io::Error),

    /// The file is not valid key-file TOML.
    Parse(toml::de::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read the key file: {}", err),
            Self::Parse(err) => write!(f, "failed to parse the key file: {}", err),
        }
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
