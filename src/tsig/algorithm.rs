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

//! TSIG algorithms and the keyed-digest abstraction behind them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use hmac::digest::{MacError, OutputSizeUser};
use hmac::{Hmac, Mac};
use lazy_static::lazy_static;
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;

use crate::name::{LowercaseName, Name};

////////////////////////////////////////////////////////////////////////
// TSIG ALGORITHMS                                                    //
////////////////////////////////////////////////////////////////////////

lazy_static! {
    static ref HMAC_MD5_NAME: Box<LowercaseName> = "hmac-md5.sig-alg.reg.int.".parse().unwrap();
    static ref HMAC_SHA1_NAME: Box<LowercaseName> = "hmac-sha1.".parse().unwrap();
    static ref HMAC_SHA256_NAME: Box<LowercaseName> = "hmac-sha256.".parse().unwrap();
    static ref ALGORITHMS_BY_NAME: HashMap<&'static Name, Algorithm> = HashMap::from([
        (HMAC_MD5_NAME.as_ref().as_ref(), Algorithm::HmacMd5),
        (HMAC_SHA1_NAME.as_ref().as_ref(), Algorithm::HmacSha1),
        (HMAC_SHA256_NAME.as_ref().as_ref(), Algorithm::HmacSha256),
    ]);
}

/// A supported TSIG algorithm.
///
/// HMAC-MD5 is identified by the reserved name
/// `hmac-md5.sig-alg.reg.int.` and is the algorithm every TSIG
/// implementation has historically been required to support; HMAC-SHA1
/// and HMAC-SHA256 are the two algorithms [RFC 8945 § 6] requires
/// today. New algorithms are added by extending this enumeration and
/// the name table above.
///
/// [RFC 8945 § 6]: https://datatracker.ietf.org/doc/html/rfc8945#section-6
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Algorithm {
    HmacMd5,
    HmacSha1,
    HmacSha256,
}

impl Algorithm {
    /// Returns the domain name that identifies this algorithm on the
    /// wire.
    pub fn name(&self) -> &'static LowercaseName {
        match self {
            Self::HmacMd5 => &HMAC_MD5_NAME,
            Self::HmacSha1 => &HMAC_SHA1_NAME,
            Self::HmacSha256 => &HMAC_SHA256_NAME,
        }
    }

    /// Returns the size of the MAC produced by this algorithm.
    pub fn output_size(&self) -> usize {
        match self {
            Self::HmacMd5 => Hmac::<Md5>::output_size(),
            Self::HmacSha1 => Hmac::<Sha1>::output_size(),
            Self::HmacSha256 => Hmac::<Sha256>::output_size(),
        }
    }

    /// Returns the minimum length of a truncated MAC this algorithm
    /// will accept: at least 10 octets and at least half the native
    /// output length, per [RFC 8945 § 5.2.2.1].
    ///
    /// [RFC 8945 § 5.2.2.1]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.2.2.1
    pub fn minimum_mac_size(&self) -> usize {
        10.max((self.output_size() + 1) / 2)
    }

    /// Finds an algorithm by the domain name that identifies it on the
    /// wire. This returns `None` if the algorithm is not defined or not
    /// supported by this implementation.
    pub fn from_name(name: &Name) -> Option<Self> {
        ALGORITHMS_BY_NAME.get(name).copied()
    }

    /// Creates an authenticator to compute a MAC with this algorithm
    /// and the given key.
    pub(super) fn make_authenticator(&self, key: &[u8]) -> Box<dyn Authenticator> {
        match self {
            Self::HmacMd5 => Box::new(Hmac::<Md5>::new_from_slice(key).unwrap()),
            Self::HmacSha1 => Box::new(Hmac::<Sha1>::new_from_slice(key).unwrap()),
            Self::HmacSha256 => Box::new(Hmac::<Sha256>::new_from_slice(key).unwrap()),
        }
    }
}

/// Parses an algorithm from its presentation name, with or without the
/// trailing dot; the mnemonic `hmac-md5` is accepted for the full
/// reserved HMAC-MD5 identifier. This is the form algorithms take in
/// configuration files.
impl FromStr for Algorithm {
    type Err = UnsupportedAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_suffix('.').unwrap_or(s);
        if s.eq_ignore_ascii_case("hmac-md5") || s.eq_ignore_ascii_case("hmac-md5.sig-alg.reg.int")
        {
            Ok(Self::HmacMd5)
        } else if s.eq_ignore_ascii_case("hmac-sha1") {
            Ok(Self::HmacSha1)
        } else if s.eq_ignore_ascii_case("hmac-sha256") {
            Ok(Self::HmacSha256)
        } else {
            Err(UnsupportedAlgorithmError)
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.name().fmt(f)
    }
}

/// An error signaling that an algorithm name is not known to this
/// implementation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct UnsupportedAlgorithmError;

impl fmt::Display for UnsupportedAlgorithmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("unsupported TSIG algorithm")
    }
}

impl std::error::Error for UnsupportedAlgorithmError {}

////////////////////////////////////////////////////////////////////////
// AUTHENTICATOR ABSTRACTION                                          //
////////////////////////////////////////////////////////////////////////

/// An abstraction over different MAC implementations. Basically, this
/// wraps the `digest` crate's [`Mac`] trait to give us an object-safe
/// trait (so that we can use `Box<dyn Authenticator>`). An
/// authenticator is created keyed ([`Algorithm::make_authenticator`]),
/// fed the MAC input incrementally with [`Authenticator::update`], and
/// then either finalized into a MAC or verified against a received
/// (possibly truncated) MAC in constant time.
pub(super) trait Authenticator {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> Box<[u8]>;
    fn verify_truncated_left(self: Box<Self>, tag: &[u8]) -> Result<(), MacError>;
}

impl<M> Authenticator for M
where
    M: Mac,
{
    fn update(&mut self, data: &[u8]) {
        <Self as Mac>::update(self, data);
    }

    fn finalize(self: Box<Self>) -> Box<[u8]> {
        <Self as Mac>::finalize(*self)
            .into_bytes()
            .to_vec()
            .into_boxed_slice()
    }

    fn verify_truncated_left(self: Box<Self>, tag: &[u8]) -> Result<(), MacError> {
        <Self as Mac>::verify_truncated_left(*self, tag)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
