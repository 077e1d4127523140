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

//! Implementation of data structures related to domain names.

use std::fmt::{self, Write};
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;
use std::str::FromStr;

use arrayvec::ArrayVec;

mod error;
mod lowercase;
mod wire;
pub use error::Error;
pub use lowercase::LowercaseName;

/// The maximum length of the uncompressed on-the-wire representation of
/// a domain name.
const MAX_WIRE_LEN: usize = 255;

/// The maximum length of a label in a domain name (not including the
/// octet that provides the length).
const MAX_LABEL_LEN: usize = 63;

////////////////////////////////////////////////////////////////////////
// NAME STRUCTURE                                                     //
////////////////////////////////////////////////////////////////////////

/// A structure to represent a domain name.
///
/// This is a dynamically sized type, generally used through the `&Name`
/// and `Box<Name>` types. Internally, a `Name` is a wrapper over the
/// validated uncompressed on-the-wire representation of the name, as
/// defined in [RFC 1035 § 3.1]; label boundaries are recovered by
/// walking the length octets. (This is the same technique this crate's
/// ancestors use for RDATA: a `#[repr(transparent)]` wrapper over
/// `[u8]` that can only be constructed from valid data.)
///
/// Boxed `Name`s can be constructed in several ways:
///
/// * through the [`FromStr`] implementation;
/// * from uncompressed on-the-wire names through
///   [`Name::try_from_uncompressed`] and
///   [`Name::try_from_uncompressed_all`]; and
/// * from compressed on-the-wire names through
///   [`Name::try_from_compressed`].
///
/// Equality and hashing follow DNS name-comparison rules: ASCII letters
/// are compared case-insensitively.
///
/// [RFC 1035 § 3.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.1
#[repr(transparent)]
pub struct Name {
    octets: [u8],
}

/// Private construction helpers for use within this module.
impl Name {
    /// Converts a `&[u8]` to a `&Name`, without validation; for use
    /// within this module only, on data already known to be a valid
    /// uncompressed wire-form name.
    fn from_unchecked(octets: &[u8]) -> &Self {
        unsafe { &*(octets as *const [u8] as *const Self) }
    }

    /// Converts a buffer containing a valid uncompressed wire-form name
    /// into a `Box<Name>`.
    fn boxed_from_octets(octets: Vec<u8>) -> Box<Self> {
        let boxed_octets = octets.into_boxed_slice();
        unsafe { Box::from_raw(Box::into_raw(boxed_octets) as *mut Name) }
    }
}

////////////////////////////////////////////////////////////////////////
// NAME PUBLIC API                                                    //
////////////////////////////////////////////////////////////////////////

impl Name {
    /// Returns whether the `Name` is the DNS root `.`.
    pub fn is_root(&self) -> bool {
        self.octets.len() == 1
    }

    /// Returns an iterator over the labels in this `Name`, from the
    /// leftmost label to the terminal null label.
    pub fn labels(&self) -> Labels {
        Labels {
            octets: &self.octets,
        }
    }

    /// Makes all ASCII letters in this `Name` lowercase.
    ///
    /// This is provided with [RFC 4034 § 6.2] (DNSSEC canonical RR
    /// form) in mind. See also [`LowercaseName`].
    ///
    /// [RFC 4034 § 6.2]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.2
    pub fn make_ascii_lowercase(&mut self) {
        // Length octets are at most 63 and are therefore never ASCII
        // uppercase letters, so the whole buffer can be lowercased.
        self.octets.make_ascii_lowercase();
    }

    /// Returns a reference to a `Name` representing the DNS root, `.`.
    pub fn root() -> &'static Name {
        Name::from_unchecked(&[0])
    }

    /// Skips a compressed name present at index `start` of the provided
    /// buffer. This continues until the end of the name or the first
    /// pointer label, whichever comes first, and returns the number of
    /// contiguous octets the name occupies at `start`.
    ///
    /// This performs validation only on the portion of the name read.
    /// Furthermore, when this terminates at a pointer, it does *not*
    /// check whether the pointer itself is valid (i.e., points
    /// backward).
    pub fn skip_compressed(octets: &[u8], start: usize) -> Result<usize, Error> {
        wire::skip_compressed_name(octets, start)
    }

    /// Tries to parse a compressed name present at index `start` of the
    /// provided buffer. Pointers are followed; indices given in
    /// pointers are treated as equivalent to indices in `octets` (so
    /// generally one will pass an entire DNS message in `octets`). Two
    /// things are returned on success:
    ///
    /// * a new boxed `Name`; and
    /// * the number of contiguous octets read at `start`—equivalently,
    ///   the number of octets to skip after `start` to read the next
    ///   field when parsing a DNS message.
    pub fn try_from_compressed(octets: &[u8], start: usize) -> Result<(Box<Self>, usize), Error> {
        wire::parse_compressed_name(octets, start)
    }

    /// Tries to parse an uncompressed name present at the start of the
    /// provided buffer. The name need not occupy the entire buffer;
    /// extra data is ignored. If the name is valid, a new boxed `Name`
    /// is returned along with the length of the name in octets.
    pub fn try_from_uncompressed(octets: &[u8]) -> Result<(Box<Self>, usize), Error> {
        wire::parse_uncompressed_name(octets, false)
    }

    /// Like [`Name::try_from_uncompressed`], but in addition fails if
    /// there is extra data in the buffer after the name (and does not
    /// return the length of the name on success, since it is equal to
    /// the length of the buffer).
    pub fn try_from_uncompressed_all(octets: &[u8]) -> Result<Box<Self>, Error> {
        wire::parse_uncompressed_name(octets, true).map(|(name, _)| name)
    }

    /// Validates an uncompressed name present at the start of the
    /// provided buffer; this is [`Name::try_from_uncompressed`], except
    /// it does not allocate a new boxed `Name`. If the name is valid,
    /// its length in octets is returned.
    pub fn validate_uncompressed(octets: &[u8]) -> Result<usize, Error> {
        wire::validate_uncompressed_name(octets, false)
    }

    /// Returns the (uncompressed) on-the-wire representation of the
    /// `Name`.
    pub fn wire_repr(&self) -> &[u8] {
        &self.octets
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in self.labels() {
            if label.is_empty() {
                break;
            }
            for &octet in label {
                match octet {
                    b'.' | b'\\' => write!(f, "\\{}", octet as char)?,
                    0x21..=0x7e => f.write_char(octet as char)?,
                    _ => write!(f, "\\{:03}", octet)?,
                }
            }
            f.write_char('.')?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        // Length octets are at most 63, so they never compare equal to
        // an ASCII letter under case-insensitive comparison; comparing
        // the whole wire representations at once is therefore sound.
        self.octets.eq_ignore_ascii_case(&other.octets)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for &octet in &self.octets {
            state.write_u8(octet.to_ascii_lowercase());
        }
    }
}

impl ToOwned for Name {
    type Owned = Box<Name>;

    fn to_owned(&self) -> Self::Owned {
        Name::boxed_from_octets(self.octets.to_vec())
    }
}

impl Clone for Box<Name> {
    fn clone(&self) -> Self {
        self.as_ref().to_owned()
    }
}

////////////////////////////////////////////////////////////////////////
// ITERATION OVER A NAME'S LABELS                                     //
////////////////////////////////////////////////////////////////////////

/// An iterator over the labels in a [`Name`], yielding each label's
/// octets (without the leading length octet). The terminal null label
/// is yielded as an empty slice.
///
/// To use this iterator, construct one from a [`Name`] using
/// [`Name::labels`].
#[derive(Clone, Debug)]
pub struct Labels<'a> {
    octets: &'a [u8],
}

impl<'a> Iterator for Labels<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.octets.is_empty() {
            None
        } else {
            let len = self.octets[0] as usize;
            let label = &self.octets[1..1 + len];
            self.octets = &self.octets[1 + len..];
            Some(label)
        }
    }
}

impl FusedIterator for Labels<'_> {}

////////////////////////////////////////////////////////////////////////
// PARSING OF NAMES FROM RUST STRINGS                                 //
////////////////////////////////////////////////////////////////////////

/// Allows for conversion of a Rust [`str`] into a boxed [`Name`]. The
/// passed string must be strictly ASCII and fully qualified (i.e., it
/// must end with a dot). Escape sequences as defined by
/// [RFC 4343 § 2.1] are supported.
///
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
impl FromStr for Box<Name> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::StrEmpty);
        } else if s == "." {
            return Ok(Name::root().to_owned());
        }

        let mut wire = Vec::with_capacity(s.len() + 2);
        let mut label = ArrayVec::<u8, MAX_LABEL_LEN>::new();
        let mut remaining_octets: &[u8] = s.as_ref();

        // NOTE: to check that the string is ASCII, it suffices to check
        // that each octet is ASCII as we go, since all multi-byte
        // characters start with an octet that is not ASCII.
        while let Some(&octet) = remaining_octets.first() {
            if octet == b'\\' {
                let (value, consumed) = parse_escape(&remaining_octets[1..])?;
                label.try_push(value).or(Err(Error::LabelTooLong))?;
                remaining_octets = &remaining_octets[consumed + 1..];
            } else if octet == b'.' {
                if label.is_empty() {
                    return Err(Error::NullNonTerminal);
                }
                wire.push(label.len() as u8);
                wire.extend_from_slice(&label);
                label.clear();
                remaining_octets = &remaining_octets[1..];
            } else if !octet.is_ascii() {
                return Err(Error::StrNotAscii);
            } else {
                label.try_push(octet).or(Err(Error::LabelTooLong))?;
                remaining_octets = &remaining_octets[1..];
            }
        }

        if !label.is_empty() {
            return Err(Error::NonNullTerminal);
        }
        wire.push(0);
        if wire.len() > MAX_WIRE_LEN {
            return Err(Error::NameTooLong);
        }
        Ok(Name::boxed_from_octets(wire))
    }
}

/// Parses an escape sequence. We expect `remaining_octets` to start
/// with the octet immediately *after* the backslash that introduces the
/// escape sequence.
fn parse_escape(remaining_octets: &[u8]) -> Result<(u8, usize), Error> {
    if remaining_octets.is_empty() {
        Err(Error::InvalidEscape)
    } else if remaining_octets[0].is_ascii_digit() {
        if remaining_octets.len() < 3
            || !remaining_octets[1].is_ascii_digit()
            || !remaining_octets[2].is_ascii_digit()
        {
            Err(Error::InvalidEscape)
        } else {
            let hundreds = (remaining_octets[0] - b'0') as usize;
            let tens = (remaining_octets[1] - b'0') as usize;
            let ones = (remaining_octets[2] - b'0') as usize;
            let value = 100 * hundreds + 10 * tens + ones;
            if value > 255 {
                Err(Error::InvalidEscape)
            } else {
                Ok((value as u8, 3))
            }
        }
    } else {
        Ok((remaining_octets[0], 1))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use super::*;

    #[test]
    fn root_is_root() {
        assert!(Name::root().is_root());
        assert_eq!(Name::root().wire_repr(), &[0]);
    }

    #[test]
    fn fromstr_works() {
        let name: Box<Name> = "example.test.".parse().unwrap();
        assert_eq!(name.wire_repr(), b"\x07example\x04test\x00");
    }

    #[test]
    fn fromstr_works_for_root() {
        let name: Box<Name> = ".".parse().unwrap();
        assert_eq!(name.as_ref(), Name::root());
    }

    #[test]
    fn fromstr_rejects_empty() {
        assert_eq!("".parse::<Box<Name>>(), Err(Error::StrEmpty));
    }

    #[test]
    fn fromstr_rejects_non_ascii() {
        assert_eq!("✈.aero.".parse::<Box<Name>>(), Err(Error::StrNotAscii));
    }

    #[test]
    fn fromstr_rejects_non_fqdn() {
        assert_eq!("non.fqdn".parse::<Box<Name>>(), Err(Error::NonNullTerminal));
    }

    #[test]
    fn fromstr_rejects_long_label() {
        assert_eq!(
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx."
                .parse::<Box<Name>>(),
            Err(Error::LabelTooLong)
        );
    }

    #[test]
    fn fromstr_rejects_long_name() {
        assert_eq!(
            "x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.\
             x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.\
             x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.\
             x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x."
                .parse::<Box<Name>>(),
            Err(Error::NameTooLong)
        );
    }

    #[test]
    fn fromstr_rejects_null_non_terminal() {
        assert_eq!("a.b..c.".parse::<Box<Name>>(), Err(Error::NullNonTerminal));
    }

    #[test]
    fn fromstr_escaping_works() {
        let escaped: Box<Name> = "\\000.\\\\\\..".parse().unwrap();
        assert_eq!(escaped.wire_repr(), b"\x01\x00\x02\\.\x00");
    }

    #[test]
    fn fromstr_rejects_invalid_escapes() {
        assert_eq!("\\00".parse::<Box<Name>>(), Err(Error::InvalidEscape));
        assert_eq!("\\00x.".parse::<Box<Name>>(), Err(Error::InvalidEscape));
        assert_eq!("\\256.".parse::<Box<Name>>(), Err(Error::InvalidEscape));
    }

    #[test]
    fn labels_iterator_works() {
        let name: Box<Name> = "a.bb.ccc.".parse().unwrap();
        let mut labels = name.labels();
        assert_eq!(labels.next(), Some(&b"a"[..]));
        assert_eq!(labels.next(), Some(&b"bb"[..]));
        assert_eq!(labels.next(), Some(&b"ccc"[..]));
        assert_eq!(labels.next(), Some(&b""[..]));
        assert_eq!(labels.next(), None);
    }

    #[test]
    fn eq_is_case_insensitive() {
        let upper: Box<Name> = "EXAMPLE.Test.".parse().unwrap();
        let lower: Box<Name> = "example.test.".parse().unwrap();
        let other: Box<Name> = "example.com.".parse().unwrap();
        assert_eq!(upper, lower);
        assert_ne!(upper, other);
    }

    #[test]
    fn hash_is_case_insensitive() {
        let upper: Box<Name> = "EXAMPLE.Test.".parse().unwrap();
        let lower: Box<Name> = "example.test.".parse().unwrap();
        let hash = |name: &Name| {
            let mut hasher = DefaultHasher::new();
            name.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash(&upper), hash(&lower));
    }

    #[test]
    fn display_works() {
        let name: Box<Name> = "www.example.test.".parse().unwrap();
        assert_eq!(name.to_string(), "www.example.test.");
        assert_eq!(Name::root().to_string(), ".");
        let escaped: Box<Name> = "\\000.\\\\\\..".parse().unwrap();
        assert_eq!(escaped.to_string(), "\\000.\\\\\\..");
    }

    #[test]
    fn make_ascii_lowercase_works() {
        let mut name: Box<Name> = "UPPERCASE.Domain.Test.".parse().unwrap();
        name.make_ascii_lowercase();
        assert_eq!(name.wire_repr(), b"\x09uppercase\x06domain\x04test\x00");
    }
}
