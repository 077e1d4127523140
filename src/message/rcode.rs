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

//! Implementation of the [`ExtendedRcode`] type.

use std::fmt;

////////////////////////////////////////////////////////////////////////
// EXTENDED RCODES                                                    //
////////////////////////////////////////////////////////////////////////

/// An extended RCODE.
///
/// While the RCODE field of the DNS message header is four bits wide,
/// EDNS(0) and TSIG both carry 16-bit extended RCODEs. The TSIG error
/// field in particular is an extended RCODE, for which [RFC 8945]
/// assigns the TSIG-specific values [BADSIG](ExtendedRcode::BADSIG),
/// [BADKEY](ExtendedRcode::BADKEY), [BADTIME](ExtendedRcode::BADTIME),
/// and [BADTRUNC](ExtendedRcode::BADTRUNC).
///
/// An extended RCODE is represented on the wire as an unsigned 16-bit
/// integer, so this is basically a wrapper around [`u16`] with nice
/// [`Debug`](fmt::Debug) and [`Display`](fmt::Display) implementations
/// and constants for the values this crate traffics in.
///
/// [RFC 8945]: https://datatracker.ietf.org/doc/html/rfc8945
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct ExtendedRcode(u16);

impl ExtendedRcode {
    // RFC 1035
    pub const NOERROR: Self = Self(0);
    pub const FORMERR: Self = Self(1);
    pub const SERVFAIL: Self = Self(2);
    pub const NOTIMP: Self = Self(4);
    pub const REFUSED: Self = Self(5);
    pub const NOTAUTH: Self = Self(9);

    // RFC 8945
    pub const BADSIG: Self = Self(16);
    pub const BADKEY: Self = Self(17);
    pub const BADTIME: Self = Self(18);

    // RFC 8945 (originally RFC 4635)
    pub const BADTRUNC: Self = Self(22);
}

impl From<u16> for ExtendedRcode {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<ExtendedRcode> for u16 {
    fn from(rcode: ExtendedRcode) -> Self {
        rcode.0
    }
}

impl fmt::Display for ExtendedRcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::NOERROR => f.write_str("NOERROR"),
            Self::FORMERR => f.write_str("FORMERR"),
            Self::SERVFAIL => f.write_str("SERVFAIL"),
            Self::NOTIMP => f.write_str("NOTIMP"),
            Self::REFUSED => f.write_str("REFUSED"),
            Self::NOTAUTH => f.write_str("NOTAUTH"),
            Self::BADSIG => f.write_str("BADSIG"),
            Self::BADKEY => f.write_str("BADKEY"),
            Self::BADTIME => f.write_str("BADTIME"),
            Self::BADTRUNC => f.write_str("BADTRUNC"),
            Self(other) => write!(f, "{}", other),
        }
    }
}

impl fmt::Debug for ExtendedRcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
