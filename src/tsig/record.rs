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

//! Handling of the transaction signature (TSIG) pseudo-RR.
//!
//! This follows the TSIG specification as restated and updated by
//! [RFC 8945].
//!
//! [RFC 8945]: https://datatracker.ietf.org/doc/html/rfc8945

use std::fmt;
use std::time::{Duration, SystemTime};

use crate::message::ExtendedRcode;
use crate::name::{self, LowercaseName, Name};

/// The TYPE value assigned to the TSIG pseudo-RR.
pub const TYPE_TSIG: u16 = 250;

/// The CLASS value a TSIG pseudo-RR carries (ANY).
pub const CLASS_ANY: u16 = 255;

////////////////////////////////////////////////////////////////////////
// TSIG RECORD                                                        //
////////////////////////////////////////////////////////////////////////

/// The semantic content of a TSIG pseudo-RR.
///
/// A `TsigRecord` owns the fields of a TSIG RR in decoded form: the
/// owner (key) name, the algorithm name, the timers, the MAC, the
/// original message ID, the extended RCODE reported in the error field,
/// and the "other data" field (which carries the server's time in
/// BADTIME responses). The sign engine produces these and the message
/// parser consumes them; [`TsigRecord::read_rdata`] and
/// [`TsigRecord::serialize_rr`] convert to and from the exact wire
/// layout mandated by [RFC 8945 § 4.2].
///
/// The key name and algorithm name are kept in canonical (lowercase)
/// form, since that is the form in which they enter MAC computation.
///
/// [RFC 8945 § 4.2]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.2
#[derive(Clone, Debug)]
pub struct TsigRecord {
    pub key_name: Box<LowercaseName>,
    pub algorithm: Box<LowercaseName>,
    pub time_signed: TimeSigned,
    pub fudge: u16,
    pub mac: Box<[u8]>,
    pub original_id: u16,
    pub error: ExtendedRcode,
    pub other: Box<[u8]>,
}

impl TsigRecord {
    /// Reads a `TsigRecord` from TSIG RDATA. The owner name of the RR
    /// (which is the key name) is supplied by the caller, since it is
    /// not part of the RDATA.
    pub fn read_rdata(key_name: Box<LowercaseName>, rdata: &[u8]) -> Result<Self, ReadRdataError> {
        let (algorithm, algorithm_len) =
            Name::try_from_uncompressed(rdata).map_err(ReadRdataError::Name)?;
        let fixed = rdata
            .get(algorithm_len..algorithm_len + 10)
            .ok_or(ReadRdataError::Other)?;
        let time_signed = TimeSigned::from(<[u8; 6]>::try_from(&fixed[0..6]).unwrap());
        let fudge = u16::from_be_bytes(fixed[6..8].try_into().unwrap());
        let mac_size = u16::from_be_bytes(fixed[8..10].try_into().unwrap()) as usize;
        let mac_start = algorithm_len + 10;
        let mac = rdata
            .get(mac_start..mac_start + mac_size)
            .ok_or(ReadRdataError::Other)?;
        let tail = rdata
            .get(mac_start + mac_size..mac_start + mac_size + 6)
            .ok_or(ReadRdataError::Other)?;
        let original_id = u16::from_be_bytes(tail[0..2].try_into().unwrap());
        let error = ExtendedRcode::from(u16::from_be_bytes(tail[2..4].try_into().unwrap()));
        let other_len = u16::from_be_bytes(tail[4..6].try_into().unwrap()) as usize;
        let other = &rdata[mac_start + mac_size + 6..];
        if other.len() != other_len {
            return Err(ReadRdataError::Other);
        }
        Ok(Self {
            key_name,
            algorithm: algorithm.into(),
            time_signed,
            fudge,
            mac: mac.into(),
            original_id,
            error,
            other: other.into(),
        })
    }

    /// Returns the length of the record's RDATA, or an error if it
    /// would exceed the 65,535-octet RDATA limit.
    pub fn rdata_len(&self) -> Result<usize, RdataTooLongError> {
        (self.algorithm.wire_repr().len() + 16)
            .checked_add(self.mac.len())
            .and_then(|len| len.checked_add(self.other.len()))
            .filter(|len| *len <= u16::MAX as usize)
            .ok_or(RdataTooLongError)
    }

    /// Serializes the record's RDATA into the provided buffer.
    fn serialize_rdata(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.algorithm.wire_repr());
        buf.extend_from_slice(self.time_signed.as_slice());
        buf.extend_from_slice(&self.fudge.to_be_bytes());
        buf.extend_from_slice(&(self.mac.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.mac);
        buf.extend_from_slice(&self.original_id.to_be_bytes());
        buf.extend_from_slice(&u16::from(self.error).to_be_bytes());
        buf.extend_from_slice(&(self.other.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.other);
    }

    /// Serializes the complete TSIG RR (owner name, TYPE, CLASS, TTL,
    /// RDLENGTH, and RDATA) into the provided buffer. The owner name is
    /// never compressed. This checks whether the RDATA would exceed the
    /// 65,535-octet limit and returns an error if so.
    pub fn serialize_rr(&self, buf: &mut Vec<u8>) -> Result<(), RdataTooLongError> {
        let rdata_len = self.rdata_len()?;
        buf.reserve(self.key_name.wire_repr().len() + 10 + rdata_len);
        buf.extend_from_slice(self.key_name.wire_repr());
        buf.extend_from_slice(&TYPE_TSIG.to_be_bytes());
        buf.extend_from_slice(&CLASS_ANY.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&(rdata_len as u16).to_be_bytes());
        self.serialize_rdata(buf);
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////
// TSIG TIME-SIGNED FIELD                                             //
////////////////////////////////////////////////////////////////////////

/// A convenience type for working with the TSIG "time signed" field.
///
/// The "time signed" field is represented on the wire as an unsigned
/// 48-bit big-endian integer giving the number of seconds since the
/// Unix epoch, not counting leap seconds—i.e., Unix time. This type
/// allows conversions between this on-the-wire format (which is used as
/// the internal representation), Unix time expressed with a [`u64`],
/// and Rust's [`SystemTime`].
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct TimeSigned([u8; 6]);

impl TimeSigned {
    /// Converts Unix time expressed as a [`u64`] into a `TimeSigned`.
    /// This fails if the conversion would truncate the time.
    pub fn try_from_unix_time(seconds: u64) -> Result<Self, UnrepresentableTimeError> {
        let octets = seconds.to_be_bytes();
        if octets[0] != 0 || octets[1] != 0 {
            Err(UnrepresentableTimeError)
        } else {
            Ok(Self(octets[2..8].try_into().unwrap()))
        }
    }

    /// Converts a `TimeSigned` into Unix time expressed as a [`u64`].
    pub fn to_unix_time(self) -> u64 {
        let mut octets = [0; 8];
        octets[2..8].copy_from_slice(self.0.as_slice());
        u64::from_be_bytes(octets)
    }

    /// Borrows the `TimeSigned`'s internal representation (an unsigned
    /// 48-bit big-endian integer) as a slice.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<[u8; 6]> for TimeSigned {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl From<TimeSigned> for [u8; 6] {
    fn from(time_signed: TimeSigned) -> Self {
        time_signed.0
    }
}

impl TryFrom<SystemTime> for TimeSigned {
    type Error = UnrepresentableTimeError;

    fn try_from(system_time: SystemTime) -> Result<Self, Self::Error> {
        if let Ok(since_epoch) = system_time.duration_since(SystemTime::UNIX_EPOCH) {
            Self::try_from_unix_time(since_epoch.as_secs())
        } else {
            Err(UnrepresentableTimeError)
        }
    }
}

impl TryFrom<TimeSigned> for SystemTime {
    type Error = UnrepresentableTimeError;

    fn try_from(time_signed: TimeSigned) -> Result<Self, Self::Error> {
        SystemTime::UNIX_EPOCH
            .checked_add(Duration::from_secs(time_signed.to_unix_time()))
            .ok_or(UnrepresentableTimeError)
    }
}

impl fmt::Debug for TimeSigned {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_unix_time())
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that TSIG RDATA could not be read.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ReadRdataError {
    /// The algorithm name is invalid.
    Name(name::Error),

    /// The RDATA is otherwise malformed (truncated, or with a length
    /// field inconsistent with its actual length).
    Other,
}

impl fmt::Display for ReadRdataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Name(err) => write!(f, "invalid algorithm name: {}", err),
            Self::Other => f.write_str("malformed TSIG RDATA"),
        }
    }
}

impl std::error::Error for ReadRdataError {}

/// An error signaling that TSIG RDATA would exceed the 65,535-octet
/// RDATA limit.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RdataTooLongError;

impl fmt::Display for RdataTooLongError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("TSIG RDATA would exceed the 65,535-octet limit")
    }
}

impl std::error::Error for RdataTooLongError {}

/// An error signifying that a TSIG time conversion failed, due to the
/// time from the source type not being representable in the target
/// type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct UnrepresentableTimeError;

impl fmt::Display for UnrepresentableTimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("TSIG time conversion failed due to unrepresentable time")
    }
}

impl std::error::Error for UnrepresentableTimeError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
