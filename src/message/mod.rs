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

//! The message model consumed by the TSIG engines.
//!
//! The [`Message`] type pairs the raw octets of a DNS message—exactly
//! as received or about to be transmitted—with the TSIG state the sign
//! and verify engines work on: the parsed TSIG record (if any) and
//! where it starts, the bound signing key, and the TSIG record of the
//! related query (which supplies the prior MAC for chained signatures).
//!
//! This module deliberately stops short of being a DNS message parser:
//! questions and non-TSIG records are *walked*, not interpreted, since
//! the MAC covers their raw octets and nothing else about them matters
//! here.

use std::fmt;
use std::sync::Arc;

use crate::name::Name;
use crate::tsig::record::{ReadRdataError, TsigRecord, CLASS_ANY, TYPE_TSIG};
use crate::tsig::{Key, DEFAULT_FUDGE};

pub(crate) mod constants;
mod rcode;
pub mod reader;
pub use rcode::ExtendedRcode;
pub use reader::Reader;

use constants::*;

////////////////////////////////////////////////////////////////////////
// MESSAGE                                                            //
////////////////////////////////////////////////////////////////////////

/// A DNS message as the TSIG engines see it.
///
/// A `Message` is constructed from the message's wire octets with
/// [`Message::from_wire`], which walks the message, locates a trailing
/// TSIG record if one is present, and validates its framing (a TSIG RR
/// must be the last record of the additional section, in class ANY,
/// with a TTL of zero).
///
/// Before signing, a key must be bound with [`Message::attach_key`];
/// when the message answers (or continues) a signed exchange, the
/// related query's TSIG record must be supplied with
/// [`Message::set_query_tsig`] so that the new signature can be chained
/// to the prior MAC. Verification binds the resolved key to the message
/// so that the caller can consult [`Key::identity`] for access-control
/// decisions.
pub struct Message {
    octets: Vec<u8>,
    tsig: Option<TsigRecord>,
    tsig_start: usize,
    key: Option<Arc<Key>>,
    query_tsig: Option<TsigRecord>,
    fudge: u16,
    tsig_error: ExtendedRcode,
}

impl Message {
    /// Constructs a `Message` from wire octets, locating and validating
    /// the TSIG record if one is present.
    pub fn from_wire(octets: Vec<u8>) -> Result<Self, Error> {
        let mut tsig = None;
        let mut tsig_start = 0;

        let mut reader = Reader::try_from(octets.as_slice())?;
        for _ in 0..reader.qdcount() {
            reader.skip_question()?;
        }
        let rr_total =
            reader.ancount() as usize + reader.nscount() as usize + reader.arcount() as usize;
        for i in 0..rr_total {
            let frame = reader.next_rr()?;
            if frame.rr_type == TYPE_TSIG {
                // RFC 8945 § 5.1: at most one TSIG RR, and it must be
                // the last record of the additional section.
                if i + 1 != rr_total || reader.arcount() == 0 {
                    return Err(Error::TsigNotLast);
                }
                if frame.class != CLASS_ANY || frame.ttl != 0 {
                    return Err(Error::TsigFormErr);
                }
                let (owner, _) = Name::try_from_compressed(&octets, frame.start)
                    .map_err(reader::Error::InvalidName)?;
                let rdata = &octets[frame.rdata_start..frame.rdata_start + frame.rdlength as usize];
                tsig = Some(TsigRecord::read_rdata(owner.into(), rdata)?);
                tsig_start = frame.start;
            }
        }
        if !reader.at_eom() {
            return Err(Error::TrailingOctets);
        }

        Ok(Self {
            octets,
            tsig,
            tsig_start,
            key: None,
            query_tsig: None,
            fudge: DEFAULT_FUDGE,
            tsig_error: ExtendedRcode::NOERROR,
        })
    }

    /// Returns the message's wire octets.
    pub fn octets(&self) -> &[u8] {
        &self.octets
    }

    /// Consumes the `Message`, returning its wire octets.
    pub fn into_octets(self) -> Vec<u8> {
        self.octets
    }

    /// Returns the 16-bit ID of the message.
    pub fn id(&self) -> u16 {
        u16::from_be_bytes(self.octets[ID_START..ID_END].try_into().unwrap())
    }

    /// Returns whether this message is a response (i.e., whether its QR
    /// bit is set).
    pub fn is_response(&self) -> bool {
        (self.octets[QR_BYTE] & QR_MASK) != 0
    }

    /// Returns the message's TSIG record, if it carries one.
    pub fn tsig(&self) -> Option<&TsigRecord> {
        self.tsig.as_ref()
    }

    /// Returns the offset at which the TSIG RR starts. Only meaningful
    /// when [`Message::tsig`] is `Some`.
    pub(crate) fn tsig_start(&self) -> usize {
        self.tsig_start
    }

    /// Returns the signing key bound to this message, if any.
    pub fn key(&self) -> Option<&Arc<Key>> {
        self.key.as_ref()
    }

    /// Binds a signing key to this message. The sign engine requires
    /// one; the verify engine binds the key it resolves.
    pub fn attach_key(&mut self, key: Arc<Key>) {
        self.key = Some(key);
    }

    /// Returns the TSIG record of the related query, if one has been
    /// supplied.
    pub fn query_tsig(&self) -> Option<&TsigRecord> {
        self.query_tsig.as_ref()
    }

    /// Supplies the TSIG record of the related query (or, on a stream
    /// transport, of the prior message of the sequence). Signing and
    /// verification of responses chain to its MAC.
    pub fn set_query_tsig(&mut self, record: TsigRecord) {
        self.query_tsig = Some(record);
    }

    /// Returns the fudge (in seconds) the sign engine will put in this
    /// message's TSIG record.
    pub fn fudge(&self) -> u16 {
        self.fudge
    }

    /// Sets the fudge used when this message is signed. The default is
    /// [`DEFAULT_FUDGE`].
    pub fn set_fudge(&mut self, fudge: u16) {
        self.fudge = fudge;
    }

    /// Returns the extended RCODE the sign engine will put in the error
    /// field of this message's TSIG record.
    pub fn tsig_error(&self) -> ExtendedRcode {
        self.tsig_error
    }

    /// Sets the extended RCODE for the error field of this message's
    /// TSIG record. Servers use this to sign BADSIG/BADKEY/BADTIME
    /// error responses; the default is NOERROR.
    pub fn set_tsig_error(&mut self, error: ExtendedRcode) {
        self.tsig_error = error;
    }

    /// Appends a serialized TSIG RR to the message, incrementing the
    /// ARCOUNT and recording the parsed form. For use by the sign
    /// engine, which has already serialized `record` into `rr_octets`.
    pub(crate) fn commit_tsig(&mut self, record: TsigRecord, rr_octets: &[u8]) {
        self.tsig_start = self.octets.len();
        self.octets.extend_from_slice(rr_octets);
        let arcount =
            u16::from_be_bytes(self.octets[ARCOUNT_START..ARCOUNT_END].try_into().unwrap()) + 1;
        self.octets[ARCOUNT_START..ARCOUNT_END].copy_from_slice(&arcount.to_be_bytes());
        self.tsig = Some(record);
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id())
            .field("is_response", &self.is_response())
            .field("len", &self.octets.len())
            .field("tsig", &self.tsig)
            .field("key", &self.key)
            .field("query_tsig", &self.query_tsig)
            .field("fudge", &self.fudge)
            .field("tsig_error", &self.tsig_error)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a [`Message`] could not be constructed from
/// wire octets. Callers will generally answer messages that produce
/// these with FORMERR.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// The message could not be walked.
    Reader(reader::Error),

    /// A TSIG RR is present but is not the last record of the
    /// additional section.
    TsigNotLast,

    /// The TSIG RR's class is not ANY or its TTL is not zero.
    TsigFormErr,

    /// The TSIG RR's RDATA is malformed.
    TsigRdata(ReadRdataError),

    /// There is data after the last record.
    TrailingOctets,
}

impl From<reader::Error> for Error {
    fn from(err: reader::Error) -> Self {
        Self::Reader(err)
    }
}

impl From<ReadRdataError> for Error {
    fn from(err: ReadRdataError) -> Self {
        Self::TsigRdata(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Reader(err) => err.fmt(f),
            Self::TsigNotLast => f.write_str("TSIG RR is not the last record"),
            Self::TsigFormErr => f.write_str("TSIG RR has a bad class or TTL"),
            Self::TsigRdata(err) => write!(f, "bad TSIG RDATA: {}", err),
            Self::TrailingOctets => f.write_str("data after the last record"),
        }
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
