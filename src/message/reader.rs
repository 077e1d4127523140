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

//! Implementation of the [`Reader`] type to walk on-the-wire DNS
//! messages.

use std::convert::TryFrom;
use std::fmt;

use super::constants::*;
use crate::name::{self, Name};

////////////////////////////////////////////////////////////////////////
// READER                                                             //
////////////////////////////////////////////////////////////////////////

/// A "frame" around a buffer containing a DNS message that enables
/// walking the message data.
///
/// A `Reader` is constructed using its [`TryFrom`] implementation. Any
/// underlying buffer for a reader must contain at least a full DNS
/// message header of 12 octets; otherwise the construction will fail.
///
/// Since header information is in a fixed position, it can be read at
/// any time through the appropriate `Reader` methods. Questions and
/// resource records are consumed sequentially with
/// [`Reader::skip_question`] and [`Reader::next_rr`], using a cursor
/// initially set to the first octet after the DNS header.
///
/// Unlike a full message parser, this reader does not interpret RDATA:
/// it only frames each record, reporting where it starts, its type,
/// class, and TTL, and where its RDATA lies. That is all the TSIG
/// engines need in order to locate the TSIG RR and to know which
/// octets of the message the MAC covers.
#[derive(Eq, PartialEq)]
pub struct Reader<'a> {
    octets: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    /// Returns the 16-bit ID of the message.
    pub fn id(&self) -> u16 {
        u16::from_be_bytes(self.octets[ID_START..ID_END].try_into().unwrap())
    }

    /// Returns whether the QR (query response) bit is set.
    pub fn qr(&self) -> bool {
        (self.octets[QR_BYTE] & QR_MASK) != 0
    }

    /// Returns the number of questions in the message.
    pub fn qdcount(&self) -> u16 {
        u16::from_be_bytes(self.octets[QDCOUNT_START..QDCOUNT_END].try_into().unwrap())
    }

    /// Returns the number of answers in the message.
    pub fn ancount(&self) -> u16 {
        u16::from_be_bytes(self.octets[ANCOUNT_START..ANCOUNT_END].try_into().unwrap())
    }

    /// Returns the number of authority records in the message.
    pub fn nscount(&self) -> u16 {
        u16::from_be_bytes(self.octets[NSCOUNT_START..NSCOUNT_END].try_into().unwrap())
    }

    /// Returns the number of additional records in the message.
    pub fn arcount(&self) -> u16 {
        u16::from_be_bytes(self.octets[ARCOUNT_START..ARCOUNT_END].try_into().unwrap())
    }

    /// Skips a question starting at the current cursor.
    ///
    /// This method is atomic, in that the cursor is not changed on
    /// failure.
    pub fn skip_question(&mut self) -> Result<()> {
        let qname_len =
            Name::skip_compressed(self.octets, self.cursor).map_err(Error::InvalidName)?;
        let end = self.cursor + qname_len + 4;
        if end > self.octets.len() {
            return Err(Error::UnexpectedEomInField);
        }
        self.cursor = end;
        Ok(())
    }

    /// Frames the resource record at the current cursor and advances
    /// past it.
    ///
    /// This method is atomic, in that the cursor is not changed on
    /// failure.
    pub fn next_rr(&mut self) -> Result<RrFrame> {
        let start = self.cursor;
        let owner_len = Name::skip_compressed(self.octets, start).map_err(Error::InvalidName)?;
        let fixed_start = start + owner_len;
        let fixed = self
            .octets
            .get(fixed_start..fixed_start + 10)
            .ok_or(Error::UnexpectedEomInField)?;
        let rr_type = u16::from_be_bytes(fixed[0..2].try_into().unwrap());
        let class = u16::from_be_bytes(fixed[2..4].try_into().unwrap());
        let ttl = u32::from_be_bytes(fixed[4..8].try_into().unwrap());
        let rdlength = u16::from_be_bytes(fixed[8..10].try_into().unwrap());
        let rdata_start = fixed_start + 10;
        let end = rdata_start + rdlength as usize;
        if end > self.octets.len() {
            return Err(Error::UnexpectedEomInField);
        }
        self.cursor = end;
        Ok(RrFrame {
            start,
            rr_type,
            class,
            ttl,
            rdata_start,
            rdlength,
        })
    }

    /// Returns the current cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns whether the `Reader`'s cursor has reached the end of the
    /// message.
    pub fn at_eom(&self) -> bool {
        self.cursor >= self.octets.len()
    }
}

impl<'a> TryFrom<&'a [u8]> for Reader<'a> {
    type Error = Error;

    fn try_from(octets: &'a [u8]) -> Result<Self> {
        if octets.len() >= HEADER_SIZE {
            Ok(Self {
                octets,
                cursor: HEADER_SIZE,
            })
        } else {
            Err(Error::HeaderTooShort)
        }
    }
}

impl fmt::Debug for Reader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reader")
            .field("id", &self.id())
            .field("qr", &self.qr())
            .field("qdcount", &self.qdcount())
            .field("ancount", &self.ancount())
            .field("nscount", &self.nscount())
            .field("arcount", &self.arcount())
            .field("cursor", &self.cursor)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// RR FRAME STRUCTURE                                                 //
////////////////////////////////////////////////////////////////////////

/// A structure describing the location and fixed fields of a resource
/// record, as returned by [`Reader::next_rr`]. The RDATA occupies the
/// `rdlength` octets starting at `rdata_start`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RrFrame {
    pub start: usize,
    pub rr_type: u16,
    pub class: u16,
    pub ttl: u32,
    pub rdata_start: usize,
    pub rdlength: u16,
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a question or resource record could not be
/// walked.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    HeaderTooShort,
    UnexpectedEomInField,
    InvalidName(name::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::HeaderTooShort => f.write_str("header too short"),
            Self::UnexpectedEomInField => f.write_str("unexpected end of message in field"),
            Self::InvalidName(err) => write!(f, "invalid name: {}", err),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by fallible [`Reader`] methods.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// This is a reply to a query for example.com. IN NS to a recursive
    /// server, made on January 7, 2022.
    const EXAMPLE_COM_NS_MESSAGE: &[u8] =
        b"\xe2\xd7\x81\x80\x00\x01\x00\x02\x00\x00\x00\x01\x07\x65\x78\x61\
          \x6d\x70\x6c\x65\x03\x63\x6f\x6d\x00\x00\x02\x00\x01\xc0\x0c\x00\
          \x02\x00\x01\x00\x01\x50\xa2\x00\x14\x01\x61\x0c\x69\x61\x6e\x61\
          \x2d\x73\x65\x72\x76\x65\x72\x73\x03\x6e\x65\x74\x00\xc0\x0c\x00\
          \x02\x00\x01\x00\x01\x50\xa2\x00\x04\x01\x62\xc0\x2b\x00\x00\x29\
          \x10\x00\x00\x00\x00\x00\x00\x00";

    #[test]
    fn reader_works() {
        let mut reader = Reader::try_from(EXAMPLE_COM_NS_MESSAGE).unwrap();

        // Check the header.
        assert_eq!(reader.id(), 0xe2d7);
        assert!(reader.qr());
        assert_eq!(reader.qdcount(), 1);
        assert_eq!(reader.ancount(), 2);
        assert_eq!(reader.nscount(), 0);
        assert_eq!(reader.arcount(), 1);

        // Skip the question.
        reader.skip_question().unwrap();
        assert_eq!(reader.cursor(), 29);

        // Frame the answers.
        let answer_1 = reader.next_rr().unwrap();
        assert_eq!(answer_1.start, 29);
        assert_eq!(answer_1.rr_type, 2);
        assert_eq!(answer_1.class, 1);
        assert_eq!(answer_1.ttl, 86178);
        assert_eq!(answer_1.rdlength, 20);
        let answer_2 = reader.next_rr().unwrap();
        assert_eq!(answer_2.rr_type, 2);
        assert_eq!(answer_2.rdlength, 4);

        // Frame the OPT record.
        let opt = reader.next_rr().unwrap();
        assert_eq!(opt.rr_type, 41);
        assert_eq!(opt.rdlength, 0);

        // And that should be it!
        assert!(reader.at_eom());
    }

    #[test]
    fn reader_constructor_rejects_short_message() {
        for size in 0..HEADER_SIZE {
            let buf = vec![0; size];
            assert_eq!(Reader::try_from(buf.as_slice()), Err(Error::HeaderTooShort));
        }
    }

    #[test]
    fn next_rr_rejects_truncated_rdata() {
        // A message claiming one answer whose RDATA extends past the
        // end of the buffer.
        let message = b"\x00\x00\x00\x00\x00\x00\x00\x01\x00\x00\x00\x00\
                        \x00\x00\x01\x00\x01\x00\x00\x00\x00\x00\x04\xc0";
        let mut reader = Reader::try_from(message.as_slice()).unwrap();
        assert_eq!(reader.next_rr(), Err(Error::UnexpectedEomInField));
    }
}
