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

//! The TSIG sign and verify engines.
//!
//! [`sign`] generates a TSIG record for an outbound [`Message`] and
//! appends it; [`verify`] validates the TSIG record of a received
//! [`Message`] against the raw octets it was parsed from. Both compute
//! the MAC over the same input, laid out as [RFC 8945 § 4.3] requires:
//! for a response, the two-octet length of the related query's MAC
//! followed by that MAC; then the message itself, with the original
//! message ID restored and the TSIG RR excluded (which for a received
//! message also means decrementing ARCOUNT); then the TSIG "variables"
//! (key name, class ANY, TTL zero, algorithm name, timers, error, and
//! other data) in canonical form.
//!
//! The engines return discriminated errors and never log, retry, or
//! answer on the wire themselves: translating a [`VerifyError`] into
//! REFUSED, or into a signed BADTIME response carrying the server's
//! clock, is the calling protocol layer's business.
//!
//! [RFC 8945 § 4.3]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.3.3

use std::fmt;

use super::algorithm::Authenticator;
use super::keyring::Keyring;
use super::record::{TimeSigned, TsigRecord};
use crate::message::constants::*;
use crate::message::{ExtendedRcode, Message};
use crate::name::{LowercaseName, Name};

////////////////////////////////////////////////////////////////////////
// MAC INPUT ASSEMBLY                                                 //
////////////////////////////////////////////////////////////////////////

/// The TSIG variables that, per [RFC 8945 § 4.3.3], follow the message
/// octets in the MAC input.
///
/// [RFC 8945 § 4.3.3]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.3.3
struct Variables<'a> {
    key_name: &'a LowercaseName,
    algorithm: &'a LowercaseName,
    time_signed: TimeSigned,
    fudge: u16,
    error: ExtendedRcode,
    other: &'a [u8],
}

impl Variables<'_> {
    /// Adds the variables to a MAC. The key name and algorithm name
    /// enter in canonical (lowercase, uncompressed) wire form, followed
    /// by the class (ANY) and TTL (zero) of the TSIG RR.
    fn add_to(&self, authenticator: &mut dyn Authenticator) {
        authenticator.update(self.key_name.wire_repr());
        authenticator.update(b"\x00\xff\x00\x00\x00\x00");
        authenticator.update(self.algorithm.wire_repr());
        authenticator.update(self.time_signed.as_slice());
        authenticator.update(&self.fudge.to_be_bytes());
        authenticator.update(&u16::from(self.error).to_be_bytes());
        authenticator.update(&(self.other.len() as u16).to_be_bytes());
        authenticator.update(self.other);
    }
}

/// Adds the MAC of the related query to a MAC input, prefixed with its
/// two-octet length. This is the chaining step: it makes a response's
/// signature depend on its query's, and each message of a multi-message
/// answer depend on the one before it.
fn add_request_mac(authenticator: &mut dyn Authenticator, mac: &[u8]) {
    authenticator.update(&(mac.len() as u16).to_be_bytes());
    authenticator.update(mac);
}

////////////////////////////////////////////////////////////////////////
// SIGNING                                                            //
////////////////////////////////////////////////////////////////////////

/// Generates a TSIG record for `message` and appends it, incrementing
/// the message's ARCOUNT.
///
/// The message must carry a bound signing key (see
/// [`Message::attach_key`]) with secret material, and must not already
/// carry a TSIG record; violating either is a programming error and
/// panics. If the message is a response, the related query's TSIG
/// record must have been supplied with [`Message::set_query_tsig`], so
/// that the new signature chains to the query's MAC; a response that
/// cannot chain fails with [`SignError::ExpectedTsig`].
///
/// The record is built with the message's ID as the original ID and
/// the message's fudge and TSIG error settings. When the error is
/// BADTIME, the record echoes the query's timestamp and carries `now`
/// in the other-data field instead, as [RFC 8945 § 5.2.3] requires.
///
/// [RFC 8945 § 5.2.3]: https://datatracker.ietf.org/doc/html/rfc8945#section-5.2.3
pub fn sign(message: &mut Message, now: TimeSigned) -> Result<(), SignError> {
    let key = message
        .key()
        .cloned()
        .expect("sign() requires a key bound to the message");
    assert!(
        message.tsig().is_none(),
        "sign() called on a message that already carries a TSIG record",
    );
    let secret = key
        .secret()
        .expect("sign() requires a key with secret material");

    if message.is_response() && message.query_tsig().is_none() {
        // A response must always be able to chain to its query.
        return Err(SignError::ExpectedTsig);
    }

    let fudge = message.fudge();
    let error = message.tsig_error();
    let (time_signed, other): (TimeSigned, Box<[u8]>) = if error == ExtendedRcode::BADTIME {
        let query = message
            .query_tsig()
            .expect("BADTIME can only be signed into a response");
        (query.time_signed, now.as_slice().into())
    } else {
        (now, Vec::new().into())
    };

    let mut authenticator = key.algorithm().make_authenticator(secret);
    if let Some(query) = message.query_tsig() {
        add_request_mac(authenticator.as_mut(), &query.mac);
    }
    // The message does not carry the TSIG RR yet, so its octets are
    // exactly what the MAC covers: ID in place, ARCOUNT not counting
    // the TSIG.
    authenticator.update(message.octets());
    Variables {
        key_name: key.name(),
        algorithm: key.algorithm_name(),
        time_signed,
        fudge,
        error,
        other: &other,
    }
    .add_to(authenticator.as_mut());
    let mac = authenticator.finalize();

    let record = TsigRecord {
        key_name: key.name().to_owned(),
        algorithm: key.algorithm_name().to_owned(),
        time_signed,
        fudge,
        mac,
        original_id: message.id(),
        error,
        other,
    };
    let mut rr_octets = Vec::new();
    record.serialize_rr(&mut rr_octets).or(Err(SignError::NoSpace))?;
    if message.octets().len() + rr_octets.len() > MAX_MESSAGE_SIZE {
        return Err(SignError::NoSpace);
    }
    message.commit_tsig(record, &rr_octets);
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// VERIFICATION                                                       //
////////////////////////////////////////////////////////////////////////

/// Validates the TSIG record of a received `message` against the raw
/// octets it was parsed from.
///
/// A message without a TSIG record verifies trivially—unless it is a
/// response to a signed exchange, in which case the missing record is
/// itself a failure. A response's TSIG can only be checked against the
/// related query's record (see [`Message::set_query_tsig`]), since its
/// MAC chains to the query's.
///
/// The signing key is the one bound to the message, if any (the usual
/// case for responses, matched by the query's key); otherwise it is
/// looked up by the record's name and algorithm in `request_keyring`
/// and then `default_keyring`. A key that is unknown, empty, or
/// inconsistent with the record surfaces as
/// [`VerifyError::VerifyFailure`]—deliberately indistinguishable from a
/// bad signature, so that probing cannot reveal which key names are
/// configured.
///
/// On success—and on [`VerifyError::BadTime`], whose mandatory signed
/// BADTIME answer needs it—the resolved key is bound to the message,
/// where the caller can reach it for access-control decisions (see
/// [`Key::identity`](super::Key::identity)) and for signing the
/// answer.
pub fn verify(
    message: &mut Message,
    request_keyring: Option<&Keyring>,
    default_keyring: Option<&Keyring>,
    now: TimeSigned,
) -> Result<(), VerifyError> {
    let is_response = message.is_response();
    let tsig = match message.tsig() {
        Some(tsig) => tsig.clone(),
        None => {
            return if is_response
                && (message.key().is_some() || message.query_tsig().is_some())
            {
                Err(VerifyError::ExpectedTsig)
            } else {
                Ok(())
            };
        }
    };
    if is_response && message.query_tsig().is_none() {
        // A signed response cannot be checked without the query's MAC.
        // If we signed the query, the record was expected and the
        // exchange is broken; if we did not, the record itself is
        // unexpected.
        return if message.key().is_some() {
            Err(VerifyError::ExpectedTsig)
        } else {
            Err(VerifyError::UnexpectedTsig)
        };
    }

    // Resolve the signing key.
    let key = match message.key() {
        Some(key) => key.clone(),
        None => {
            let name: &Name = &tsig.key_name;
            let algorithm: &Name = &tsig.algorithm;
            let found = request_keyring
                .and_then(|ring| ring.find(name, Some(algorithm)))
                .or_else(|| default_keyring.and_then(|ring| ring.find(name, Some(algorithm))));
            match found {
                Some(key) => key,
                None => return Err(VerifyError::VerifyFailure),
            }
        }
    };
    let secret = match key.secret() {
        Some(secret) => secret,
        None => return Err(VerifyError::VerifyFailure),
    };
    if *key.name() != *tsig.key_name || *key.algorithm_name() != *tsig.algorithm {
        return Err(VerifyError::VerifyFailure);
    }

    // A received MAC may be truncated, but no further than the floor of
    // RFC 8945 § 5.2.2.1; anything shorter fails outright, whatever its
    // content.
    let algorithm = key.algorithm();
    if tsig.mac.len() > algorithm.output_size() || tsig.mac.len() < algorithm.minimum_mac_size() {
        return Err(VerifyError::VerifyFailure);
    }

    // Reconstruct the MAC input from the received octets: the original
    // ID in place of the current one, the ARCOUNT decremented to
    // exclude the TSIG RR, and the message only up to where the TSIG RR
    // starts.
    let mut authenticator = algorithm.make_authenticator(secret);
    if is_response {
        add_request_mac(authenticator.as_mut(), &message.query_tsig().unwrap().mac);
    }
    let octets = message.octets();
    let tsig_start = message.tsig_start();
    authenticator.update(&tsig.original_id.to_be_bytes());
    authenticator.update(&octets[ID_END..ARCOUNT_START]);
    let arcount =
        u16::from_be_bytes(octets[ARCOUNT_START..ARCOUNT_END].try_into().unwrap()) - 1;
    authenticator.update(&arcount.to_be_bytes());
    authenticator.update(&octets[ARCOUNT_END..tsig_start]);
    Variables {
        key_name: &tsig.key_name,
        algorithm: &tsig.algorithm,
        time_signed: tsig.time_signed,
        fudge: tsig.fudge,
        error: tsig.error,
        other: &tsig.other,
    }
    .add_to(authenticator.as_mut());
    if authenticator.verify_truncated_left(&tsig.mac).is_err() {
        return Err(VerifyError::VerifyFailure);
    }

    // The MAC is good: from here on the key is bound to the message,
    // since even the failure answers below must be signed with it.
    message.attach_key(key);

    // RFC 8945 § 5.2.3: the time signed must be within the fudge of our
    // own clock.
    let time_signed = tsig.time_signed.to_unix_time();
    let now = now.to_unix_time();
    if now < time_signed.saturating_sub(tsig.fudge as u64)
        || now > time_signed.saturating_add(tsig.fudge as u64)
    {
        return Err(VerifyError::BadTime);
    }

    // A response whose error field is set verified structurally, but
    // the server is reporting a problem; surface it instead of claiming
    // full success.
    if is_response && tsig.error != ExtendedRcode::NOERROR {
        return Err(VerifyError::ErrorSet(tsig.error));
    }

    Ok(())
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// Errors that arise during TSIG signing.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignError {
    /// The message is a response (or a continuation of a sequence) but
    /// no query TSIG record is available to chain to.
    ExpectedTsig,

    /// The TSIG RR does not fit: the signed message would exceed the
    /// 65,535-octet message limit (or the RDATA its own limit).
    NoSpace,
}

impl fmt::Display for SignError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ExpectedTsig => f.write_str("no query TSIG record to chain to"),
            Self::NoSpace => f.write_str("the TSIG record does not fit in the message"),
        }
    }
}

impl std::error::Error for SignError {}

/// Errors that arise during TSIG verification.
///
/// These are expected, security-relevant outcomes, not exceptional
/// program errors; the caller translates them into wire-level behavior
/// (REFUSED, a signed BADTIME response, tearing down a transfer, and so
/// on).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VerifyError {
    /// A TSIG record was expected but is missing (or, on a response to
    /// a signed query, could not be checked because the query's record
    /// was not retained).
    ExpectedTsig,

    /// A TSIG record is present on a response to an exchange we never
    /// signed.
    UnexpectedTsig,

    /// The TSIG record failed verification: unknown key, bad MAC, or a
    /// MAC truncated below the permitted floor. A response to this
    /// message must not be signed.
    VerifyFailure,

    /// The MAC is valid but the time signed is outside the fudge
    /// window. For a query, the caller answers with error BADTIME and
    /// its own clock in the other-data field, signed with the bound
    /// key.
    BadTime,

    /// The MAC is valid but the response's error field reports a
    /// problem (BADSIG, BADKEY, BADTIME, ...) from the server.
    ErrorSet(ExtendedRcode),
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ExpectedTsig => f.write_str("a TSIG record was expected but not seen"),
            Self::UnexpectedTsig => f.write_str("a TSIG record was seen but not expected"),
            Self::VerifyFailure => f.write_str("the TSIG record failed to verify"),
            Self::BadTime => f.write_str("the TSIG record is outside its time window"),
            Self::ErrorSet(error) => write!(f, "the TSIG record verified with error {}", error),
        }
    }
}

impl std::error::Error for VerifyError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use lazy_static::lazy_static;

    use super::super::record::TYPE_TSIG;
    use super::*;
    use crate::name::Name;

    // The messages below sign a TXT query for countersign.test. (and
    // its answer) with the key a.tsig.key., secret "topsecret", at Unix
    // time 1663798730. The HMAC-MD5 variant uses the key md5.tsig.key.
    // with the same secret.

    const UNSIGNED_REQUEST: &[u8] =
        b"\xa2\xe0\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\x0b\x63\x6f\x75\
          \x6e\x74\x65\x72\x73\x69\x67\x6e\x04\x74\x65\x73\x74\x00\x00\x10\
          \x00\x01";

    const REQUEST_WITH_TSIG: &[u8] =
        b"\xa2\xe0\x00\x00\x00\x01\x00\x00\x00\x00\x00\x01\x0b\x63\x6f\x75\
          \x6e\x74\x65\x72\x73\x69\x67\x6e\x04\x74\x65\x73\x74\x00\x00\x10\
          \x00\x01\x01\x61\x04\x74\x73\x69\x67\x03\x6b\x65\x79\x00\x00\xfa\
          \x00\xff\x00\x00\x00\x00\x00\x3d\x0b\x68\x6d\x61\x63\x2d\x73\x68\
          \x61\x32\x35\x36\x00\x00\x00\x63\x2b\x8d\xca\x01\x2c\x00\x20\xee\
          \x44\xb4\x02\x23\x57\x61\x56\x22\x49\xb3\xf5\x13\x30\x1d\x27\xd5\
          \x0a\xc3\x7b\xc8\x6b\xf1\x1e\x11\x38\x89\x57\x82\x55\x49\xec\xa2\
          \xe0\x00\x00\x00\x00";

    const UNSIGNED_RESPONSE: &[u8] =
        b"\xa2\xe0\x84\x00\x00\x01\x00\x01\x00\x00\x00\x00\x0b\x63\x6f\x75\
          \x6e\x74\x65\x72\x73\x69\x67\x6e\x04\x74\x65\x73\x74\x00\x00\x10\
          \x00\x01\xc0\x0c\x00\x10\x00\x01\x00\x01\x51\x80\x00\x0a\x09\x49\
          \x74\x20\x77\x6f\x72\x6b\x73\x21";

    const RESPONSE_WITH_TSIG: &[u8] =
        b"\xa2\xe0\x84\x00\x00\x01\x00\x01\x00\x00\x00\x01\x0b\x63\x6f\x75\
          \x6e\x74\x65\x72\x73\x69\x67\x6e\x04\x74\x65\x73\x74\x00\x00\x10\
          \x00\x01\xc0\x0c\x00\x10\x00\x01\x00\x01\x51\x80\x00\x0a\x09\x49\
          \x74\x20\x77\x6f\x72\x6b\x73\x21\x01\x61\x04\x74\x73\x69\x67\x03\
          \x6b\x65\x79\x00\x00\xfa\x00\xff\x00\x00\x00\x00\x00\x3d\x0b\x68\
          \x6d\x61\x63\x2d\x73\x68\x61\x32\x35\x36\x00\x00\x00\x63\x2b\x8d\
          \xca\x01\x2c\x00\x20\xb9\x7a\x5b\x68\x0d\xed\x69\xbb\x79\xb7\x48\
          \xd7\xf2\xd6\xd1\xc7\x3f\xcc\x78\x8c\x4f\x1d\x54\xd7\x04\x18\xc0\
          \x66\x4a\xd5\x17\x21\xa2\xe0\x00\x00\x00\x00";

    const REQUEST_WITH_MD5_TSIG: &[u8] =
        b"\xa2\xe0\x00\x00\x00\x01\x00\x00\x00\x00\x00\x01\x0b\x63\x6f\x75\
          \x6e\x74\x65\x72\x73\x69\x67\x6e\x04\x74\x65\x73\x74\x00\x00\x10\
          \x00\x01\x03\x6d\x64\x35\x04\x74\x73\x69\x67\x03\x6b\x65\x79\x00\
          \x00\xfa\x00\xff\x00\x00\x00\x00\x00\x3a\x08\x68\x6d\x61\x63\x2d\
          \x6d\x64\x35\x07\x73\x69\x67\x2d\x61\x6c\x67\x03\x72\x65\x67\x03\
          \x69\x6e\x74\x00\x00\x00\x63\x2b\x8d\xca\x01\x2c\x00\x10\x7d\x84\
          \x38\x22\x16\x73\x71\xaf\xe5\xd6\x23\x8c\xb5\x62\xbc\x2b\xa2\xe0\
          \x00\x00\x00\x00";

    const KEY: &[u8] = b"topsecret";
    const FUDGE: u16 = 300;
    const UNIX_TIME: u64 = 1663798730;

    // Offsets into REQUEST_WITH_TSIG.
    const REQUEST_TIME_OFFSET: usize = 69;
    const REQUEST_MAC_OFFSET: usize = 79;

    lazy_static! {
        static ref TIME_SIGNED: TimeSigned = TimeSigned::try_from_unix_time(UNIX_TIME).unwrap();
        static ref TOO_EARLY: TimeSigned =
            TimeSigned::try_from_unix_time(UNIX_TIME - FUDGE as u64 - 1).unwrap();
        static ref TOO_LATE: TimeSigned =
            TimeSigned::try_from_unix_time(UNIX_TIME + FUDGE as u64 + 1).unwrap();
    }

    fn name(s: &str) -> Box<Name> {
        s.parse().unwrap()
    }

    fn ring() -> Keyring {
        Keyring::with_keys([
            (name("a.tsig.key."), name("hmac-sha256."), KEY.to_vec()),
            (
                name("md5.tsig.key."),
                name("hmac-md5.sig-alg.reg.int."),
                KEY.to_vec(),
            ),
        ])
    }

    fn request_record() -> TsigRecord {
        Message::from_wire(REQUEST_WITH_TSIG.to_vec())
            .unwrap()
            .tsig()
            .unwrap()
            .clone()
    }

    ////////////////////////////////////////////////////////////////////
    // SIGNING TESTS                                                  //
    ////////////////////////////////////////////////////////////////////

    #[test]
    fn request_signing_works() {
        let ring = ring();
        let mut message = Message::from_wire(UNSIGNED_REQUEST.to_vec()).unwrap();
        message.attach_key(ring.find(&name("a.tsig.key."), None).unwrap());
        sign(&mut message, *TIME_SIGNED).unwrap();
        assert_eq!(message.octets(), REQUEST_WITH_TSIG);
    }

    #[test]
    fn md5_request_signing_works() {
        let ring = ring();
        let mut message = Message::from_wire(UNSIGNED_REQUEST.to_vec()).unwrap();
        message.attach_key(ring.find(&name("md5.tsig.key."), None).unwrap());
        sign(&mut message, *TIME_SIGNED).unwrap();
        assert_eq!(message.octets(), REQUEST_WITH_MD5_TSIG);
    }

    #[test]
    fn response_signing_works() {
        let ring = ring();
        let mut message = Message::from_wire(UNSIGNED_RESPONSE.to_vec()).unwrap();
        message.attach_key(ring.find(&name("a.tsig.key."), None).unwrap());
        message.set_query_tsig(request_record());
        sign(&mut message, *TIME_SIGNED).unwrap();
        assert_eq!(message.octets(), RESPONSE_WITH_TSIG);
    }

    #[test]
    fn response_signing_requires_query_record() {
        let ring = ring();
        let mut message = Message::from_wire(UNSIGNED_RESPONSE.to_vec()).unwrap();
        message.attach_key(ring.find(&name("a.tsig.key."), None).unwrap());
        assert_eq!(
            sign(&mut message, *TIME_SIGNED),
            Err(SignError::ExpectedTsig),
        );
    }

    #[test]
    #[should_panic(expected = "already carries a TSIG record")]
    fn signing_twice_panics() {
        let ring = ring();
        let mut message = Message::from_wire(REQUEST_WITH_TSIG.to_vec()).unwrap();
        message.attach_key(ring.find(&name("a.tsig.key."), None).unwrap());
        let _ = sign(&mut message, *TIME_SIGNED);
    }

    ////////////////////////////////////////////////////////////////////
    // REQUEST VERIFICATION TESTS                                     //
    ////////////////////////////////////////////////////////////////////

    fn verify_request(octets: &[u8], now: TimeSigned) -> Result<(), VerifyError> {
        let ring = ring();
        let mut message = Message::from_wire(octets.to_vec()).unwrap();
        verify(&mut message, Some(&ring), None, now)
    }

    #[test]
    fn request_verification_works() {
        assert_eq!(verify_request(REQUEST_WITH_TSIG, *TIME_SIGNED), Ok(()));
    }

    #[test]
    fn md5_request_verification_works() {
        assert_eq!(verify_request(REQUEST_WITH_MD5_TSIG, *TIME_SIGNED), Ok(()));
    }

    #[test]
    fn verification_binds_key_for_access_control() {
        let ring = ring();
        let mut message = Message::from_wire(REQUEST_WITH_TSIG.to_vec()).unwrap();
        verify(&mut message, Some(&ring), None, *TIME_SIGNED).unwrap();
        assert_eq!(message.key().unwrap().identity().to_string(), "a.tsig.key.");
    }

    #[test]
    fn verification_falls_back_to_the_default_keyring() {
        let empty = Keyring::new();
        let ring = ring();
        let mut message = Message::from_wire(REQUEST_WITH_TSIG.to_vec()).unwrap();
        assert_eq!(
            verify(&mut message, Some(&empty), Some(&ring), *TIME_SIGNED),
            Ok(()),
        );
    }

    #[test]
    fn unsigned_query_verifies_trivially() {
        assert_eq!(verify_request(UNSIGNED_REQUEST, *TIME_SIGNED), Ok(()));
    }

    #[test]
    fn unknown_key_is_a_verification_failure() {
        let other_ring = Keyring::with_keys([(
            name("b.tsig.key."),
            name("hmac-sha256."),
            KEY.to_vec(),
        )]);
        let mut message = Message::from_wire(REQUEST_WITH_TSIG.to_vec()).unwrap();
        assert_eq!(
            verify(&mut message, Some(&other_ring), None, *TIME_SIGNED),
            Err(VerifyError::VerifyFailure),
        );
    }

    #[test]
    fn empty_key_is_a_verification_failure() {
        let ring = Keyring::new();
        ring.add(name("a.tsig.key."), &name("hmac-sha256."), None, false, None)
            .unwrap();
        let mut message = Message::from_wire(REQUEST_WITH_TSIG.to_vec()).unwrap();
        assert_eq!(
            verify(&mut message, Some(&ring), None, *TIME_SIGNED),
            Err(VerifyError::VerifyFailure),
        );
    }

    #[test]
    fn tampered_message_fails_verification() {
        let mut corrupted = REQUEST_WITH_TSIG.to_vec();
        corrupted[3] ^= 0x01; // flip an RCODE bit
        assert_eq!(
            verify_request(&corrupted, *TIME_SIGNED),
            Err(VerifyError::VerifyFailure),
        );
    }

    #[test]
    fn tampered_mac_fails_verification() {
        let mut corrupted = REQUEST_WITH_TSIG.to_vec();
        corrupted[REQUEST_MAC_OFFSET] ^= 0x01;
        assert_eq!(
            verify_request(&corrupted, *TIME_SIGNED),
            Err(VerifyError::VerifyFailure),
        );
    }

    #[test]
    fn tampered_time_fails_verification() {
        let mut corrupted = REQUEST_WITH_TSIG.to_vec();
        corrupted[REQUEST_TIME_OFFSET + 5] ^= 0x01;
        assert_eq!(
            verify_request(&corrupted, *TIME_SIGNED),
            Err(VerifyError::VerifyFailure),
        );
    }

    /// Rebuilds `REQUEST_WITH_TSIG` with its (valid) MAC truncated to
    /// `len` octets.
    fn request_with_truncated_mac(len: usize) -> Vec<u8> {
        let mut message = Message::from_wire(REQUEST_WITH_TSIG.to_vec()).unwrap();
        let mut record = message.tsig().unwrap().clone();
        record.mac = record.mac[..len].into();
        let mut octets = UNSIGNED_REQUEST.to_vec();
        record.serialize_rr(&mut octets).unwrap();
        octets[ARCOUNT_START..ARCOUNT_END].copy_from_slice(&1u16.to_be_bytes());
        // Sanity check: reparse.
        message = Message::from_wire(octets.clone()).unwrap();
        assert_eq!(message.tsig().unwrap().mac.len(), len);
        octets
    }

    #[test]
    fn truncated_mac_at_the_floor_verifies() {
        // Half of HMAC-SHA256's output is the truncation floor.
        let octets = request_with_truncated_mac(16);
        assert_eq!(verify_request(&octets, *TIME_SIGNED), Ok(()));
    }

    #[test]
    fn truncated_mac_below_the_floor_fails() {
        // A 8-octet prefix of the valid MAC would pass the constant-time
        // comparison; the floor has to reject it first.
        let octets = request_with_truncated_mac(8);
        assert_eq!(
            verify_request(&octets, *TIME_SIGNED),
            Err(VerifyError::VerifyFailure),
        );
    }

    #[test]
    fn time_window_boundaries_are_exact() {
        let at = |now: u64| {
            verify_request(
                REQUEST_WITH_TSIG,
                TimeSigned::try_from_unix_time(now).unwrap(),
            )
        };
        assert_eq!(at(UNIX_TIME - FUDGE as u64), Ok(()));
        assert_eq!(at(UNIX_TIME + FUDGE as u64), Ok(()));
        assert_eq!(at(UNIX_TIME - FUDGE as u64 - 1), Err(VerifyError::BadTime));
        assert_eq!(at(UNIX_TIME + FUDGE as u64 + 1), Err(VerifyError::BadTime));
    }

    #[test]
    fn stale_query_still_binds_the_key() {
        // The BADTIME answer must be signed, so the key has to be bound
        // even though verification failed.
        let ring = ring();
        let mut message = Message::from_wire(REQUEST_WITH_TSIG.to_vec()).unwrap();
        assert_eq!(
            verify(&mut message, Some(&ring), None, *TOO_LATE),
            Err(VerifyError::BadTime),
        );
        assert!(message.key().is_some());
    }

    ////////////////////////////////////////////////////////////////////
    // RESPONSE VERIFICATION TESTS                                    //
    ////////////////////////////////////////////////////////////////////

    fn response_message() -> Message {
        let ring = ring();
        let mut message = Message::from_wire(RESPONSE_WITH_TSIG.to_vec()).unwrap();
        message.attach_key(ring.find(&name("a.tsig.key."), None).unwrap());
        message.set_query_tsig(request_record());
        message
    }

    #[test]
    fn response_verification_works() {
        let mut message = response_message();
        assert_eq!(verify(&mut message, None, None, *TIME_SIGNED), Ok(()));
    }

    #[test]
    fn response_verification_works_via_keyring_lookup() {
        let ring = ring();
        let mut message = Message::from_wire(RESPONSE_WITH_TSIG.to_vec()).unwrap();
        message.set_query_tsig(request_record());
        assert_eq!(
            verify(&mut message, Some(&ring), None, *TIME_SIGNED),
            Ok(()),
        );
    }

    #[test]
    fn tampered_response_fails_verification() {
        let mut corrupted = RESPONSE_WITH_TSIG.to_vec();
        corrupted[3] ^= 0x01;
        let ring = ring();
        let mut message = Message::from_wire(corrupted).unwrap();
        message.attach_key(ring.find(&name("a.tsig.key."), None).unwrap());
        message.set_query_tsig(request_record());
        assert_eq!(
            verify(&mut message, None, None, *TIME_SIGNED),
            Err(VerifyError::VerifyFailure),
        );
    }

    #[test]
    fn response_with_wrong_query_mac_fails() {
        let mut message = response_message();
        let mut record = request_record();
        record.mac = vec![0; 32].into();
        message.set_query_tsig(record);
        assert_eq!(
            verify(&mut message, None, None, *TIME_SIGNED),
            Err(VerifyError::VerifyFailure),
        );
    }

    #[test]
    fn response_without_query_record_fails() {
        // We signed the query (the key is bound) but did not retain its
        // record: the response cannot chain.
        let ring = ring();
        let mut message = Message::from_wire(RESPONSE_WITH_TSIG.to_vec()).unwrap();
        message.attach_key(ring.find(&name("a.tsig.key."), None).unwrap());
        assert_eq!(
            verify(&mut message, None, None, *TIME_SIGNED),
            Err(VerifyError::ExpectedTsig),
        );

        // An exchange we never signed at all makes the TSIG unexpected.
        let mut message = Message::from_wire(RESPONSE_WITH_TSIG.to_vec()).unwrap();
        assert_eq!(
            verify(&mut message, None, None, *TIME_SIGNED),
            Err(VerifyError::UnexpectedTsig),
        );
    }

    #[test]
    fn missing_tsig_on_a_signed_exchange_fails() {
        let ring = ring();
        let mut message = Message::from_wire(UNSIGNED_RESPONSE.to_vec()).unwrap();
        message.attach_key(ring.find(&name("a.tsig.key."), None).unwrap());
        message.set_query_tsig(request_record());
        assert_eq!(
            verify(&mut message, None, None, *TIME_SIGNED),
            Err(VerifyError::ExpectedTsig),
        );
    }

    ////////////////////////////////////////////////////////////////////
    // END-TO-END TESTS                                               //
    ////////////////////////////////////////////////////////////////////

    #[test]
    fn full_exchange_round_trips() {
        let client_ring = ring();
        let server_ring = ring();

        // Client signs a query.
        let mut query = Message::from_wire(UNSIGNED_REQUEST.to_vec()).unwrap();
        query.attach_key(client_ring.find(&name("a.tsig.key."), None).unwrap());
        sign(&mut query, *TIME_SIGNED).unwrap();

        // Server verifies it, answers, and signs the answer with the
        // query's record.
        let mut received_query = Message::from_wire(query.octets().to_vec()).unwrap();
        verify(&mut received_query, Some(&server_ring), None, *TIME_SIGNED).unwrap();
        let mut response = Message::from_wire(UNSIGNED_RESPONSE.to_vec()).unwrap();
        response.attach_key(received_query.key().unwrap().clone());
        response.set_query_tsig(received_query.tsig().unwrap().clone());
        sign(&mut response, *TIME_SIGNED).unwrap();

        // Client verifies the answer against the record it sent.
        let mut received_response = Message::from_wire(response.octets().to_vec()).unwrap();
        received_response.attach_key(query.key().unwrap().clone());
        received_response.set_query_tsig(query.tsig().unwrap().clone());
        assert_eq!(
            verify(&mut received_response, None, None, *TIME_SIGNED),
            Ok(()),
        );
    }

    #[test]
    fn error_responses_surface_as_error_set() {
        let ring = ring();

        // A server signs a BADKEY response.
        let mut response = Message::from_wire(UNSIGNED_RESPONSE.to_vec()).unwrap();
        response.attach_key(ring.find(&name("a.tsig.key."), None).unwrap());
        response.set_query_tsig(request_record());
        response.set_tsig_error(ExtendedRcode::BADKEY);
        sign(&mut response, *TIME_SIGNED).unwrap();

        // The client sees the error surfaced, not full success.
        let mut received = Message::from_wire(response.octets().to_vec()).unwrap();
        received.attach_key(ring.find(&name("a.tsig.key."), None).unwrap());
        received.set_query_tsig(request_record());
        assert_eq!(
            verify(&mut received, None, None, *TIME_SIGNED),
            Err(VerifyError::ErrorSet(ExtendedRcode::BADKEY)),
        );
    }

    #[test]
    fn badtime_responses_echo_the_query_time_and_report_ours() {
        let ring = ring();

        // The query is stale from the server's point of view.
        let server_now = *TOO_LATE;
        let mut query = Message::from_wire(REQUEST_WITH_TSIG.to_vec()).unwrap();
        assert_eq!(
            verify(&mut query, Some(&ring), None, server_now),
            Err(VerifyError::BadTime),
        );

        // The server answers with a signed BADTIME response.
        let mut response = Message::from_wire(UNSIGNED_RESPONSE.to_vec()).unwrap();
        response.attach_key(query.key().unwrap().clone());
        response.set_query_tsig(query.tsig().unwrap().clone());
        response.set_tsig_error(ExtendedRcode::BADTIME);
        sign(&mut response, server_now).unwrap();
        let record = response.tsig().unwrap();
        assert_eq!(record.time_signed, *TIME_SIGNED);
        assert_eq!(&*record.other, server_now.as_slice());

        // The client can verify it (the timestamp is the one it sent,
        // so its own window check passes) and sees BADTIME surfaced.
        let mut received = Message::from_wire(response.octets().to_vec()).unwrap();
        received.attach_key(ring.find(&name("a.tsig.key."), None).unwrap());
        received.set_query_tsig(request_record());
        assert_eq!(
            verify(&mut received, None, None, *TIME_SIGNED),
            Err(VerifyError::ErrorSet(ExtendedRcode::BADTIME)),
        );
    }

    #[test]
    fn continuation_messages_chain_to_the_prior_message() {
        let ring = ring();
        let key = ring.find(&name("a.tsig.key."), None).unwrap();

        // Sign two copies of the same response payload, one chained to
        // the query and one chained to the first response, as on a
        // stream transport. Their MACs must differ.
        let mut first = Message::from_wire(UNSIGNED_RESPONSE.to_vec()).unwrap();
        first.attach_key(key.clone());
        first.set_query_tsig(request_record());
        sign(&mut first, *TIME_SIGNED).unwrap();

        let mut second = Message::from_wire(UNSIGNED_RESPONSE.to_vec()).unwrap();
        second.attach_key(key.clone());
        second.set_query_tsig(first.tsig().unwrap().clone());
        sign(&mut second, *TIME_SIGNED).unwrap();

        assert_ne!(first.tsig().unwrap().mac, second.tsig().unwrap().mac);

        // And the second verifies only against the first's record.
        let mut received = Message::from_wire(second.octets().to_vec()).unwrap();
        received.attach_key(key.clone());
        received.set_query_tsig(first.tsig().unwrap().clone());
        assert_eq!(verify(&mut received, None, None, *TIME_SIGNED), Ok(()));

        let mut received = Message::from_wire(second.octets().to_vec()).unwrap();
        received.attach_key(key);
        received.set_query_tsig(request_record());
        assert_eq!(
            verify(&mut received, None, None, *TIME_SIGNED),
            Err(VerifyError::VerifyFailure),
        );
    }

    #[test]
    fn signing_honors_the_message_size_limit() {
        // A maximally-sized message has no room left for a TSIG RR.
        let mut octets = UNSIGNED_REQUEST.to_vec();
        let padding = MAX_MESSAGE_SIZE - octets.len() - 30;
        octets.extend_from_slice(&vec![0; padding]);
        // Frame the padding as a single opaque record so the walker
        // accepts it.
        octets[ANCOUNT_START..ANCOUNT_END].copy_from_slice(&1u16.to_be_bytes());
        let rdlength = (padding - 11) as u16;
        octets[UNSIGNED_REQUEST.len()..UNSIGNED_REQUEST.len() + 11].copy_from_slice(
            &[
                0x00, // owner: root
                0x00,
                0x10, // type TXT
                0x00,
                0x01, // class IN
                0x00,
                0x00,
                0x00,
                0x00, // TTL
                (rdlength >> 8) as u8,
                rdlength as u8,
            ],
        );
        let mut message = Message::from_wire(octets).unwrap();
        message.attach_key(ring().find(&name("a.tsig.key."), None).unwrap());
        assert_eq!(sign(&mut message, *TIME_SIGNED), Err(SignError::NoSpace));
    }

    #[test]
    fn parsed_tsig_type_constant_is_consistent() {
        // The TSIG RR in the golden request really is framed as TYPE
        // 250, class ANY, TTL 0.
        let tsig_start = UNSIGNED_REQUEST.len();
        let owner_len = 12; // a.tsig.key.
        let fixed = &REQUEST_WITH_TSIG[tsig_start + owner_len..tsig_start + owner_len + 8];
        assert_eq!(
            u16::from_be_bytes(fixed[0..2].try_into().unwrap()),
            TYPE_TSIG,
        );
        assert_eq!(fixed[2..8], [0x00, 0xff, 0x00, 0x00, 0x00, 0x00]);
    }
}
