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

//! Implementation of Secret Key Transaction Authentication for DNS
//! (TSIG), as specified by [RFC 8945].
//!
//! TSIG authenticates individual DNS exchanges with a secret shared
//! between the two parties. The sender computes a keyed MAC over the
//! message it is about to send and appends it in a TSIG pseudo-RR; the
//! receiver recomputes the MAC with the same key and compares. A
//! response's MAC additionally covers the MAC of its query, binding the
//! two together, and on stream transports each message of a long answer
//! chains to the message before it.
//!
//! Keys live in a [`Keyring`]: a concurrent registry that configuration
//! loading populates at startup (see the `config` module) and that
//! hands out reference-counted [`Key`] handles.
//! Removing a key ([`Key::mark_deleted`]) is deferred while handles are
//! outstanding, so a configuration reload never pulls a key out from
//! under an in-flight verification.
//!
//! The [`sign`] and [`verify`] engines do the actual work, operating on
//! the [`Message`](crate::message::Message) model, and speak in terms
//! of a fixed set of outcomes ([`SignError`], [`VerifyError`]) that the
//! calling protocol layer translates into wire-level behavior.
//!
//! Supported algorithms are the members of [`Algorithm`]: HMAC-MD5
//! under its reserved identifier, plus HMAC-SHA1 and HMAC-SHA256.
//!
//! [RFC 8945]: https://datatracker.ietf.org/doc/html/rfc8945

mod algorithm;
mod engine;
mod key;
mod keyring;
pub mod record;

pub use algorithm::{Algorithm, UnsupportedAlgorithmError};
pub use engine::{sign, verify, SignError, VerifyError};
pub use key::Key;
pub use keyring::{AddError, Keyring};
pub use record::{TimeSigned, TsigRecord};

/// The default fudge (allowed clock skew, in seconds) placed in signed
/// messages, per [RFC 8945 § 10].
///
/// [RFC 8945 § 10]: https://datatracker.ietf.org/doc/html/rfc8945#section-10
pub const DEFAULT_FUDGE: u16 = 300;
