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

//! A TSIG ([RFC 8945]) keyring and message-authentication library.
//!
//! Countersign implements the core of DNS transaction signatures: a
//! concurrent [keyring](tsig::Keyring) of shared-secret keys, and
//! [sign](tsig::sign)/[verify](tsig::verify) engines that compute and
//! validate keyed MACs over DNS message octets, including the chained
//! signatures that bind responses to queries and tie together
//! multi-message answers on stream transports.
//!
//! It is a library for DNS servers and clients, not a server itself: it
//! neither parses non-TSIG record data nor touches the network. Callers
//! hand it received wire octets (or a message about to be sent) as a
//! [`message::Message`] together with the relevant keyrings, and act on
//! the outcome.
//!
//! [RFC 8945]: https://datatracker.ietf.org/doc/html/rfc8945

#[cfg(feature = "config")]
pub mod config;
pub mod message;
pub mod name;
pub mod tsig;
