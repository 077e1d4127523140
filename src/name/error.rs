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

//! Errors related to domain name processing.

use std::fmt;

/// An error produced when parsing or validating a domain name.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// A label exceeds 63 octets.
    LabelTooLong,

    /// The name's wire representation exceeds 255 octets.
    NameTooLong,

    /// The data ended before the name was complete.
    UnexpectedEom,

    /// There is extra data after the name.
    ExtraData,

    /// A compression pointer does not point to a prior occurrence.
    InvalidPointer,

    /// The source string is empty.
    StrEmpty,

    /// The source string contains non-ASCII characters.
    StrNotAscii,

    /// The source string does not end with the root label (i.e., it is
    /// not a fully qualified domain name).
    NonNullTerminal,

    /// The source string contains an empty non-terminal label.
    NullNonTerminal,

    /// The source string contains an invalid escape sequence.
    InvalidEscape,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::LabelTooLong => f.write_str("label exceeds 63 octets"),
            Self::NameTooLong => f.write_str("name exceeds 255 octets"),
            Self::UnexpectedEom => f.write_str("unexpected end of data in name"),
            Self::ExtraData => f.write_str("extra data after name"),
            Self::InvalidPointer => f.write_str("invalid compression pointer"),
            Self::StrEmpty => f.write_str("empty string"),
            Self::StrNotAscii => f.write_str("string is not ASCII"),
            Self::NonNullTerminal => f.write_str("name is not fully qualified"),
            Self::NullNonTerminal => f.write_str("empty non-terminal label"),
            Self::InvalidEscape => f.write_str("invalid escape sequence"),
        }
    }
}

impl std::error::Error for Error {}
