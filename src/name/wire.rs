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

//! Parsing, validation, and skipping of on-the-wire names.

use arrayvec::ArrayVec;

use super::{Error, Name, MAX_LABEL_LEN, MAX_WIRE_LEN};

////////////////////////////////////////////////////////////////////////
// VALIDATION AND PARSING OF UNCOMPRESSED ON-THE-WIRE NAMES           //
////////////////////////////////////////////////////////////////////////

/// Parses an uncompressed name present at the beginning of `octets`.
/// The parameter `use_all` controls whether to expect the name to
/// occupy the entire buffer. This is the implementation of
/// [`Name::try_from_uncompressed`] and
/// [`Name::try_from_uncompressed_all`].
pub fn parse_uncompressed_name(octets: &[u8], use_all: bool) -> Result<(Box<Name>, usize), Error> {
    let wire_len = validate_uncompressed_name(octets, use_all)?;
    Ok((Name::boxed_from_octets(octets[..wire_len].to_vec()), wire_len))
}

/// Validates an uncompressed name present at the beginning of `octets`.
/// The parameter `use_all` controls whether to expect the name to
/// occupy the entire buffer. This is the implementation of
/// [`Name::validate_uncompressed`].
pub fn validate_uncompressed_name(octets: &[u8], use_all: bool) -> Result<usize, Error> {
    let mut offset = 0;
    let mut finished = false;
    while !finished && offset < octets.len() {
        let label_len = octets[offset];
        if label_len > (MAX_LABEL_LEN as u8) {
            return Err(Error::LabelTooLong);
        } else if label_len == 0 {
            finished = true;
        }
        offset += label_len as usize + 1;
        if offset > MAX_WIRE_LEN {
            return Err(Error::NameTooLong);
        }
    }

    if !finished {
        Err(Error::UnexpectedEom)
    } else if use_all && offset < octets.len() {
        Err(Error::ExtraData)
    } else {
        Ok(offset)
    }
}

////////////////////////////////////////////////////////////////////////
// PARSING OF COMPRESSED ON-THE-WIRE NAMES                            //
////////////////////////////////////////////////////////////////////////

/// Parses a compressed name starting at index `start` of `octets`.
/// Pointers are followed; indices given in pointers are treated as
/// indices of `octets`, so the intention is for an entire DNS message
/// to be passed in `octets`. This is the implementation of
/// [`Name::try_from_compressed`].
pub fn parse_compressed_name(octets: &[u8], start: usize) -> Result<(Box<Name>, usize), Error> {
    let mut next_chunk = Some(start);
    let mut wire_len_of_first_chunk = None;
    let mut wire_repr = ArrayVec::<u8, MAX_WIRE_LEN>::new();

    while let Some(chunk_start) = next_chunk {
        let mut finished_with_chunk = false;
        let mut index = chunk_start;

        while !finished_with_chunk {
            let len = *octets.get(index).ok_or(Error::UnexpectedEom)?;
            if len & 0xc0 == 0xc0 {
                next_chunk = Some(parse_pointer(octets, chunk_start, index)? as usize);
                index += 2;
                finished_with_chunk = true;
            } else if len > (MAX_LABEL_LEN as u8) {
                return Err(Error::LabelTooLong);
            } else {
                let end_of_label = index + len as usize + 1;
                if len == 0 {
                    next_chunk = None;
                    finished_with_chunk = true;
                } else if end_of_label > octets.len() {
                    return Err(Error::UnexpectedEom);
                }
                wire_repr
                    .try_extend_from_slice(&octets[index..end_of_label])
                    .or(Err(Error::NameTooLong))?;
                index = end_of_label;
            }
        }

        wire_len_of_first_chunk.get_or_insert(index - chunk_start);
    }

    let name = Name::boxed_from_octets(wire_repr.to_vec());
    Ok((name, wire_len_of_first_chunk.unwrap()))
}

/// Parses a pointer at `index` in `octets`. This also checks that the
/// pointer refers to an index *earlier* than the start of the chunk it
/// is in (`chunk_start`). According to [RFC 1035 § 4.1.4], pointers
/// point to a *prior* occurrence of the name; importantly, this
/// prevents loops.
///
/// [RFC 1035 § 4.1.4]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.4
fn parse_pointer(octets: &[u8], chunk_start: usize, index: usize) -> Result<u16, Error> {
    if index + 1 < octets.len() {
        let pointer_bytes = [octets[index], octets[index + 1]];
        let pointer = u16::from_be_bytes(pointer_bytes) & (!0xc000);
        if (pointer as usize) >= chunk_start {
            Err(Error::InvalidPointer)
        } else {
            Ok(pointer)
        }
    } else {
        Err(Error::UnexpectedEom)
    }
}

////////////////////////////////////////////////////////////////////////
// SKIPPING OF COMPRESSED ON-THE-WIRE NAMES                           //
////////////////////////////////////////////////////////////////////////

/// Skips a compressed name starting at index `start` of `octets`,
/// returning the number of contiguous octets the name occupies at
/// `start`. This continues until the end of the name or the first
/// pointer label, whichever comes first. Validation is performed only
/// on the portion of the name read; when this terminates at a pointer,
/// it does *not* check whether the pointer itself is valid. This is
/// the implementation of [`Name::skip_compressed`].
pub fn skip_compressed_name(octets: &[u8], start: usize) -> Result<usize, Error> {
    let mut index = start;
    loop {
        let len = *octets.get(index).ok_or(Error::UnexpectedEom)?;
        if len & 0xc0 == 0xc0 {
            if index + 1 >= octets.len() {
                return Err(Error::UnexpectedEom);
            }
            return Ok(index + 2 - start);
        } else if len > (MAX_LABEL_LEN as u8) {
            return Err(Error::LabelTooLong);
        } else if len == 0 {
            return Ok(index + 1 - start);
        } else {
            index += len as usize + 1;
            if index > octets.len() {
                return Err(Error::UnexpectedEom);
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::Name;
    use super::*;

    #[test]
    fn parse_uncompressed_works() {
        let buffer = b"\x07example\x04test\x00extra";
        let (name, len) = parse_uncompressed_name(buffer, false).unwrap();
        assert_eq!(len, 14);
        assert_eq!(name.wire_repr(), b"\x07example\x04test\x00");
    }

    #[test]
    fn parse_uncompressed_all_rejects_extra_data() {
        let buffer = b"\x07example\x04test\x00extra";
        assert_eq!(
            parse_uncompressed_name(buffer, true).unwrap_err(),
            Error::ExtraData,
        );
    }

    #[test]
    fn parse_uncompressed_rejects_truncated_name() {
        assert_eq!(
            parse_uncompressed_name(b"\x07exam", false).unwrap_err(),
            Error::UnexpectedEom,
        );
    }

    #[test]
    fn parse_uncompressed_rejects_long_label() {
        let mut buffer = vec![64];
        buffer.extend_from_slice(&[b'x'; 64]);
        buffer.push(0);
        assert_eq!(
            parse_uncompressed_name(&buffer, false).unwrap_err(),
            Error::LabelTooLong,
        );
    }

    #[test]
    fn parse_compressed_follows_pointers() {
        // A (fake) message in which the name at offset 18 ends with a
        // pointer to the name at offset 4.
        let buffer = b"\x00\x00\x00\x00\x07example\x04test\x00\x03www\xc0\x04";
        let (name, len) = parse_compressed_name(buffer, 18).unwrap();
        assert_eq!(len, 6);
        assert_eq!(name.wire_repr(), b"\x03www\x07example\x04test\x00");
    }

    #[test]
    fn parse_compressed_rejects_forward_pointer() {
        let buffer = b"\x00\x00\x03www\xc0\x02";
        assert_eq!(
            parse_compressed_name(buffer, 2).unwrap_err(),
            Error::InvalidPointer,
        );
    }

    #[test]
    fn skip_compressed_works() {
        let root: Box<Name> = ".".parse().unwrap();
        assert_eq!(skip_compressed_name(root.wire_repr(), 0).unwrap(), 1);
        assert_eq!(
            skip_compressed_name(b"\x03www\x07example\x04test\x00", 0).unwrap(),
            18,
        );
        assert_eq!(skip_compressed_name(b"\x03www\xc0\x04", 0).unwrap(), 6);
    }

    #[test]
    fn skip_compressed_rejects_truncated_name() {
        assert_eq!(
            skip_compressed_name(b"\x03www", 0).unwrap_err(),
            Error::UnexpectedEom,
        );
        assert_eq!(
            skip_compressed_name(b"\x03www\xc0", 0).unwrap_err(),
            Error::UnexpectedEom,
        );
    }
}
