// Copyright 2021 Matthew Ingwersen.
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

//! Parsing of on-the-wire names, with and without compression.

use arrayvec::ArrayVec;

use super::{Error, Name, MAX_LABEL_LEN, MAX_WIRE_LEN};

////////////////////////////////////////////////////////////////////////
// UNCOMPRESSED NAMES                                                 //
////////////////////////////////////////////////////////////////////////

/// Parses an uncompressed name at the beginning of `octets`, returning
/// the name and its length on the wire. Extra data after the name is
/// ignored. This is the implementation of
/// [`Name::try_from_uncompressed`].
pub fn parse_uncompressed_name(octets: &[u8]) -> Result<(Name, usize), Error> {
    let mut offset = 0;
    loop {
        let label_len = *octets.get(offset).ok_or(Error::UnexpectedEom)?;
        if label_len as usize > MAX_LABEL_LEN {
            return Err(Error::LabelTooLong);
        }
        offset += label_len as usize + 1;
        if offset > MAX_WIRE_LEN {
            return Err(Error::NameTooLong);
        } else if offset > octets.len() {
            return Err(Error::UnexpectedEom);
        } else if label_len == 0 {
            return Ok((Name::from_valid_wire_repr(&octets[..offset]), offset));
        }
    }
}

////////////////////////////////////////////////////////////////////////
// COMPRESSED NAMES                                                   //
////////////////////////////////////////////////////////////////////////

/// Parses a possibly compressed name starting at index `start` of
/// `octets`, which should be the entire DNS message so that pointers
/// can be followed. Returns the name and the number of contiguous
/// octets it occupies at `start` (i.e. how far to advance a cursor).
///
/// A "chunk" is a run of labels read contiguously; each pointer starts
/// a new chunk. Every pointer must refer to an index strictly before
/// the start of the chunk that contains it, per RFC 1035 § 4.1.4. This
/// permits pointers to pointers while ruling out loops.
pub fn parse_compressed_name(octets: &[u8], start: usize) -> Result<(Name, usize), Error> {
    let mut wire_repr = ArrayVec::<u8, MAX_WIRE_LEN>::new();
    let mut next_chunk = Some(start);
    let mut wire_len_of_first_chunk = None;

    while let Some(chunk_start) = next_chunk {
        let mut index = chunk_start;
        loop {
            let len = *octets.get(index).ok_or(Error::UnexpectedEom)?;
            if len & 0xc0 == 0xc0 {
                next_chunk = Some(parse_pointer(octets, chunk_start, index)?);
                index += 2;
                break;
            } else if len as usize > MAX_LABEL_LEN {
                return Err(Error::LabelTooLong);
            }

            let end_of_label = index + len as usize + 1;
            if end_of_label > octets.len() {
                return Err(Error::UnexpectedEom);
            }
            wire_repr
                .try_extend_from_slice(&octets[index..end_of_label])
                .or(Err(Error::NameTooLong))?;
            index = end_of_label;
            if len == 0 {
                next_chunk = None;
                break;
            }
        }
        if chunk_start == start {
            wire_len_of_first_chunk = Some(index - start);
        }
    }

    let name = Name::from_valid_wire_repr(&wire_repr);
    Ok((name, wire_len_of_first_chunk.unwrap_or_default()))
}

/// Reads the pointer at `index`, checking that it refers to an octet
/// before `chunk_start`.
fn parse_pointer(octets: &[u8], chunk_start: usize, index: usize) -> Result<usize, Error> {
    let bytes = octets.get(index..index + 2).ok_or(Error::UnexpectedEom)?;
    let pointer = (u16::from_be_bytes([bytes[0], bytes[1]]) & 0x3fff) as usize;
    if pointer >= chunk_start {
        Err(Error::InvalidPointer)
    } else {
        Ok(pointer)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
