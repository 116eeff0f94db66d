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

//! Crate-private utilities.

use std::fmt::{self, Write};

/// A wrapper around [`str`] references whose [`PartialEq`] and [`Eq`]
/// implementations are ASCII-case-insensitive. This lets mnemonics be
/// matched with `match` patterns.
pub struct Caseless<'a>(pub &'a str);

impl PartialEq for Caseless<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(other.0)
    }
}

impl Eq for Caseless<'_> {}

/// Parses the RFC 3597 generic form of a mnemonic (e.g. `TYPE65280`
/// with `prefix` equal to `"TYPE"`). Returns `None` if `text` does not
/// start with `prefix` (case-insensitively).
pub fn parse_generic_mnemonic(
    text: &str,
    prefix: &str,
) -> Option<Result<u16, std::num::ParseIntError>> {
    let head = text.get(0..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(text[prefix.len()..].parse())
    } else {
        None
    }
}

/// Converts a nibble into an ASCII hex character. Lower-case hex digits
/// are used. The passed value must be less than 16.
pub fn nibble_to_ascii_hex_digit(nibble: u8) -> u8 {
    assert!(nibble < 16);
    if nibble < 10 {
        b'0' + nibble
    } else {
        b'a' + nibble - 10
    }
}

/// Writes `octets` as lower-case hexadecimal digits.
pub fn write_hex(octets: &[u8], f: &mut fmt::Formatter) -> fmt::Result {
    for octet in octets {
        f.write_char(char::from(nibble_to_ascii_hex_digit(octet >> 4)))?;
        f.write_char(char::from(nibble_to_ascii_hex_digit(octet & 0xf)))?;
    }
    Ok(())
}
