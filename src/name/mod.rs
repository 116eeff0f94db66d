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

//! Implementation of data structures related to domain names.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;
use std::str::FromStr;

use arrayvec::ArrayVec;

mod builder;
mod error;
mod wire;
pub use builder::NameBuilder;
pub use error::Error;

/// The maximum number of labels in a domain name (including the null
/// label).
const MAX_N_LABELS: usize = 128;

/// The maximum length of the uncompressed on-the-wire representation of
/// a domain name.
const MAX_WIRE_LEN: usize = 255;

/// The maximum length of a label in a domain name (not including the
/// octet that provides the length).
const MAX_LABEL_LEN: usize = 63;

////////////////////////////////////////////////////////////////////////
// NAME STRUCTURE                                                     //
////////////////////////////////////////////////////////////////////////

/// A fully qualified domain name.
///
/// A `Name` owns the uncompressed on-the-wire representation defined in
/// [RFC 1035 § 3.1]: a sequence of length-prefixed labels ending with
/// the null label. Every `Name` is valid by construction; labels are at
/// most 63 octets long, and the whole name is at most 255 octets long.
///
/// `Name`s can be constructed
///
/// * through the [`FromStr`] implementation (a missing trailing dot is
///   tolerated, and the name is taken to be fully qualified);
/// * through a [`NameBuilder`]; or
/// * from messages through [`Name::try_from_compressed`] and
///   [`Name::try_from_uncompressed`].
///
/// In accordance with [RFC 4343], comparison and hashing are
/// ASCII-case-insensitive while case is preserved for display. This
/// makes `Name` directly usable as a normalized key for zones and cache
/// owners.
///
/// [RFC 1035 § 3.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.1
/// [RFC 4343]: https://datatracker.ietf.org/doc/html/rfc4343
#[derive(Clone)]
pub struct Name {
    wire_repr: Box<[u8]>,
}

impl Name {
    /// Wraps a validated on-the-wire representation. Only for use
    /// within this module, after the representation has been checked.
    fn from_valid_wire_repr(wire_repr: &[u8]) -> Self {
        Self {
            wire_repr: wire_repr.into(),
        }
    }

    /// Returns the offset of label `n` in the wire representation, or
    /// the wire length if `n` is the label count.
    fn label_offset(&self, n: usize) -> Option<usize> {
        let mut offset = 0;
        for _ in 0..n {
            let len = *self.wire_repr.get(offset)? as usize;
            if len == 0 {
                return (offset + 1 == self.wire_repr.len()).then_some(self.wire_repr.len());
            }
            offset += len + 1;
        }
        Some(offset)
    }
}

////////////////////////////////////////////////////////////////////////
// NAME PUBLIC API                                                    //
////////////////////////////////////////////////////////////////////////

#[allow(clippy::len_without_is_empty)] // A domain name is never empty!
impl Name {
    /// Returns the DNS root `.`.
    pub fn root() -> Self {
        Self::from_valid_wire_repr(&[0])
    }

    /// Returns whether the `Name` is the DNS root.
    pub fn is_root(&self) -> bool {
        self.wire_repr.len() == 1
    }

    /// Returns whether any label of the `Name` contains an asterisk.
    /// Such names are never cached.
    pub fn contains_asterisk(&self) -> bool {
        self.labels().any(|label| label.contains(&b'*'))
    }

    /// Returns the number of labels in the `Name`, including the null
    /// label. The root therefore has length 1.
    pub fn len(&self) -> usize {
        self.labels().count()
    }

    /// Returns an iterator over the labels of the `Name`, ending with
    /// the null label.
    pub fn labels(&self) -> Labels {
        Labels {
            remaining: &self.wire_repr,
        }
    }

    /// Returns the first label (the null label for the root).
    pub fn first_label(&self) -> &[u8] {
        let len = self.wire_repr[0] as usize;
        &self.wire_repr[1..1 + len]
    }

    /// Returns whether this `Name` is equal to or a subdomain of
    /// `other`.
    pub fn eq_or_subdomain_of(&self, other: &Name) -> bool {
        let (len, other_len) = (self.len(), other.len());
        len >= other_len
            && self
                .wire_repr_from(len - other_len)
                .eq_ignore_ascii_case(&other.wire_repr)
    }

    /// Returns the number of non-null labels that this `Name` and
    /// `other` have in common, counting from the right.
    pub fn common_suffix_len(&self, other: &Name) -> usize {
        let ours: ArrayVec<&[u8], MAX_N_LABELS> = self.labels().collect();
        let theirs: ArrayVec<&[u8], MAX_N_LABELS> = other.labels().collect();
        ours.iter()
            .rev()
            .zip(theirs.iter().rev())
            .skip(1)
            .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
            .count()
    }

    /// Returns the superdomain obtained by skipping the first `skip`
    /// labels, or `None` if there aren't enough labels.
    pub fn superdomain(&self, skip: usize) -> Option<Name> {
        if skip < self.len() {
            Some(Self::from_valid_wire_repr(self.wire_repr_from(skip)))
        } else {
            None
        }
    }

    /// Returns the parent of this `Name`, or `None` for the root.
    pub fn parent(&self) -> Option<Name> {
        self.superdomain(1)
    }

    /// Strips any leading labels beginning with an underscore, as in
    /// the service and protocol labels of SRV owner names
    /// (`_ldap._tcp.example.com.` becomes `example.com.`).
    pub fn without_underscore_labels(&self) -> Name {
        let skip = self
            .labels()
            .take_while(|label| label.first() == Some(&b'_'))
            .count();
        self.superdomain(skip).unwrap_or_else(Name::root)
    }

    /// Tries to parse a possibly compressed name starting at index
    /// `start` of `octets`. Pointers are interpreted as indices into
    /// `octets`, so the whole message should be passed. On success,
    /// the name is returned together with the number of contiguous
    /// octets it occupies at `start`.
    pub fn try_from_compressed(octets: &[u8], start: usize) -> Result<(Self, usize), Error> {
        wire::parse_compressed_name(octets, start)
    }

    /// Tries to parse an uncompressed name at the start of `octets`.
    /// Extra data is ignored. On success, the name is returned together
    /// with its length on the wire.
    pub fn try_from_uncompressed(octets: &[u8]) -> Result<(Self, usize), Error> {
        wire::parse_uncompressed_name(octets)
    }

    /// Returns the uncompressed on-the-wire representation.
    pub fn wire_repr(&self) -> &[u8] {
        &self.wire_repr
    }

    /// Returns the on-the-wire representation starting with label `n`.
    /// This panics if `n` is greater than the label count.
    pub fn wire_repr_from(&self, n: usize) -> &[u8] {
        let offset = self.label_offset(n).expect("label index out of range");
        &self.wire_repr[offset..]
    }

    /// Returns a copy of this `Name` with all ASCII letters lowercased.
    pub fn to_ascii_lowercase(&self) -> Name {
        Self {
            wire_repr: self.wire_repr.to_ascii_lowercase().into(),
        }
    }
}

/// Formats a label using the escapes of RFC 1035 § 5.1.
fn fmt_label(label: &[u8], f: &mut fmt::Formatter) -> fmt::Result {
    for octet in label {
        if *octet == b'.' {
            f.write_str("\\.")?;
        } else if *octet == b'\\' {
            f.write_str("\\\\")?;
        } else if octet.is_ascii_graphic() {
            write!(f, "{}", *octet as char)?;
        } else {
            write!(f, "\\{:03}", *octet)?;
        }
    }
    Ok(())
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in self.labels().filter(|label| !label.is_empty()) {
            fmt_label(label, f)?;
            f.write_str(".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

// Length octets are at most 63, so they are unaffected by ASCII case
// folding; comparing the whole wire representation caselessly is
// equivalent to comparing label by label.
impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.wire_repr.eq_ignore_ascii_case(&other.wire_repr)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for octet in self.wire_repr.iter() {
            state.write_u8(octet.to_ascii_lowercase());
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ITERATION OVER A NAME'S LABELS                                     //
////////////////////////////////////////////////////////////////////////

/// An iterator over the labels of a [`Name`]; see [`Name::labels`].
#[derive(Clone, Debug)]
pub struct Labels<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for Labels<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.remaining.first()? as usize;
        let label = &self.remaining[1..1 + len];
        self.remaining = &self.remaining[1 + len..];
        Some(label)
    }
}

impl FusedIterator for Labels<'_> {}

////////////////////////////////////////////////////////////////////////
// PARSING OF NAMES FROM RUST STRINGS                                 //
////////////////////////////////////////////////////////////////////////

/// Parses a [`Name`] from text. The string must be strictly ASCII;
/// escape sequences as defined by [RFC 4343 § 2.1] are supported. A
/// string without a trailing dot is treated as fully qualified.
///
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::StrEmpty);
        } else if s == "." {
            return Ok(Name::root());
        }

        let mut remaining_octets: &[u8] = s.as_ref();
        let mut builder = NameBuilder::new();
        while let Some(&octet) = remaining_octets.first() {
            if octet == b'\\' {
                let (value, consumed) = parse_escape(&remaining_octets[1..])?;
                builder.try_push(value)?;
                remaining_octets = &remaining_octets[consumed + 1..];
            } else if octet == b'.' {
                builder.next_label()?;
                remaining_octets = &remaining_octets[1..];
            } else if !octet.is_ascii() {
                return Err(Error::StrNotAscii);
            } else {
                builder.try_push(octet)?;
                remaining_octets = &remaining_octets[1..];
            }
        }
        builder.finish()
    }
}

/// Parses an escape sequence. `remaining_octets` starts with the octet
/// immediately *after* the backslash. Returns the escaped value and the
/// number of octets consumed.
fn parse_escape(remaining_octets: &[u8]) -> Result<(u8, usize), Error> {
    match remaining_octets {
        [] => Err(Error::InvalidEscape),
        [first, ..] if first.is_ascii_digit() => {
            let digits = remaining_octets.get(0..3).ok_or(Error::InvalidEscape)?;
            if !digits.iter().all(u8::is_ascii_digit) {
                return Err(Error::InvalidEscape);
            }
            let value = digits
                .iter()
                .fold(0usize, |acc, digit| acc * 10 + (digit - b'0') as usize);
            u8::try_from(value)
                .map(|value| (value, 3))
                .or(Err(Error::InvalidEscape))
        }
        [first, ..] => Ok((*first, 1)),
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
