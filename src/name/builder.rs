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

//! Implementation of the [`NameBuilder`] structure.

use arrayvec::ArrayVec;

use super::{Error, Name, MAX_LABEL_LEN, MAX_WIRE_LEN};

/// Builds a [`Name`] one octet or label at a time.
///
/// The builder keeps the on-the-wire representation in a fixed-size
/// buffer that can hold any valid name, so building a name costs a
/// single heap allocation when [`NameBuilder::finish`] is called.
///
/// A new `NameBuilder` holds an empty (in-progress) first label. Octets
/// are added with [`NameBuilder::try_push`] and
/// [`NameBuilder::try_push_slice`], and [`NameBuilder::next_label`]
/// closes the current label and opens the next one. Once the last
/// opened label is left empty, the name is fully qualified and may be
/// finished:
///
/// ```
/// use delver::name::NameBuilder;
/// let mut builder = NameBuilder::new();
/// builder.try_push_slice(b"example").unwrap();
/// builder.next_label().unwrap();
/// builder.try_push_slice(b"test").unwrap();
/// builder.next_label().unwrap();
/// assert_eq!(builder.finish().unwrap(), "example.test.".parse().unwrap());
/// ```
pub struct NameBuilder {
    wire_repr: ArrayVec<u8, MAX_WIRE_LEN>,
    label_start: usize,
    label_len: u8,
}

impl NameBuilder {
    /// Constructs a new `NameBuilder` with an empty first label.
    pub fn new() -> Self {
        let mut wire_repr = ArrayVec::new();
        wire_repr.push(0);
        Self {
            wire_repr,
            label_start: 0,
            label_len: 0,
        }
    }

    /// Returns whether the name in progress ends with the null label.
    pub fn is_fully_qualified(&self) -> bool {
        self.label_len == 0
    }

    /// Tries to add an octet to the current label. On error the
    /// builder is unchanged.
    pub fn try_push(&mut self, octet: u8) -> Result<(), Error> {
        if self.label_len as usize >= MAX_LABEL_LEN {
            Err(Error::LabelTooLong)
        } else if self.wire_repr.try_push(octet).is_ok() {
            self.label_len += 1;
            Ok(())
        } else {
            Err(Error::NameTooLong)
        }
    }

    /// Tries to add a run of octets to the current label. On error the
    /// builder is unchanged.
    pub fn try_push_slice(&mut self, octets: &[u8]) -> Result<(), Error> {
        if self.label_len as usize + octets.len() > MAX_LABEL_LEN {
            Err(Error::LabelTooLong)
        } else if self.wire_repr.try_extend_from_slice(octets).is_ok() {
            self.label_len += octets.len() as u8;
            Ok(())
        } else {
            Err(Error::NameTooLong)
        }
    }

    /// Closes the current label and starts a new, empty one. Fails if
    /// the current label is empty, since only the last label of a name
    /// may be null.
    pub fn next_label(&mut self) -> Result<(), Error> {
        if self.is_fully_qualified() {
            Err(Error::NullNonTerminal)
        } else if self.wire_repr.is_full() {
            Err(Error::NameTooLong)
        } else {
            self.wire_repr[self.label_start] = self.label_len;
            self.label_start = self.wire_repr.len();
            self.label_len = 0;
            self.wire_repr.push(0);
            Ok(())
        }
    }

    /// Finishes the name. If the current label is not empty, it is
    /// closed first, so that the result is always fully qualified.
    pub fn finish(mut self) -> Result<Name, Error> {
        if !self.is_fully_qualified() {
            self.next_label()?;
        }
        Ok(Name::from_valid_wire_repr(&self.wire_repr))
    }
}

impl Default for NameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
