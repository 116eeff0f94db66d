// Copyright 2022 Matthew Ingwersen.
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

//! Implementation of the [`Writer`] type to write on-the-wire DNS
//! messages.

use std::fmt;

use super::constants::*;
use super::{Header, Question};
use crate::rr::Record;

////////////////////////////////////////////////////////////////////////
// WRITER                                                             //
////////////////////////////////////////////////////////////////////////

/// Serializes a DNS message into a growable buffer.
///
/// A `Writer` starts from a [`Header`] and then accepts questions and
/// resource records through [`Writer::add_question`] and the
/// `add_*_record` methods. These are written sequentially, so they must
/// be added in message order (questions, answer records, authority
/// records, additional records). The `Writer` keeps track of the
/// section it is currently writing, and attempts to go back to an
/// earlier section fail with [`Error::OutOfOrder`].
///
/// Names are never compressed. The section counts in the header are
/// maintained as items are added and written out by
/// [`Writer::finish`].
pub struct Writer {
    octets: Vec<u8>,
    section: Section,
    counts: [u16; 4],
}

/// A type for recording which section of a DNS message a [`Writer`] is
/// currently serializing. The discriminants index `Writer::counts`.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
enum Section {
    Question = 0,
    Answer = 1,
    Authority = 2,
    Additional = 3,
}

impl Writer {
    /// Creates a new `Writer` for a message with the given header.
    pub fn new(header: &Header) -> Self {
        let mut octets = Vec::with_capacity(MAX_UDP_PAYLOAD);
        octets.extend_from_slice(&header.id.to_be_bytes());
        octets.extend_from_slice(&header.flags_word().to_be_bytes());
        octets.resize(HEADER_SIZE, 0);
        Self {
            octets,
            section: Section::Question,
            counts: [0; 4],
        }
    }

    /// Adds a question to the message. This must be used before any
    /// resource records are added.
    pub fn add_question(&mut self, question: &Question) -> Result<()> {
        self.with_rollback(Section::Question, |octets| {
            octets.extend_from_slice(question.qname.wire_repr());
            octets.extend_from_slice(&u16::from(question.qtype).to_be_bytes());
            octets.extend_from_slice(&u16::from(question.qclass).to_be_bytes());
            Ok(())
        })
    }

    /// Adds a record to the answer section.
    pub fn add_answer_record(&mut self, record: &Record) -> Result<()> {
        self.with_rollback(Section::Answer, |octets| write_record(record, octets))
    }

    /// Adds a record to the authority section.
    pub fn add_authority_record(&mut self, record: &Record) -> Result<()> {
        self.with_rollback(Section::Authority, |octets| write_record(record, octets))
    }

    /// Adds a record to the additional section.
    pub fn add_additional_record(&mut self, record: &Record) -> Result<()> {
        self.with_rollback(Section::Additional, |octets| write_record(record, octets))
    }

    /// Writes the section counts into the header and returns the
    /// finished message.
    pub fn finish(mut self) -> Vec<u8> {
        let starts = [QDCOUNT_START, ANCOUNT_START, NSCOUNT_START, ARCOUNT_START];
        for (start, count) in starts.into_iter().zip(self.counts) {
            self.octets[start..start + 2].copy_from_slice(&count.to_be_bytes());
        }
        self.octets
    }

    /// Switches to `section`, runs `f` to append one item, and bumps
    /// the section's count. If anything fails, the buffer and section
    /// are rolled back to their previous state.
    fn with_rollback<F>(&mut self, section: Section, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        if section < self.section {
            return Err(Error::OutOfOrder);
        }
        let new_count = self.counts[section as usize]
            .checked_add(1)
            .ok_or(Error::CountOverflow)?;
        let saved_len = self.octets.len();
        match f(&mut self.octets) {
            Ok(()) => {
                self.section = section;
                self.counts[section as usize] = new_count;
                Ok(())
            }
            Err(err) => {
                self.octets.truncate(saved_len);
                Err(err)
            }
        }
    }
}

/// Appends `record` to `octets`, backpatching the RDLENGTH field once
/// the RDATA has been written.
pub fn write_record(record: &Record, octets: &mut Vec<u8>) -> Result<()> {
    octets.extend_from_slice(record.owner().wire_repr());
    octets.extend_from_slice(&u16::from(record.rr_type()).to_be_bytes());
    octets.extend_from_slice(&u16::from(record.class()).to_be_bytes());
    octets.extend_from_slice(&u32::from(record.ttl()).to_be_bytes());

    // Save two octets for the RDLENGTH field.
    let rdlength_start = octets.len();
    octets.extend_from_slice(&[0, 0]);
    record.rdata().serialize(octets);

    let rdlength = u16::try_from(octets.len() - rdlength_start - 2).or(Err(Error::RdataTooLong))?;
    octets[rdlength_start..rdlength_start + 2].copy_from_slice(&rdlength.to_be_bytes());
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a [`Writer`] operation could not be
/// performed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// Adding the question or resource record would overflow the
    /// corresponding 16-bit counter in the DNS header.
    CountOverflow,

    /// An attempt was made to serialize a question or resource record
    /// in the wrong place in the message (e.g., adding a question after
    /// an answer resource record has already been serialized).
    OutOfOrder,

    /// The RDATA of a record does not fit in the 16-bit RDLENGTH field.
    RdataTooLong,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::CountOverflow => f.write_str("record count would overflow"),
            Self::OutOfOrder => f.write_str("question or record serialized out of order"),
            Self::RdataTooLong => f.write_str("RDATA is longer than 65,535 octets"),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by fallible [`Writer`] methods.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
